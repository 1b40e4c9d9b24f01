use super::filter::{filter_records, try_filter_records};
use super::record::Record;
use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Partition key of a grouped table
///
/// Records whose file lacks the group field share the `Absent` partition,
/// which sorts before every value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum GroupKey {
    Absent,
    Value(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Absent => write!(f, "<absent>"),
            GroupKey::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Records partitioned by the distinct values of one field
pub type Groups<'a> = BTreeMap<GroupKey, Vec<&'a Record>>;

/// In-memory table of extracted metadata
///
/// One record per source file, one column per extracted field, plus an
/// optional group key. Grouping is a projection computed on demand; the
/// ungrouped records stay available.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct MetadataTable {
    columns: Vec<String>,
    records: Vec<Record>,
    group_by: Option<String>,
}

impl MetadataTable {
    pub fn new(columns: Vec<String>, records: Vec<Record>, group_by: Option<String>) -> Self {
        Self {
            columns,
            records,
            group_by,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Field name this table groups by, if any
    pub fn group_key(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    /// Source file paths in table order
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .map(|r| r.file_path().to_path_buf())
            .collect()
    }

    /// Grouped view by the configured key, or `None` when ungrouped
    pub fn groups(&self) -> Option<Groups<'_>> {
        self.group_by.as_deref().map(|key| self.grouped_by(key))
    }

    /// Partitions records by the distinct values of `field`
    ///
    /// Every record lands in exactly one partition. Within a partition the
    /// table order is kept.
    pub fn grouped_by(&self, field: &str) -> Groups<'_> {
        let mut groups: Groups<'_> = BTreeMap::new();
        for record in &self.records {
            let key = match record.value(field) {
                Some(v) => GroupKey::Value(v.to_string()),
                None => GroupKey::Absent,
            };
            groups.entry(key).or_default().push(record);
        }
        groups
    }

    /// New table holding the records for which `predicate` returns true
    ///
    /// The predicate runs exactly once per record, in table order. The
    /// result keeps this table's columns and group key.
    pub fn filter<F>(&self, predicate: F) -> MetadataTable
    where
        F: FnMut(&Record) -> bool,
    {
        self.with_records(filter_records(&self.records, predicate))
    }

    /// Like [`MetadataTable::filter`] with a fallible predicate
    ///
    /// # Errors
    ///
    /// The first predicate error aborts the whole call as
    /// [`OrganizerError::Predicate`](crate::OrganizerError::Predicate).
    pub fn try_filter<F, E>(&self, predicate: F) -> Result<MetadataTable>
    where
        F: FnMut(&Record) -> std::result::Result<bool, E>,
        E: fmt::Display,
    {
        Ok(self.with_records(try_filter_records(&self.records, predicate)?))
    }

    fn with_records(&self, records: Vec<Record>) -> MetadataTable {
        MetadataTable {
            columns: self.columns.clone(),
            records,
            group_by: self.group_by.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a MetadataTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::FieldValue;
    use std::collections::HashSet;

    fn record(path: &str, modality: Option<&str>, patient: &str) -> Record {
        Record::new(
            PathBuf::from(path),
            vec![
                FieldValue {
                    name: "Modality".to_string(),
                    value: modality.map(str::to_string),
                },
                FieldValue {
                    name: "PatientID".to_string(),
                    value: Some(patient.to_string()),
                },
            ],
        )
    }

    fn table(group_by: Option<&str>) -> MetadataTable {
        MetadataTable::new(
            vec!["Modality".to_string(), "PatientID".to_string()],
            vec![
                record("a.dcm", Some("CT"), "P1"),
                record("b.dcm", Some("MR"), "P1"),
                record("c.dcm", Some("CT"), "P2"),
                record("d.dcm", None, "P3"),
            ],
            group_by.map(str::to_string),
        )
    }

    #[test]
    fn test_ungrouped_table_has_no_groups() {
        assert!(table(None).groups().is_none());
    }

    #[test]
    fn test_groups_partition_all_records() {
        let table = table(Some("Modality"));
        let groups = table.groups().unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&GroupKey::Value("CT".to_string())].len(), 2);
        assert_eq!(groups[&GroupKey::Value("MR".to_string())].len(), 1);
        assert_eq!(groups[&GroupKey::Absent].len(), 1);

        let mut seen = HashSet::new();
        for records in groups.values() {
            for r in records {
                assert!(seen.insert(r.file_path().to_path_buf()));
            }
        }
        assert_eq!(seen.len(), table.len());

        // Grouping is a projection; the flat view is untouched
        assert_eq!(table.records().len(), 4);
    }

    #[test]
    fn test_grouping_by_missing_column_is_one_absent_partition() {
        let table = table(None);
        let groups = table.grouped_by("StudyDate");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&GroupKey::Absent].len(), 4);
    }

    #[test]
    fn test_filter_keeps_order_and_metadata() {
        let table = table(Some("PatientID"));
        let filtered = table.filter(|r| r.get("Modality") == "CT");

        assert_eq!(
            filtered.file_paths(),
            vec![PathBuf::from("a.dcm"), PathBuf::from("c.dcm")]
        );
        assert_eq!(filtered.columns(), table.columns());
        assert_eq!(filtered.group_key(), Some("PatientID"));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_try_filter_propagates_error() {
        let table = table(None);
        let result = table.try_filter(|r| {
            if r.is_present("Modality") {
                Ok(true)
            } else {
                Err("modality missing")
            }
        });

        let err = result.unwrap_err();
        assert!(err.to_string().contains("d.dcm"));
        assert!(err.to_string().contains("modality missing"));
    }

    #[test]
    fn test_group_key_display() {
        assert_eq!(GroupKey::Absent.to_string(), "<absent>");
        assert_eq!(GroupKey::Value("CT".to_string()).to_string(), "CT");
    }
}
