use crate::error::{OrganizerError, Result};
use crate::extraction::tags::resolve_tag;
use dicom_core::Tag;
use std::fmt;

/// Fields extracted into the metadata table unless overridden
pub const DEFAULT_FIELDS: [&str; 10] = [
    "PatientName",
    "PatientID",
    "StudyID",
    "StudyDate",
    "SOPInstanceUID",
    "SeriesInstanceUID",
    "Modality",
    "BurnedInAnnotation",
    "SOPClassUID",
    "StudyInstanceUID",
];

/// Fields blanked by the anonymizer unless overridden
pub const DEFAULT_CLEAR_FIELDS: [&str; 8] = [
    "PatientBirthDate",
    "PatientAge",
    "InstitutionName",
    "StationName",
    "StudyID",
    "AccessionNumber",
    "SeriesDescription",
    "StudyDescription",
];

/// A named metadata attribute resolved to its DICOM tag
///
/// The name is kept exactly as the caller wrote it and is used as the
/// column name of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    tag: Tag,
}

impl Field {
    /// Resolves a keyword or tag expression into a field
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is not a known DICOM
    /// keyword and not a tag expression.
    pub fn parse(name: &str) -> Result<Self> {
        let tag = resolve_tag(name)
            .ok_or_else(|| OrganizerError::config(format!("unknown DICOM field '{}'", name)))?;
        Ok(Self {
            name: name.trim().to_string(),
            tag,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.tag)
    }
}

/// Ordered, duplicate-free collection of fields
///
/// Used both for the columns to extract and for the fields to clear.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    /// Resolves every name; the first unresolvable name aborts
    ///
    /// Duplicate names are dropped, keeping the first occurrence.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut set = FieldSet::default();
        for name in names {
            set.push(Field::parse(name.as_ref())?);
        }
        Ok(set)
    }

    /// The default extraction set
    pub fn default_fields() -> Self {
        Self::from_static(&DEFAULT_FIELDS)
    }

    /// The default anonymization set
    pub fn default_clear_fields() -> Self {
        Self::from_static(&DEFAULT_CLEAR_FIELDS)
    }

    fn from_static(names: &[&str]) -> Self {
        let mut set = FieldSet::default();
        for name in names {
            if let Some(tag) = resolve_tag(name) {
                set.push(Field {
                    name: name.to_string(),
                    tag,
                });
            }
        }
        set
    }

    fn push(&mut self, field: Field) {
        if !self.contains(field.name()) {
            self.fields.push(field);
        }
    }

    /// Returns a copy with `field` appended unless a field of that name exists
    pub fn with_field(&self, field: Field) -> Self {
        let mut set = self.clone();
        set.push(field);
        set
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
