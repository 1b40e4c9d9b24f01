use crate::types::{MetadataTable, Record};
use std::fmt;

/// Text report formatter for a metadata table
///
/// Prints a tab-separated header and one line per record. Grouped tables
/// print one section per partition.
pub struct TableReport<'a> {
    table: &'a MetadataTable,
}

impl<'a> TableReport<'a> {
    /// Creates a new table report
    pub fn new(table: &'a MetadataTable) -> Self {
        Self { table }
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path")?;
        for column in self.table.columns() {
            write!(f, "\t{}", column)?;
        }
        writeln!(f)
    }

    fn write_row(&self, f: &mut fmt::Formatter<'_>, record: &Record) -> fmt::Result {
        write!(f, "{}", record.file_path().display())?;
        for column in self.table.columns() {
            write!(f, "\t{}", record.get(column))?;
        }
        writeln!(f)
    }
}

impl<'a> fmt::Display for TableReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DICOM Catalog")?;
        writeln!(f, "=============")?;
        writeln!(f)?;
        writeln!(f, "Files:    {}", self.table.len())?;

        match (self.table.group_key(), self.table.groups()) {
            (Some(key), Some(groups)) => {
                writeln!(f, "Group by: {}", key)?;
                writeln!(f, "Groups:   {}", groups.len())?;
                for (group, records) in &groups {
                    writeln!(f)?;
                    writeln!(f, "[{}] ({} files)", group, records.len())?;
                    self.write_header(f)?;
                    for record in records {
                        self.write_row(f, record)?;
                    }
                }
            }
            _ => {
                writeln!(f)?;
                self.write_header(f)?;
                for record in self.table {
                    self.write_row(f, record)?;
                }
            }
        }

        Ok(())
    }
}
