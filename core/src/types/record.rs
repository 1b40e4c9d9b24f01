use std::path::{Path, PathBuf};

/// Rendering of a field that the file does not carry
pub const ABSENT: &str = "";

/// One extracted field of a record
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct FieldValue {
    pub name: String,
    /// `None` when the field is absent from the file
    pub value: Option<String>,
}

impl FieldValue {
    /// Value rendered with the absent sentinel
    pub fn as_str(&self) -> &str {
        self.value.as_deref().unwrap_or(ABSENT)
    }
}

/// One row of the metadata table
///
/// Holds the source file path and, for every column of the table, either
/// the extracted value or an absent marker. Records are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Record {
    file_path: PathBuf,
    values: Vec<FieldValue>,
}

impl Record {
    /// Creates a record from a file path and its extracted values
    pub fn new(file_path: PathBuf, values: Vec<FieldValue>) -> Self {
        Self { file_path, values }
    }

    /// Path of the source file; unique within a table
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Value of `name` with absent fields rendered as an empty string
    ///
    /// Unknown column names render the same way, so predicates never fail
    /// on missing data.
    pub fn get(&self, name: &str) -> &str {
        self.value(name).unwrap_or(ABSENT)
    }

    /// Value of `name`, or `None` if absent or not a column
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value.as_deref())
    }

    /// Whether the source file carried the field
    pub fn is_present(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}
