use super::field::{DEFAULT_CLEAR_FIELDS, DEFAULT_FIELDS};
use std::path::PathBuf;

/// Configuration for building a [`DicomManager`](crate::DicomManager)
///
/// # Example
///
/// ```
/// use dicomorg_core::ManagerConfig;
///
/// let config = ManagerConfig::new("/data/dicom")
///     .with_fields(["PatientID", "Modality"])
///     .group_by("PatientID")
///     .num_workers(4);
///
/// assert_eq!(config.fields, vec!["PatientID", "Modality"]);
/// assert_eq!(config.group_by.as_deref(), Some("PatientID"));
/// assert_eq!(config.num_workers, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerConfig {
    /// Directory searched recursively for DICOM files
    pub source_dir: PathBuf,

    /// Field keywords or tag expressions to extract
    pub fields: Vec<String>,

    /// Field to partition the table by
    pub group_by: Option<String>,

    /// Worker threads for per-file work; 1 runs sequentially
    pub num_workers: usize,

    /// Draw progress bars for batch work
    pub show_progress: bool,
}

impl ManagerConfig {
    /// Creates a configuration with the default field set and one worker
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            fields: DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect(),
            group_by: None,
            num_workers: 1,
            show_progress: false,
        }
    }

    /// Builder: Replace the extracted fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: Group the table by a field
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }

    /// Builder: Set the worker count
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Builder: Enable progress bars
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Where anonymized files are written inside the output directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "kebab-case"))]
pub enum OutputLayout {
    /// Same relative path as below the source directory
    #[default]
    Mirror,

    /// Relative path rendered from `$Keyword$` placeholders,
    /// e.g. `$PatientID$/$StudyDate$/$SOPInstanceUID$.dcm`
    Template(String),
}

/// Options for an anonymization run
///
/// # Example
///
/// ```
/// use dicomorg_core::{AnonymizeOptions, OutputLayout};
///
/// let options = AnonymizeOptions::default()
///     .with_clear_fields(["PatientName", "PatientBirthDate"])
///     .num_workers(2)
///     .layout(OutputLayout::Template("$PatientID$/$SOPInstanceUID$.dcm".into()));
///
/// assert_eq!(options.clear_fields.len(), 2);
/// assert_eq!(options.num_workers, Some(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct AnonymizeOptions {
    /// Field keywords or tag expressions to blank
    pub clear_fields: Vec<String>,

    /// Worker override; `None` uses the manager's worker count
    pub num_workers: Option<usize>,

    /// Output path policy
    pub layout: OutputLayout,
}

impl Default for AnonymizeOptions {
    fn default() -> Self {
        Self {
            clear_fields: DEFAULT_CLEAR_FIELDS.iter().map(|s| s.to_string()).collect(),
            num_workers: None,
            layout: OutputLayout::Mirror,
        }
    }
}

impl AnonymizeOptions {
    /// Builder: Replace the fields to clear
    pub fn with_clear_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: Override the worker count
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = Some(num_workers);
        self
    }

    /// Builder: Set the output layout
    pub fn layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }
}
