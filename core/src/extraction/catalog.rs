use crate::error::{OrganizerError, Result};
use crate::extraction::tags::{get_field_value, PIXEL_DATA};
use crate::parallel::Dispatcher;
use crate::types::{Field, FieldSet, FieldValue, MetadataTable, Record};
use dicom_object::OpenFileOptions;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the media directory index file, never catalogued
const DICOMDIR: &str = "DICOMDIR";

/// Recursively collects candidate files below `root`
///
/// Every regular file is a candidate except `DICOMDIR` index files. Entries
/// that cannot be read are logged and skipped. The walk is sorted by file
/// name so repeated walks of an unchanged tree agree.
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry below {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(DICOMDIR))
        {
            debug!("Ignoring index file {}", entry.path().display());
            continue;
        }

        files.push(entry.into_path());
    }

    files
}

/// Reads one file's header and extracts `fields` into a record
///
/// Only the header is decoded; reading stops before the pixel data.
///
/// # Errors
///
/// Returns [`OrganizerError::Decode`] if the file is not readable as DICOM.
pub fn read_record(path: &Path, fields: &FieldSet) -> Result<Record> {
    let dcm = OpenFileOptions::new()
        .read_until(PIXEL_DATA)
        .open_file(path)
        .map_err(|e| OrganizerError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let values = fields
        .iter()
        .map(|field| FieldValue {
            name: field.name().to_string(),
            value: get_field_value(&dcm, field.tag()),
        })
        .collect();

    Ok(Record::new(path.to_path_buf(), values))
}

/// Builds a [`MetadataTable`] from a directory tree
#[derive(Debug)]
pub struct CatalogBuilder {
    fields: FieldSet,
    group_by: Option<String>,
    dispatcher: Dispatcher,
}

impl CatalogBuilder {
    /// Creates a builder for `fields`
    ///
    /// A group key outside `fields` is resolved and extracted as an extra
    /// trailing column.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the group key is not a known field.
    pub fn new(fields: FieldSet, group_by: Option<String>, dispatcher: Dispatcher) -> Result<Self> {
        let fields = match group_by.as_deref() {
            Some(key) if !fields.contains(key) => fields.with_field(Field::parse(key)?),
            _ => fields,
        };

        Ok(Self {
            fields,
            group_by,
            dispatcher,
        })
    }

    /// Columns the built tables will carry
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Walks `root` and extracts one record per readable DICOM file
    ///
    /// Files that cannot be decoded are skipped. Records follow walk order.
    pub fn build(&self, root: &Path) -> Result<MetadataTable> {
        let files = discover_files(root);
        info!(
            "Found {} candidate files in {}",
            files.len(),
            root.display()
        );
        self.build_from_files(files)
    }

    /// Extracts records from an explicit file list
    pub fn build_from_files(&self, files: Vec<PathBuf>) -> Result<MetadataTable> {
        let candidates = files.len();
        let records = self.dispatcher.run_indexed(
            files,
            |path| read_record(&path, &self.fields),
            "Reading DICOM files",
        )?;

        info!(
            "Catalogued {} of {} files ({} skipped)",
            records.len(),
            candidates,
            candidates - records.len()
        );

        Ok(MetadataTable::new(
            self.fields.names(),
            records,
            self.group_by.clone(),
        ))
    }
}
