use crate::anonymize::{anonymize_directory, Anonymizer};
use crate::error::{OrganizerError, Result};
use crate::extraction::CatalogBuilder;
use crate::parallel::Dispatcher;
use crate::types::{
    AnonymizeOptions, FieldSet, Groups, ManagerConfig, MetadataTable, Record,
};
use log::info;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Main entry point for cataloguing and anonymizing a DICOM directory
///
/// Construction walks the source directory and builds the metadata table
/// right away. Filtering returns new tables and never changes the one held
/// by the manager.
///
/// # Example
///
/// ```no_run
/// use dicomorg_core::{AnonymizeOptions, DicomManager, ManagerConfig};
///
/// let manager = DicomManager::new(
///     ManagerConfig::new("/data/dicom")
///         .group_by("PatientID")
///         .num_workers(4),
/// )?;
///
/// println!("{} files catalogued", manager.table().len());
///
/// let ct_only = manager.filter(|record| record.get("Modality") == "CT");
/// let written = manager.anonymize_table(&ct_only, "/data/anon", &AnonymizeOptions::default())?;
/// println!("{} files anonymized", written.len());
/// # Ok::<(), dicomorg_core::OrganizerError>(())
/// ```
#[derive(Debug)]
pub struct DicomManager {
    config: ManagerConfig,
    fields: FieldSet,
    table: MetadataTable,
}

impl DicomManager {
    /// Validates `config` and catalogues the source directory
    ///
    /// # Errors
    ///
    /// Returns a configuration error, before any file is read, if the source
    /// directory does not exist, the worker count is zero, or a field name
    /// cannot be resolved.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        if !config.source_dir.is_dir() {
            return Err(OrganizerError::config(format!(
                "source directory {} does not exist",
                config.source_dir.display()
            )));
        }

        let dispatcher = Dispatcher::new(config.num_workers)?.with_progress(config.show_progress);
        let fields = FieldSet::from_names(&config.fields)?;
        let builder = CatalogBuilder::new(fields, config.group_by.clone(), dispatcher)?;

        info!(
            "Cataloguing {} with {} worker(s)",
            config.source_dir.display(),
            config.num_workers
        );
        let table = builder.build(&config.source_dir)?;

        Ok(Self {
            fields: builder.fields().clone(),
            config,
            table,
        })
    }

    /// Catalogues `source_dir` with the default configuration
    pub fn open(source_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(ManagerConfig::new(source_dir))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn source_dir(&self) -> &Path {
        &self.config.source_dir
    }

    /// Extracted columns, including a group key outside the configured fields
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// The full metadata table
    pub fn table(&self) -> &MetadataTable {
        &self.table
    }

    /// Grouped view of the table, or `None` without a group key
    pub fn groups(&self) -> Option<Groups<'_>> {
        self.table.groups()
    }

    /// New table of the records for which `predicate` returns true
    pub fn filter<F>(&self, predicate: F) -> MetadataTable
    where
        F: FnMut(&Record) -> bool,
    {
        self.table.filter(predicate)
    }

    /// Filters with a fallible predicate; the first error aborts the call
    pub fn try_filter<F, E>(&self, predicate: F) -> Result<MetadataTable>
    where
        F: FnMut(&Record) -> std::result::Result<bool, E>,
        E: fmt::Display,
    {
        self.table.try_filter(predicate)
    }

    /// Anonymizes every file of the held table
    pub fn anonymize(
        &self,
        output_dir: impl AsRef<Path>,
        options: &AnonymizeOptions,
    ) -> Result<BTreeSet<PathBuf>> {
        self.anonymize_table(&self.table, output_dir, options)
    }

    /// Anonymizes the files of `table`, typically a filtered table
    ///
    /// Output paths mirror each file's position below the manager's source
    /// directory, exactly as [`DicomManager::anonymize_directory`] would.
    ///
    /// # Errors
    ///
    /// Only configuration and output-directory errors are returned; per-file
    /// failures are logged and left out of the result.
    pub fn anonymize_table(
        &self,
        table: &MetadataTable,
        output_dir: impl AsRef<Path>,
        options: &AnonymizeOptions,
    ) -> Result<BTreeSet<PathBuf>> {
        let (dispatcher, clear) = self.prepare(options)?;
        let anonymizer = Anonymizer::new(
            &self.config.source_dir,
            output_dir.as_ref(),
            clear,
            &options.layout,
        )?;
        anonymizer.run(table.file_paths(), &dispatcher)
    }

    /// Anonymizes every file found by walking the source directory again
    pub fn anonymize_directory(
        &self,
        output_dir: impl AsRef<Path>,
        options: &AnonymizeOptions,
    ) -> Result<BTreeSet<PathBuf>> {
        let (dispatcher, clear) = self.prepare(options)?;
        anonymize_directory(
            &self.config.source_dir,
            output_dir.as_ref(),
            clear,
            &options.layout,
            &dispatcher,
        )
    }

    fn prepare(&self, options: &AnonymizeOptions) -> Result<(Dispatcher, FieldSet)> {
        let workers = options.num_workers.unwrap_or(self.config.num_workers);
        let dispatcher = Dispatcher::new(workers)?.with_progress(self.config.show_progress);
        let clear = FieldSet::from_names(&options.clear_fields)?;
        Ok((dispatcher, clear))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::tags::{MODALITY, SERIES_DESCRIPTION, STUDY_ID};
    use crate::extraction::read_record;
    use crate::test_support::{write_dicom, write_garbage, TestFile};
    use crate::types::{GroupKey, OutputLayout};
    use dicom_core::VR;
    use tempfile::TempDir;

    /// Three readable files (two CT, one MR) and one unreadable file
    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_dicom(
            &dir.path().join("p1/ct_a.dcm"),
            &TestFile::new("3.1")
                .modality("CT")
                .patient("P1")
                .with(SERIES_DESCRIPTION, VR::LO, "Chest"),
        );
        write_dicom(
            &dir.path().join("p1/ct_b.dcm"),
            &TestFile::new("3.2").modality("CT").patient("P1"),
        );
        write_dicom(
            &dir.path().join("p2/mr.dcm"),
            &TestFile::new("3.3").modality("MR").patient("P2"),
        );
        write_garbage(&dir.path().join("p2/readme.txt"));
        dir
    }

    fn manager(dir: &TempDir, workers: usize) -> DicomManager {
        DicomManager::new(ManagerConfig::new(dir.path()).num_workers(workers)).unwrap()
    }

    #[test]
    fn test_scenario_catalog_filter_anonymize() {
        let dir = fixture();
        let manager = manager(&dir, 1);

        assert_eq!(manager.table().len(), 3);
        assert_eq!(manager.table().columns().len(), 10);

        let ct = manager.filter(|r| r.get("Modality") == "CT");
        assert_eq!(ct.len(), 2);

        let output = TempDir::new().unwrap();
        let written = manager
            .anonymize(output.path(), &AnonymizeOptions::default())
            .unwrap();
        assert_eq!(written.len(), 3);
    }

    #[test]
    fn test_zero_workers_fails_before_touching_files() {
        let dir = fixture();
        let result = DicomManager::new(ManagerConfig::new(dir.path()).num_workers(0));
        assert!(result.unwrap_err().is_configuration());
    }

    #[test]
    fn test_zero_worker_override_fails_before_writing() {
        let dir = fixture();
        let manager = manager(&dir, 1);
        let output = TempDir::new().unwrap();
        let target = output.path().join("never");

        let err = manager
            .anonymize(&target, &AnonymizeOptions::default().num_workers(0))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(!target.exists());
    }

    #[test]
    fn test_missing_source_directory() {
        let dir = TempDir::new().unwrap();
        let err = DicomManager::open(dir.path().join("absent")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let dir = fixture();
        let err = DicomManager::new(ManagerConfig::new(dir.path()).with_fields(["Modalityy"]))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let dir = fixture();
        let first = manager(&dir, 1);
        let second = manager(&dir, 3);
        assert_eq!(first.table(), second.table());
    }

    #[test]
    fn test_filter_does_not_mutate_held_table() {
        let dir = fixture();
        let manager = manager(&dir, 2);
        let before = manager.table().clone();

        let none = manager.filter(|_| false);
        assert!(none.is_empty());
        assert_eq!(manager.table(), &before);
    }

    #[test]
    fn test_try_filter_error_propagates() {
        let dir = fixture();
        let manager = manager(&dir, 1);
        let result = manager.try_filter(|r| match r.get("Modality") {
            "MR" => Err(format!("unexpected modality in {}", r.file_path().display())),
            other => Ok(other == "CT"),
        });
        assert!(matches!(result, Err(OrganizerError::Predicate { .. })));
    }

    #[test]
    fn test_grouped_manager() {
        let dir = fixture();
        let manager =
            DicomManager::new(ManagerConfig::new(dir.path()).group_by("Modality")).unwrap();

        let groups = manager.groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&GroupKey::Value("CT".to_string())].len(), 2);
        assert_eq!(groups[&GroupKey::Value("MR".to_string())].len(), 1);

        // Flat view stays available
        assert_eq!(manager.table().len(), 3);
    }

    #[test]
    fn test_group_key_outside_field_set() {
        let dir = fixture();
        let manager = DicomManager::new(
            ManagerConfig::new(dir.path())
                .with_fields(["Modality"])
                .group_by("SeriesDescription"),
        )
        .unwrap();

        assert_eq!(manager.fields().names(), vec!["Modality", "SeriesDescription"]);
        let groups = manager.groups().unwrap();
        assert_eq!(groups[&GroupKey::Value("Chest".to_string())].len(), 1);
        assert_eq!(groups[&GroupKey::Absent].len(), 2);
    }

    #[test]
    fn test_anonymized_output_clears_exactly_clear_set() {
        let dir = fixture();
        let manager = manager(&dir, 1);
        let output = TempDir::new().unwrap();
        let options = AnonymizeOptions::default().with_clear_fields(["StudyID", "SeriesDescription"]);

        manager.anonymize(output.path(), &options).unwrap();

        let all_fields = FieldSet::from_names(&[
            "PatientName",
            "PatientID",
            "PatientBirthDate",
            "StudyDate",
            "StudyID",
            "Modality",
            "InstitutionName",
            "AccessionNumber",
            "SeriesDescription",
        ])
        .unwrap();

        for source in manager.table().file_paths() {
            let relative = source.strip_prefix(dir.path()).unwrap();
            let original = read_record(&source, &all_fields).unwrap();
            let anonymized = read_record(&output.path().join(relative), &all_fields).unwrap();

            for (before, after) in original.values().iter().zip(anonymized.values()) {
                let cleared = options.clear_fields.contains(&before.name);
                match (&before.value, cleared) {
                    (Some(_), true) => assert_eq!(after.value.as_deref(), Some("")),
                    _ => assert_eq!(before, after),
                }
            }
        }
    }

    #[test]
    fn test_worker_count_invariance() {
        let dir = fixture();
        let out_one = TempDir::new().unwrap();
        let out_four = TempDir::new().unwrap();

        let one = manager(&dir, 1)
            .anonymize(out_one.path(), &AnonymizeOptions::default())
            .unwrap();
        let four = manager(&dir, 1)
            .anonymize(out_four.path(), &AnonymizeOptions::default().num_workers(4))
            .unwrap();

        let strip = |set: &BTreeSet<PathBuf>, root: &Path| -> Vec<PathBuf> {
            set.iter()
                .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
                .collect()
        };
        assert_eq!(strip(&one, out_one.path()), strip(&four, out_four.path()));
    }

    #[test]
    fn test_filtered_table_mirrors_like_directory_mode() {
        let dir = fixture();
        let manager = manager(&dir, 2);
        let out_table = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();

        let mr = manager.filter(|r| r.get("Modality") == "MR");
        let from_table = manager
            .anonymize_table(&mr, out_table.path(), &AnonymizeOptions::default())
            .unwrap();
        let from_dir = manager
            .anonymize_directory(out_dir.path(), &AnonymizeOptions::default())
            .unwrap();

        assert_eq!(
            from_table.into_iter().collect::<Vec<_>>(),
            vec![out_table.path().join("p2/mr.dcm")]
        );
        assert_eq!(from_dir.len(), 3);
        assert!(from_dir.contains(&out_dir.path().join("p2/mr.dcm")));
    }

    #[test]
    fn test_template_layout_through_manager() {
        let dir = fixture();
        let manager = manager(&dir, 2);
        let output = TempDir::new().unwrap();
        let options = AnonymizeOptions::default()
            .layout(OutputLayout::Template("$PatientID$/$SOPInstanceUID$.dcm".to_string()));

        let written = manager.anonymize(output.path(), &options).unwrap();
        assert!(written.contains(&output.path().join("P1/3.1.dcm")));
        assert!(written.contains(&output.path().join("P2/3.3.dcm")));
    }

    #[test]
    fn test_cleared_tags_blank_in_output() {
        let dir = fixture();
        let manager = manager(&dir, 1);
        let output = TempDir::new().unwrap();
        manager
            .anonymize(output.path(), &AnonymizeOptions::default())
            .unwrap();

        let dcm = dicom_object::open_file(output.path().join("p1/ct_a.dcm")).unwrap();
        assert_eq!(dcm.element(STUDY_ID).unwrap().to_str().unwrap(), "");
        assert_eq!(dcm.element(SERIES_DESCRIPTION).unwrap().to_str().unwrap(), "");
        assert_eq!(dcm.element(MODALITY).unwrap().to_str().unwrap(), "CT");
    }
}
