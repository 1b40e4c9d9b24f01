//! Field-clearing anonymization
//!
//! Each file is read in full, the configured fields it carries are blanked,
//! and the result is written below the output directory together with the
//! untouched pixel data. Files that fail to read or write are logged and
//! skipped.

mod naming;

pub use naming::{sanitize_component, PathTemplate, UNKNOWN};

use crate::error::{OrganizerError, Result};
use crate::extraction::discover_files;
use crate::parallel::Dispatcher;
use crate::types::{FieldSet, OutputLayout};
use dicom_core::{DataElement, PrimitiveValue};
use dicom_object::{open_file, InMemDicomObject};
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Blanks every field of `clear` that `dcm` carries
///
/// Absent fields stay absent. The element keeps its tag and VR; only the
/// value is replaced by an empty one. Returns the number of cleared fields.
pub fn clear_fields(dcm: &mut InMemDicomObject, clear: &FieldSet) -> usize {
    let mut cleared = 0;
    for field in clear {
        let vr = match dcm.element(field.tag()) {
            Ok(elem) => elem.vr(),
            Err(_) => continue,
        };
        dcm.put(DataElement::new(field.tag(), vr, PrimitiveValue::Empty));
        cleared += 1;
    }
    cleared
}

#[derive(Debug)]
enum Layout {
    Mirror,
    Template(PathTemplate),
}

/// Writes anonymized copies of DICOM files into an output directory
///
/// Each output path is claimed by the first source file that renders to it;
/// later files rendering to the same path are skipped.
#[derive(Debug)]
pub struct Anonymizer {
    source_root: PathBuf,
    output_dir: PathBuf,
    clear: FieldSet,
    layout: Layout,
    claimed: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl Anonymizer {
    /// Prepares an anonymizer and creates the output directory
    ///
    /// An existing output directory is reused as is; colliding files are
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the output directory is the source
    /// directory or the template is invalid, and an I/O error if the output
    /// directory cannot be created.
    pub fn new(
        source_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        clear: FieldSet,
        layout: &OutputLayout,
    ) -> Result<Self> {
        let source_root = source_root.into();
        let output_dir = output_dir.into();

        let layout = match layout {
            OutputLayout::Mirror => Layout::Mirror,
            OutputLayout::Template(t) => Layout::Template(PathTemplate::parse(t)?),
        };

        if is_same_dir(&source_root, &output_dir) {
            return Err(OrganizerError::config(format!(
                "output directory {} cannot be the source directory",
                output_dir.display()
            )));
        }
        fs::create_dir_all(&output_dir)?;

        Ok(Self {
            source_root,
            output_dir,
            clear,
            layout,
            claimed: Mutex::new(HashMap::new()),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output location of `source` given its decoded content
    ///
    /// Mirroring keeps the path relative to the source root, so equal file
    /// names in different subdirectories do not collide.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizerError::Encode`] when mirroring a file that is not
    /// below the source root.
    pub fn output_path(&self, source: &Path, dcm: &InMemDicomObject) -> Result<PathBuf> {
        match &self.layout {
            Layout::Mirror => source
                .strip_prefix(&self.source_root)
                .map(|relative| self.output_dir.join(relative))
                .map_err(|_| OrganizerError::Encode {
                    path: source.to_path_buf(),
                    message: format!("not below source directory {}", self.source_root.display()),
                }),
            Layout::Template(template) => Ok(self.output_dir.join(template.render(dcm))),
        }
    }

    /// Reserves `target` for `source`
    ///
    /// Fails with [`OrganizerError::Encode`], which the dispatcher logs at
    /// `warn`, if another source file already claimed the same output path.
    fn claim(&self, target: &Path, source: &Path) -> Result<()> {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(owner) = claimed.get(target).filter(|owner| owner.as_path() != source) {
            return Err(OrganizerError::Encode {
                path: target.to_path_buf(),
                message: format!("output path already claimed by {}", owner.display()),
            });
        }
        claimed.insert(target.to_path_buf(), source.to_path_buf());
        Ok(())
    }

    /// Anonymizes one file and returns the written path
    ///
    /// # Errors
    ///
    /// [`OrganizerError::Decode`] if the source cannot be read and
    /// [`OrganizerError::Encode`] if the result cannot be written.
    pub fn anonymize_file(&self, source: &Path) -> Result<PathBuf> {
        let mut dcm = open_file(source).map_err(|e| OrganizerError::Decode {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;

        // Template values come from the file before clearing
        let target = self.output_path(source, &dcm)?;
        self.claim(&target, source)?;
        let cleared = clear_fields(&mut dcm, &self.clear);

        let encode_error = |message: String| OrganizerError::Encode {
            path: target.clone(),
            message,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| encode_error(e.to_string()))?;
        }
        dcm.write_to_file(&target)
            .map_err(|e| encode_error(e.to_string()))?;

        debug!(
            "Anonymized {} -> {} ({} fields cleared)",
            source.display(),
            target.display(),
            cleared
        );
        Ok(target)
    }

    /// Anonymizes `files` and returns the set of written paths
    ///
    /// Failed files are absent from the result, as are files that already
    /// live inside the output directory.
    pub fn run(&self, files: Vec<PathBuf>, dispatcher: &Dispatcher) -> Result<BTreeSet<PathBuf>> {
        let files: Vec<PathBuf> = files
            .into_iter()
            .filter(|file| {
                let inside = is_within(file, &self.output_dir);
                if inside {
                    debug!("Ignoring {}: inside the output directory", file.display());
                }
                !inside
            })
            .collect();
        let requested = files.len();
        let written: BTreeSet<PathBuf> = dispatcher
            .run(
                files,
                |path| self.anonymize_file(&path),
                "Anonymizing DICOM files",
            )?
            .into_iter()
            .collect();

        info!(
            "Anonymized {} of {} files into {}",
            written.len(),
            requested,
            self.output_dir.display()
        );
        Ok(written)
    }
}

/// Anonymizes every file discovered below `source_root`
pub fn anonymize_directory(
    source_root: &Path,
    output_dir: &Path,
    clear: FieldSet,
    layout: &OutputLayout,
    dispatcher: &Dispatcher,
) -> Result<BTreeSet<PathBuf>> {
    if !source_root.is_dir() {
        return Err(OrganizerError::config(format!(
            "source directory {} does not exist",
            source_root.display()
        )));
    }
    let files = discover_files(source_root);
    let anonymizer = Anonymizer::new(source_root, output_dir, clear, layout)?;
    anonymizer.run(files, dispatcher)
}

fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn is_within(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => path.starts_with(dir),
    }
}
