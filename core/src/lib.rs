pub mod anonymize;
pub mod api;
pub mod cli;
pub mod error;
pub mod extraction;
pub mod parallel;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use anonymize::{anonymize_directory, clear_fields, Anonymizer, PathTemplate};
pub use api::DicomManager;
pub use cli::report::TableReport;
pub use error::{OrganizerError, Result};
pub use extraction::{discover_files, read_record, CatalogBuilder};
pub use parallel::Dispatcher;
pub use types::*;
