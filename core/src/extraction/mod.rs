pub mod catalog;
pub mod tags;

pub use catalog::{discover_files, read_record, CatalogBuilder};
pub use tags::*;
