//! Core type definitions for DICOM cataloguing
//!
//! This module provides the fundamental types used throughout the dicomorg library:
//! - [`Field`] / [`FieldSet`]: Field keywords resolved to DICOM tags
//! - [`Record`]: One extracted row per source file
//! - [`MetadataTable`]: The record set with an optional group key
//! - [`FieldFilter`]: Declarative hard-exclusion filter over records
//! - [`ManagerConfig`] / [`AnonymizeOptions`]: Builder-style configuration

mod config;
mod field;
mod filter;
mod record;
mod table;

pub use config::{AnonymizeOptions, ManagerConfig, OutputLayout};
pub use field::{Field, FieldSet, DEFAULT_CLEAR_FIELDS, DEFAULT_FIELDS};
pub use filter::{FieldFilter, FilterRule};
pub use record::{FieldValue, Record, ABSENT};
pub use table::{GroupKey, Groups, MetadataTable};
