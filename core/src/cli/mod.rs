pub mod report;

use crate::error::Result;
use crate::extraction::tags::resolve_tag;
use crate::types::{AnonymizeOptions, FieldFilter, ManagerConfig, OutputLayout, DEFAULT_FIELDS};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::error;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line arguments for dicomorg
#[derive(Parser, Debug)]
#[command(name = "dicomorg")]
#[command(about = "Catalog, filter and anonymize directories of DICOM files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract metadata from every DICOM file below a directory
    Catalog(CatalogArgs),
    /// Write copies of DICOM files with identifying fields cleared
    Anonymize(AnonymizeArgs),
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Directory containing DICOM files
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Fields to extract (keywords or tags, comma separated)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Field to group the table by
    #[arg(short, long)]
    pub group_by: Option<String>,

    /// Keep only records matching FIELD=VALUE or FIELD!=VALUE (repeatable)
    #[arg(short = 'w', long = "where", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Number of worker threads
    #[arg(short = 'j', long, default_value_t = 1)]
    pub workers: usize,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,
}

impl CatalogArgs {
    /// Manager configuration extracting the requested fields plus the filter fields
    pub fn manager_config(&self) -> ManagerConfig {
        let base: Vec<String> = if self.fields.is_empty() {
            DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect()
        } else {
            self.fields.clone()
        };

        let mut config = ManagerConfig::new(&self.directory)
            .with_fields(with_filter_fields(base, &self.filters))
            .num_workers(self.workers)
            .show_progress(self.progress);
        if let Some(key) = &self.group_by {
            config = config.group_by(key.clone());
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Directory containing DICOM files
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Directory receiving the anonymized files (created if missing)
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Text file listing the fields to clear, one keyword or tag per line
    #[arg(long, value_name = "FILE")]
    pub clear_tags: Option<PathBuf>,

    /// Only anonymize records matching FIELD=VALUE or FIELD!=VALUE (repeatable)
    #[arg(short = 'w', long = "where", value_name = "EXPR")]
    pub filters: Vec<String>,

    /// Number of worker threads
    #[arg(short = 'j', long, default_value_t = 2)]
    pub workers: usize,

    /// Output path template such as "$PatientID$/$SOPInstanceUID$.dcm"
    #[arg(short, long)]
    pub template: Option<String>,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,
}

impl AnonymizeArgs {
    /// Manager configuration extracting the default fields plus the filter fields
    pub fn manager_config(&self) -> ManagerConfig {
        let base = DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect();
        ManagerConfig::new(&self.input)
            .with_fields(with_filter_fields(base, &self.filters))
            .num_workers(self.workers)
            .show_progress(self.progress)
    }

    pub fn anonymize_options(&self) -> Result<AnonymizeOptions> {
        let mut options = AnonymizeOptions::default().num_workers(self.workers);
        if let Some(path) = &self.clear_tags {
            options = options.with_clear_fields(load_clear_tags(path)?);
        }
        if let Some(template) = &self.template {
            options = options.layout(OutputLayout::Template(template.clone()));
        }
        Ok(options)
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
    /// File paths only (one per line)
    Paths,
}

/// Builds a filter from `FIELD=VALUE` / `FIELD!=VALUE` expressions
pub fn build_filter(expressions: &[String]) -> Result<FieldFilter> {
    expressions
        .iter()
        .try_fold(FieldFilter::default(), |filter, expr| filter.with_expression(expr))
}

/// Field names referenced by filter expressions
pub fn filter_fields(expressions: &[String]) -> Vec<String> {
    expressions
        .iter()
        .filter_map(|expr| expr.split(['=', '!']).next())
        .map(|field| field.trim().to_string())
        .filter(|field| !field.is_empty())
        .collect()
}

/// Appends the fields referenced by filter expressions that `fields` lacks
fn with_filter_fields(mut fields: Vec<String>, expressions: &[String]) -> Vec<String> {
    for field in filter_fields(expressions) {
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields
}

/// Reads a clear-tags file
pub fn load_clear_tags(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_clear_tags(&contents))
}

/// Parses clear-tags file contents
///
/// Blank lines and `#` comments are ignored. Entries that are neither a
/// keyword nor a tag are logged and skipped.
pub fn parse_clear_tags(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            let known = resolve_tag(line).is_some();
            if !known {
                error!("Error processing drop tag '{}': not a DICOM keyword or tag", line);
            }
            known
        })
        .map(str::to_string)
        .collect()
}
