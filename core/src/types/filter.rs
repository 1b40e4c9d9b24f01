use super::record::Record;
use crate::error::{OrganizerError, Result};
use std::collections::HashSet;
use std::fmt;

/// Keeps the records for which `predicate` returns true
///
/// The predicate is called exactly once per record, in slice order.
pub(crate) fn filter_records<F>(records: &[Record], mut predicate: F) -> Vec<Record>
where
    F: FnMut(&Record) -> bool,
{
    records
        .iter()
        .filter(|r| predicate(*r))
        .cloned()
        .collect()
}

/// Fallible variant of [`filter_records`]; stops at the first error
pub(crate) fn try_filter_records<F, E>(records: &[Record], mut predicate: F) -> Result<Vec<Record>>
where
    F: FnMut(&Record) -> std::result::Result<bool, E>,
    E: fmt::Display,
{
    let mut kept = Vec::new();
    for record in records {
        let keep = predicate(record).map_err(|e| OrganizerError::Predicate {
            path: record.file_path().to_path_buf(),
            message: e.to_string(),
        })?;
        if keep {
            kept.push(record.clone());
        }
    }
    Ok(kept)
}

/// Declarative record filter
///
/// All rules use hard exclusion: a record must satisfy every rule to pass.
/// Comparisons use the rendered value, so an absent field compares as the
/// empty string.
///
/// # Example
///
/// ```
/// use dicomorg_core::FieldFilter;
///
/// let filter = FieldFilter::default()
///     .require_any("Modality", ["CT", "MR"])
///     .exclude("BurnedInAnnotation", "YES")
///     .require_present("PatientID");
///
/// assert_eq!(filter.rule_count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldFilter {
    rules: Vec<FilterRule>,
}

/// A single rule of a [`FieldFilter`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "kebab-case"))]
pub enum FilterRule {
    /// Field value must be one of the allowed values (whitelist)
    OneOf { field: String, values: HashSet<String> },
    /// Field value must differ from the given value
    Not { field: String, value: String },
    /// Field must be carried by the file
    Present { field: String },
}

impl FilterRule {
    fn matches(&self, record: &Record) -> bool {
        match self {
            FilterRule::OneOf { field, values } => values.contains(record.get(field)),
            FilterRule::Not { field, value } => record.get(field) != value.as_str(),
            FilterRule::Present { field } => record.is_present(field),
        }
    }
}

impl FieldFilter {
    /// Parses a `FIELD=VALUE` or `FIELD!=VALUE` expression and adds it
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the expression has no operator or
    /// an empty field name.
    pub fn with_expression(self, expr: &str) -> Result<Self> {
        if let Some((field, value)) = expr.split_once("!=") {
            let field = non_empty_field(field, expr)?;
            return Ok(self.exclude(field, value.trim()));
        }
        if let Some((field, value)) = expr.split_once('=') {
            let field = non_empty_field(field, expr)?;
            return Ok(self.require(field, value.trim()));
        }
        Err(OrganizerError::config(format!(
            "filter expression '{}' must look like FIELD=VALUE or FIELD!=VALUE",
            expr
        )))
    }

    /// Builder: field must equal `value`
    pub fn require(self, field: &str, value: &str) -> Self {
        self.require_any(field, [value])
    }

    /// Builder: field must equal one of `values`
    pub fn require_any<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(FilterRule::OneOf {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Builder: field must not equal `value`
    pub fn exclude(mut self, field: &str, value: &str) -> Self {
        self.rules.push(FilterRule::Not {
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Builder: field must be present in the file
    pub fn require_present(mut self, field: &str) -> Self {
        self.rules.push(FilterRule::Present {
            field: field.to_string(),
        });
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether the record passes every rule; an empty filter passes everything
    pub fn matches(&self, record: &Record) -> bool {
        self.rules.iter().all(|rule| rule.matches(record))
    }
}

fn non_empty_field<'a>(field: &'a str, expr: &str) -> Result<&'a str> {
    let field = field.trim();
    if field.is_empty() {
        Err(OrganizerError::config(format!(
            "filter expression '{}' has no field name",
            expr
        )))
    } else {
        Ok(field)
    }
}
