//! Output path templates
//!
//! A template is a relative path with `$Keyword$` placeholders, such as
//! `$PatientID$/$StudyDate$/$SOPInstanceUID$.dcm`. A placeholder may list
//! fallbacks separated by `?`; the first field the file carries wins.

use crate::error::{OrganizerError, Result};
use crate::extraction::tags::{get_string_value, resolve_tag};
use dicom_core::Tag;
use dicom_object::InMemDicomObject;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// Rendering of a placeholder whose fields are all missing
pub const UNKNOWN: &str = "UNKNOWN";

const INVALID_CHARACTERS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone)]
struct Placeholder {
    token: String,
    candidates: Vec<Tag>,
}

/// Compiled output path template
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    placeholders: Vec<Placeholder>,
}

impl PathTemplate {
    /// Compiles a template, resolving every placeholder keyword
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty template, an unknown
    /// keyword, or a template that is absolute or contains `..`.
    pub fn parse(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(OrganizerError::config("output template is empty"));
        }
        let escapes = Path::new(template).components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes {
            return Err(OrganizerError::config(format!(
                "output template '{}' must be a relative path without '..'",
                template
            )));
        }

        let pattern = Regex::new(r"\$([^$]+)\$")
            .map_err(|e| OrganizerError::config(format!("template pattern: {}", e)))?;

        let mut placeholders = Vec::new();
        for caps in pattern.captures_iter(template) {
            let candidates = caps[1]
                .split('?')
                .map(|name| {
                    resolve_tag(name).ok_or_else(|| {
                        OrganizerError::config(format!(
                            "unknown DICOM field '{}' in output template",
                            name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            placeholders.push(Placeholder {
                token: caps[0].to_string(),
                candidates,
            });
        }

        Ok(Self {
            raw: template.to_string(),
            placeholders,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Renders the relative output path for a decoded file
    ///
    /// Substituted values are sanitized; spaces anywhere become `_`.
    pub fn render(&self, dcm: &InMemDicomObject) -> PathBuf {
        let mut rendered = self.raw.clone();
        for placeholder in &self.placeholders {
            let value = placeholder
                .candidates
                .iter()
                .filter_map(|tag| get_string_value(dcm, *tag))
                .map(|v| sanitize_component(&v))
                .find(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string());
            rendered = rendered.replace(&placeholder.token, &value);
        }

        PathBuf::from(rendered.replace(' ', "_"))
    }
}

/// Makes a field value safe to use as a single path component
pub fn sanitize_component(value: &str) -> String {
    let mut name: String = value
        .chars()
        .map(|c| {
            if INVALID_CHARACTERS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if RESERVED_NAMES.contains(&name.to_uppercase().as_str()) {
        name.push('_');
    }

    name.trim_matches('.').trim().to_string()
}
