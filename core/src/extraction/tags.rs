use dicom_core::dictionary::DataDictionary;
use dicom_core::Tag;
use dicom_dictionary_std::StandardDataDictionary;
use dicom_object::InMemDicomObject;

// Patient Tags
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
pub const PATIENT_BIRTH_DATE: Tag = Tag(0x0010, 0x0030);
pub const PATIENT_AGE: Tag = Tag(0x0010, 0x1010);

// Study/Series Identification Tags
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
pub const ACCESSION_NUMBER: Tag = Tag(0x0008, 0x0050);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
pub const STUDY_ID: Tag = Tag(0x0020, 0x0010);

// Institution/Site Tags
pub const INSTITUTION_NAME: Tag = Tag(0x0008, 0x0080);
pub const STATION_NAME: Tag = Tag(0x0008, 0x1010);

// Description Tags
pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);

// Image Tags
pub const BURNED_IN_ANNOTATION: Tag = Tag(0x0028, 0x0301);
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

/// Resolves a field name to its DICOM tag
///
/// Accepts dictionary keywords (`PatientName`), tag expressions
/// (`(0010,0010)`, `0010,0010`) and bare hexadecimal (`00100010`).
pub fn resolve_tag(name: &str) -> Option<Tag> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some(tag) = StandardDataDictionary.parse_tag(name) {
        return Some(tag);
    }

    // Bare hex as written in exported tag lists
    if name.len() == 8 && name.chars().all(|c| c.is_ascii_hexdigit()) {
        let raw = u32::from_str_radix(name, 16).ok()?;
        return Some(Tag((raw >> 16) as u16, (raw & 0xFFFF) as u16));
    }

    None
}

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| trim_padding(&s).to_string())
}

/// Helper to get the rendered value of an element that may not be textual
///
/// Returns `None` only when the element is absent. Present elements that
/// cannot be rendered as text (sequences, binary blobs) yield an empty string.
pub fn get_field_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag).ok().map(|elem| {
        elem.to_str()
            .map(|s| trim_padding(&s).to_string())
            .unwrap_or_default()
    })
}

/// Strips the space and NUL padding DICOM applies to text values
fn trim_padding(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}
