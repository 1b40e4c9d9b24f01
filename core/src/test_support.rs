//! Synthetic DICOM fixtures for unit tests

use crate::extraction::tags::{
    ACCESSION_NUMBER, INSTITUTION_NAME, MODALITY, PATIENT_BIRTH_DATE, PATIENT_ID, PATIENT_NAME,
    PIXEL_DATA, SOP_CLASS_UID, SOP_INSTANCE_UID, STUDY_DATE, STUDY_ID,
};
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::InMemDicomObject;
use std::fs;
use std::path::Path;

const SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";
const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

/// Pixel payload written into every fixture
pub const PIXELS: [u8; 8] = [0, 1, 2, 3, 250, 251, 252, 253];

/// Description of a fixture file
pub struct TestFile {
    sop_instance_uid: String,
    elements: Vec<(Tag, VR, String)>,
}

impl TestFile {
    /// Fixture with the given SOP instance UID and a few identifying fields
    pub fn new(sop_instance_uid: &str) -> Self {
        Self {
            sop_instance_uid: sop_instance_uid.to_string(),
            elements: vec![
                (PATIENT_NAME, VR::PN, "Doe^Jane".to_string()),
                (PATIENT_BIRTH_DATE, VR::DA, "19700101".to_string()),
                (STUDY_DATE, VR::DA, "20240102".to_string()),
                (STUDY_ID, VR::SH, "S-77".to_string()),
                (INSTITUTION_NAME, VR::LO, "General Hospital".to_string()),
                (ACCESSION_NUMBER, VR::SH, "ACC123".to_string()),
            ],
        }
    }

    pub fn modality(self, modality: &str) -> Self {
        self.with(MODALITY, VR::CS, modality)
    }

    pub fn patient(self, patient_id: &str) -> Self {
        self.with(PATIENT_ID, VR::LO, patient_id)
    }

    /// Adds or replaces a textual element
    pub fn with(mut self, tag: Tag, vr: VR, value: &str) -> Self {
        self.elements.retain(|(t, _, _)| *t != tag);
        self.elements.push((tag, vr, value.to_string()));
        self
    }

    /// Removes an element
    pub fn without(mut self, tag: Tag) -> Self {
        self.elements.retain(|(t, _, _)| *t != tag);
        self
    }
}

/// Writes a fixture as a DICOM Part 10 file, creating parent directories
pub fn write_dicom(path: &Path, file: &TestFile) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }

    let mut dcm = InMemDicomObject::new_empty();
    dcm.put(DataElement::new(
        SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(SECONDARY_CAPTURE),
    ));
    dcm.put(DataElement::new(
        SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(file.sop_instance_uid.as_str()),
    ));
    for (tag, vr, value) in &file.elements {
        dcm.put(DataElement::new(*tag, *vr, PrimitiveValue::from(value.as_str())));
    }
    dcm.put(DataElement::new(
        PIXEL_DATA,
        VR::OB,
        PrimitiveValue::from(PIXELS.to_vec()),
    ));

    let obj = dcm
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(SECONDARY_CAPTURE)
                .media_storage_sop_instance_uid(file.sop_instance_uid.as_str()),
        )
        .unwrap();
    obj.write_to_file(path).unwrap();
}

/// Writes a file that is not DICOM
pub fn write_garbage(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"this is not a DICOM file").unwrap();
}
