//! Metadata report extraction.
//!
//! A [`Report`] is a fixed set of descriptive fields read off a DICOM object.
//! Each field is independently optional:
//! a missing attribute is rendered as [`NOT_AVAILABLE`] instead of failing.

use std::fmt;
use std::path::Path;

use dicom_core::{DataDictionary, Tag};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use tracing::{debug, warn};

use crate::attribute;

/// The placeholder shown for attributes which are not available.
pub const NOT_AVAILABLE: &str = "N/A";

/// The value of a single report field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// the attribute is present, in its displayable form
    Present(String),
    /// the attribute is missing or unreadable
    #[default]
    Absent,
}

impl FieldValue {
    /// Whether the field holds a value.
    pub fn is_present(&self) -> bool {
        matches!(self, FieldValue::Present(_))
    }

    /// The displayable value, if present.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Present(value) => Some(value),
            FieldValue::Absent => None,
        }
    }

    /// Render the value followed by a unit,
    /// leaving the unit out when the value is absent.
    fn with_unit(&self, unit: &str) -> String {
        match self {
            FieldValue::Present(value) => format!("{} {}", value, unit),
            FieldValue::Absent => NOT_AVAILABLE.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or(NOT_AVAILABLE))
    }
}

/// The physical size of the image in millimeters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RealSize {
    /// width in millimeters (columns times column spacing)
    pub width_mm: f64,
    /// height in millimeters (rows times row spacing)
    pub height_mm: f64,
}

impl fmt::Display for RealSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} mm x {:.2} mm", self.width_mm, self.height_mm)
    }
}

/// A presentation-ready description of a DICOM object.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// the base name of the file
    pub file_name: String,
    /// Columns
    pub columns: FieldValue,
    /// Rows
    pub rows: FieldValue,
    /// PixelSpacing, as `row x column`
    pub pixel_spacing: FieldValue,
    /// derived from the dimensions and pixel spacing
    pub real_size: Option<RealSize>,
    /// ImagePositionPatient
    pub image_position: FieldValue,
    /// ImageOrientationPatient
    pub image_orientation: FieldValue,
    /// PatientID
    pub patient_id: FieldValue,
    /// StudyDate
    pub study_date: FieldValue,
    /// Modality
    pub modality: FieldValue,
    /// InstitutionName
    pub institution: FieldValue,
    /// Manufacturer
    pub manufacturer: FieldValue,
    /// SeriesDescription
    pub series_description: FieldValue,
    /// SliceThickness
    pub slice_thickness: FieldValue,
    notes: Vec<String>,
}

impl Report {
    /// Append a diagnostic note, shown after the tag block.
    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// The diagnostic notes collected so far.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Render the report as an ordered sequence of text lines.
    ///
    /// The dimensions block comes first, followed by the tag block
    /// and any diagnostic notes.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("File: {}", self.file_name),
            String::new(),
            format!("Dimensions: {} x {} pixels", self.columns, self.rows),
            format!("Pixel Spacing: {}", self.pixel_spacing.with_unit("mm")),
        ];
        if let Some(real_size) = &self.real_size {
            lines.push(format!("Real Size: {}", real_size));
        }
        lines.extend([
            format!("Image Position: {}", self.image_position),
            format!("Image Orientation: {}", self.image_orientation),
            String::new(),
            "DICOM Tags:".to_string(),
            format!("Patient ID: {}", self.patient_id),
            format!("Study Date: {}", self.study_date),
            format!("Modality: {}", self.modality),
            format!("Institution: {}", self.institution),
            format!("Manufacturer: {}", self.manufacturer),
            format!("Series Description: {}", self.series_description),
            format!("Slice Thickness: {}", self.slice_thickness.with_unit("mm")),
        ]);
        if !self.notes.is_empty() {
            lines.push(String::new());
            lines.extend(self.notes.iter().cloned());
        }
        lines
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Build the metadata report of a DICOM object read from `path`.
pub fn extract<D>(obj: &InMemDicomObject<D>, path: impl AsRef<Path>) -> Report
where
    D: DataDictionary + Clone,
{
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let pixel_spacing = match text(obj, tags::PIXEL_SPACING, "PixelSpacing") {
        Some(values) if values.len() >= 2 => {
            FieldValue::Present(format!("{} x {}", values[0], values[1]))
        }
        Some(values) => FieldValue::Present(values.join("\\")),
        None => FieldValue::Absent,
    };

    Report {
        columns: single(obj, tags::COLUMNS, "Columns"),
        rows: single(obj, tags::ROWS, "Rows"),
        pixel_spacing,
        real_size: real_size(obj),
        image_position: list(obj, tags::IMAGE_POSITION_PATIENT, "ImagePositionPatient"),
        image_orientation: list(
            obj,
            tags::IMAGE_ORIENTATION_PATIENT,
            "ImageOrientationPatient",
        ),
        patient_id: single(obj, tags::PATIENT_ID, "PatientID"),
        study_date: single(obj, tags::STUDY_DATE, "StudyDate"),
        modality: single(obj, tags::MODALITY, "Modality"),
        institution: single(obj, tags::INSTITUTION_NAME, "InstitutionName"),
        manufacturer: single(obj, tags::MANUFACTURER, "Manufacturer"),
        series_description: single(obj, tags::SERIES_DESCRIPTION, "SeriesDescription"),
        slice_thickness: single(obj, tags::SLICE_THICKNESS, "SliceThickness"),
        file_name,
        notes: Vec::new(),
    }
}

/// Compute the physical size of the image.
///
/// This is best effort:
/// any missing or invalid prerequisite leaves the size out.
fn real_size<D>(obj: &InMemDicomObject<D>) -> Option<RealSize>
where
    D: DataDictionary + Clone,
{
    match try_real_size(obj) {
        Ok(Some(size)) => Some(size),
        Ok(None) => {
            debug!("Real size not available: missing dimensions or pixel spacing");
            None
        }
        Err(e) => {
            warn!(
                "Error calculating real dimensions: {}",
                snafu::Report::from_error(e)
            );
            None
        }
    }
}

fn try_real_size<D>(obj: &InMemDicomObject<D>) -> attribute::Result<Option<RealSize>>
where
    D: DataDictionary + Clone,
{
    let (Some(columns), Some(rows), Some([row_spacing, column_spacing])) = (
        attribute::columns(obj)?,
        attribute::rows(obj)?,
        attribute::pixel_spacing(obj)?,
    ) else {
        return Ok(None);
    };
    Ok(Some(RealSize {
        width_mm: columns * column_spacing,
        height_mm: rows * row_spacing,
    }))
}

/// Read an attribute as text, logging and discarding unreadable values.
fn text<D>(obj: &InMemDicomObject<D>, tag: Tag, name: &'static str) -> Option<Vec<String>>
where
    D: DataDictionary + Clone,
{
    attribute::text_values(obj, tag, name).unwrap_or_else(|e| {
        warn!("{}", snafu::Report::from_error(e));
        None
    })
}

/// A field displayed as its raw value,
/// with multiple values kept in their backslash-separated form.
fn single<D>(obj: &InMemDicomObject<D>, tag: Tag, name: &'static str) -> FieldValue
where
    D: DataDictionary + Clone,
{
    text(obj, tag, name)
        .map(|values| FieldValue::Present(values.join("\\")))
        .unwrap_or_default()
}

/// A field displayed as a bracketed list of values.
fn list<D>(obj: &InMemDicomObject<D>, tag: Tag, name: &'static str) -> FieldValue
where
    D: DataDictionary + Clone,
{
    text(obj, tag, name)
        .map(|values| FieldValue::Present(format!("[{}]", values.join(", "))))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{dicom_value, PrimitiveValue, VR};
    use dicom_object::mem::InMemElement;
    use rstest::rstest;

    fn ct_object() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            InMemElement::new(tags::ROWS, VR::US, PrimitiveValue::from(512_u16)),
            InMemElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(512_u16)),
            InMemElement::new(
                tags::PIXEL_SPACING,
                VR::DS,
                dicom_value!(Strs, ["0.5", "0.5"]),
            ),
            InMemElement::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                dicom_value!(Strs, ["-125", "-125", "0"]),
            ),
            InMemElement::new(tags::PATIENT_ID, VR::LO, dicom_value!(Strs, ["PAT-001 "])),
            InMemElement::new(tags::STUDY_DATE, VR::DA, dicom_value!(Strs, ["20240131"])),
            InMemElement::new(tags::MODALITY, VR::CS, dicom_value!(Strs, ["CT"])),
            InMemElement::new(tags::SLICE_THICKNESS, VR::DS, dicom_value!(Strs, ["2.5"])),
        ])
    }

    #[test]
    fn report_of_ct_object() {
        let report = extract(&ct_object(), "/sdcard/scans/head.dcm");

        assert_eq!(report.file_name, "head.dcm");
        assert_eq!(report.columns, FieldValue::Present("512".to_string()));
        assert_eq!(
            report.real_size,
            Some(RealSize {
                width_mm: 256.,
                height_mm: 256.
            })
        );
        assert_eq!(report.patient_id.as_str(), Some("PAT-001"));
        assert_eq!(report.institution, FieldValue::Absent);

        let lines = report.lines();
        assert_eq!(
            lines,
            vec![
                "File: head.dcm",
                "",
                "Dimensions: 512 x 512 pixels",
                "Pixel Spacing: 0.5 x 0.5 mm",
                "Real Size: 256.00 mm x 256.00 mm",
                "Image Position: [-125, -125, 0]",
                "Image Orientation: N/A",
                "",
                "DICOM Tags:",
                "Patient ID: PAT-001",
                "Study Date: 20240131",
                "Modality: CT",
                "Institution: N/A",
                "Manufacturer: N/A",
                "Series Description: N/A",
                "Slice Thickness: 2.5 mm",
            ]
        );
    }

    #[rstest]
    #[case(tags::ROWS)]
    #[case(tags::COLUMNS)]
    #[case(tags::PIXEL_SPACING)]
    fn real_size_needs_all_prerequisites(#[case] missing: Tag) {
        let mut obj = ct_object();
        obj.remove_element(missing);

        let report = extract(&obj, "head.dcm");
        assert_eq!(report.real_size, None);
        assert!(report
            .lines()
            .iter()
            .all(|line| !line.starts_with("Real Size")));
    }

    #[test]
    fn unparseable_spacing_is_omitted() {
        let mut obj = ct_object();
        obj.put(InMemElement::new(
            tags::PIXEL_SPACING,
            VR::DS,
            dicom_value!(Strs, ["half", "0.5"]),
        ));

        let report = extract(&obj, "head.dcm");
        assert_eq!(report.real_size, None);
        assert_eq!(report.pixel_spacing.as_str(), Some("half x 0.5"));
        assert!(report.notes().is_empty());
    }

    #[test]
    fn empty_object_is_all_sentinels() {
        let report = extract(&InMemDicomObject::new_empty(), "empty.dcm");
        for field in [
            &report.columns,
            &report.rows,
            &report.pixel_spacing,
            &report.image_position,
            &report.image_orientation,
            &report.patient_id,
            &report.study_date,
            &report.modality,
            &report.institution,
            &report.manufacturer,
            &report.series_description,
            &report.slice_thickness,
        ] {
            assert_eq!(field, &FieldValue::Absent);
            assert_eq!(field.to_string(), NOT_AVAILABLE);
        }
        assert_eq!(report.real_size, None);
        assert!(report
            .lines()
            .contains(&"Dimensions: N/A x N/A pixels".to_string()));
        assert!(report.lines().contains(&"Slice Thickness: N/A".to_string()));
    }

    #[test]
    fn notes_follow_the_tag_block() {
        let mut report = extract(&ct_object(), "head.dcm");
        report.push_note("Image not displayed: pixel array is empty");

        let lines = report.lines();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Image not displayed: pixel array is empty")
        );
        assert_eq!(lines[lines.len() - 2], "");
    }
}
