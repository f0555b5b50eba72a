//! Utility module for fetching optional attributes from a DICOM object.
//!
//! Absence of an attribute is never an error here:
//! lookups return `None` when the element is missing or empty.
//! Errors are only raised when a present value cannot be interpreted.

use dicom_core::{DataDictionary, Tag};
use dicom_dictionary_std::tags;
use dicom_object::{mem::InMemElement, InMemDicomObject};
use snafu::{ensure, Backtrace, ResultExt, Snafu};

use crate::transform::{ParseVoiLutFunctionError, VoiLutFunction};

#[derive(Debug, Snafu)]
pub enum GetAttributeError {
    #[snafu(display("Could not convert attribute `{}`", name))]
    ConvertValue {
        name: &'static str,
        source: dicom_core::value::ConvertValueError,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not read attribute `{}` as text", name))]
    CastValue {
        name: &'static str,
        source: dicom_core::value::CastValueError,
        backtrace: Backtrace,
    },

    #[snafu(display("Semantically invalid value `{}` for attribute `{}`", value, name))]
    InvalidValue {
        name: &'static str,
        value: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported VOI LUT function"))]
    UnsupportedVoiLutFunction {
        source: ParseVoiLutFunctionError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = GetAttributeError> = std::result::Result<T, E>;

/// Fetch an element which is present and holds at least one non-blank value.
pub fn element<D>(obj: &InMemDicomObject<D>, tag: Tag) -> Option<&InMemElement<D>>
where
    D: DataDictionary + Clone,
{
    let elem = obj.get(tag)?;
    match elem.to_multi_str() {
        Ok(values) if values.iter().all(|v| trim(v).is_empty()) => None,
        _ => Some(elem),
    }
}

/// Retrieve the values of an attribute as trimmed strings,
/// one per value in the element.
pub fn text_values<D>(
    obj: &InMemDicomObject<D>,
    tag: Tag,
    name: &'static str,
) -> Result<Option<Vec<String>>>
where
    D: DataDictionary + Clone,
{
    let Some(elem) = element(obj, tag) else {
        return Ok(None);
    };
    let values = elem.to_multi_str().context(CastValueSnafu { name })?;
    Ok(Some(values.iter().map(|v| trim(v).to_string()).collect()))
}

/// Retrieve the values of an attribute as 64-bit floats.
pub fn float_values<D>(
    obj: &InMemDicomObject<D>,
    tag: Tag,
    name: &'static str,
) -> Result<Option<Vec<f64>>>
where
    D: DataDictionary + Clone,
{
    let Some(elem) = element(obj, tag) else {
        return Ok(None);
    };
    let values = elem
        .to_multi_float64()
        .context(ConvertValueSnafu { name })?;
    ensure!(
        values.iter().all(|v| v.is_finite()),
        InvalidValueSnafu {
            name,
            value: format!("{:?}", values),
        }
    );
    Ok(Some(values))
}

/// Retrieve the first value of an attribute as a 64-bit float.
#[inline]
fn first_float<D>(obj: &InMemDicomObject<D>, tag: Tag, name: &'static str) -> Result<Option<f64>>
where
    D: DataDictionary + Clone,
{
    Ok(float_values(obj, tag, name)?.and_then(|values| values.first().copied()))
}

/// Retrieve the Columns from the DICOM object if it exists.
pub fn columns<D: DataDictionary + Clone>(obj: &InMemDicomObject<D>) -> Result<Option<f64>> {
    first_float(obj, tags::COLUMNS, "Columns")
}

/// Retrieve the Rows from the DICOM object if it exists.
pub fn rows<D: DataDictionary + Clone>(obj: &InMemDicomObject<D>) -> Result<Option<f64>> {
    first_float(obj, tags::ROWS, "Rows")
}

/// Retrieve the PixelSpacing (row spacing, column spacing)
/// from the DICOM object if it exists.
pub fn pixel_spacing<D: DataDictionary + Clone>(
    obj: &InMemDicomObject<D>,
) -> Result<Option<[f64; 2]>> {
    let Some(values) = float_values(obj, tags::PIXEL_SPACING, "PixelSpacing")? else {
        return Ok(None);
    };
    match values[..] {
        [row, column, ..] => Ok(Some([row, column])),
        _ => InvalidValueSnafu {
            name: "PixelSpacing",
            value: format!("{:?}", values),
        }
        .fail(),
    }
}

/// Retrieve the WindowCenter from the DICOM object if it exists.
///
/// Only the first window is considered.
pub fn window_center<D: DataDictionary + Clone>(obj: &InMemDicomObject<D>) -> Result<Option<f64>> {
    first_float(obj, tags::WINDOW_CENTER, "WindowCenter")
}

/// Retrieve the WindowWidth from the DICOM object if it exists.
///
/// Only the first window is considered.
pub fn window_width<D: DataDictionary + Clone>(obj: &InMemDicomObject<D>) -> Result<Option<f64>> {
    first_float(obj, tags::WINDOW_WIDTH, "WindowWidth")
}

/// Retrieve the RescaleSlope from the DICOM object if it exists.
pub fn rescale_slope<D: DataDictionary + Clone>(obj: &InMemDicomObject<D>) -> Result<Option<f64>> {
    first_float(obj, tags::RESCALE_SLOPE, "RescaleSlope")
}

/// Retrieve the RescaleIntercept from the DICOM object if it exists.
pub fn rescale_intercept<D: DataDictionary + Clone>(
    obj: &InMemDicomObject<D>,
) -> Result<Option<f64>> {
    first_float(obj, tags::RESCALE_INTERCEPT, "RescaleIntercept")
}

/// Get the VOILUTFunction from the DICOM object,
/// `LINEAR` if it is not present.
pub fn voi_lut_function<D: DataDictionary + Clone>(
    obj: &InMemDicomObject<D>,
) -> Result<VoiLutFunction> {
    let Some(values) = text_values(obj, tags::VOILUT_FUNCTION, "VOILUTFunction")? else {
        return Ok(VoiLutFunction::default());
    };
    match values.first() {
        Some(name) => name.parse::<VoiLutFunction>().context(UnsupportedVoiLutFunctionSnafu),
        None => Ok(VoiLutFunction::default()),
    }
}

/// Strip the padding characters which DICOM allows in text values.
#[inline]
fn trim(value: &str) -> &str {
    value.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}
