//! The decoded dataset: a DICOM object together with its pixel array.

use std::path::Path;

use dicom_core::DataDictionary;
use dicom_dictionary_std::{tags, StandardDataDictionary};
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use ndarray::{ArrayD, ArrayViewD, Axis};
use snafu::{ensure, ResultExt, Snafu};
use tracing::{debug, warn};

/// The file could not be read as a DICOM object.
#[derive(Debug, Snafu)]
pub enum OpenError {
    #[snafu(display("Could not read DICOM file {}", path))]
    ReadFile {
        path: String,
        source: dicom_object::ReadError,
    },
}

/// The pixel array of a dataset is not available.
#[derive(Debug, Snafu)]
pub enum PixelDataError {
    #[snafu(display("The dataset has no pixel data"))]
    MissingPixelData,

    #[snafu(display("Could not decode pixel data"))]
    DecodePixelData {
        source: dicom_pixeldata::Error,
    },

    #[snafu(display("Could not convert pixel data into an array"))]
    ConvertPixelData {
        source: dicom_pixeldata::Error,
    },

    #[snafu(display("The pixel data has no frames"))]
    NoFrames,
}

/// A read-only DICOM object and its pixel array.
///
/// The pixel array holds the stored sample values of the first frame,
/// with shape `[rows, columns]` for single sample images
/// or `[rows, columns, samples]` otherwise.
#[derive(Debug)]
pub struct Dataset<D = StandardDataDictionary>
where
    D: DataDictionary + Clone,
{
    object: InMemDicomObject<D>,
    pixels: Result<ArrayD<f64>, PixelDataError>,
}

impl Dataset {
    /// Read a DICOM file and decode its pixel data.
    ///
    /// Failing to decode the pixel data does not fail the whole operation:
    /// the dataset is still returned, without a pixel array.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let obj = dicom_object::open_file(path).context(ReadFileSnafu {
            path: path.display().to_string(),
        })?;
        let pixels = decode_pixel_array(&obj);
        if let Err(e) = &pixels {
            warn!("{}", snafu::Report::from_error(e));
        }
        Ok(Dataset {
            object: obj.into_inner(),
            pixels,
        })
    }
}

impl<D> Dataset<D>
where
    D: DataDictionary + Clone,
{
    /// Create a dataset from an object and an already decoded pixel array.
    pub fn new(object: InMemDicomObject<D>, pixels: ArrayD<f64>) -> Self {
        Dataset {
            object,
            pixels: Ok(pixels),
        }
    }

    /// Create a dataset without pixel data.
    pub fn without_pixels(object: InMemDicomObject<D>) -> Self {
        Dataset {
            object,
            pixels: MissingPixelDataSnafu.fail(),
        }
    }

    /// The DICOM object's attributes.
    pub fn object(&self) -> &InMemDicomObject<D> {
        &self.object
    }

    /// A view of the pixel array,
    /// or the reason why there is none.
    pub fn pixel_array(&self) -> Result<ArrayViewD<'_, f64>, &PixelDataError> {
        self.pixels.as_ref().map(|pixels| pixels.view())
    }
}

/// Decode the stored sample values of the first frame.
fn decode_pixel_array(obj: &DefaultDicomObject) -> Result<ArrayD<f64>, PixelDataError> {
    ensure!(obj.get(tags::PIXEL_DATA).is_some(), MissingPixelDataSnafu);

    let decoded = obj.decode_pixel_data().context(DecodePixelDataSnafu)?;
    // the rescale is applied later, only when no window is defined
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let frames = decoded
        .to_ndarray_with_options::<f64>(&options)
        .context(ConvertPixelDataSnafu)?;
    ensure!(frames.len_of(Axis(0)) > 0, NoFramesSnafu);
    if frames.len_of(Axis(0)) > 1 {
        debug!("Rendering only the first of {} frames", frames.len_of(Axis(0)));
    }

    // [frames, rows, columns, samples] -> [rows, columns, samples]
    let frame = frames.index_axis_move(Axis(0), 0);
    if frame.len_of(Axis(2)) == 1 {
        Ok(frame.index_axis_move(Axis(2), 0).into_dyn())
    } else {
        Ok(frame.into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn dataset_without_pixels() {
        let dataset = Dataset::without_pixels(InMemDicomObject::new_empty());
        assert!(matches!(
            dataset.pixel_array(),
            Err(PixelDataError::MissingPixelData)
        ));
    }

    #[test]
    fn dataset_with_pixels() {
        let dataset = Dataset::new(
            InMemDicomObject::new_empty(),
            array![[1., 2.], [3., 4.]].into_dyn(),
        );
        let pixels = dataset.pixel_array().unwrap();
        assert_eq!(pixels.shape(), &[2, 2]);
        assert_eq!(pixels[[1, 0]], 3.);
    }

    #[test]
    fn open_missing_file() {
        let result = Dataset::open_file("/nonexistent/file.dcm");
        assert!(matches!(result, Err(OpenError::ReadFile { .. })));
    }
}
