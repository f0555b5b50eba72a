//! The pixel pipeline,
//! turning raw sample values into a normalized 8-bit array.
//!
//! The pipeline first maps every sample through a [`PixelTransform`],
//! chosen once per image from the object's attributes:
//!
//! 1. the VOI window level, if _Window Center_ and _Window Width_ exist;
//! 2. otherwise the modality rescale,
//!    if _Rescale Slope_ and _Rescale Intercept_ exist;
//! 3. otherwise nothing.
//!
//! The result is then stretched so that it spans the full `[0, 255]` range.

use dicom_core::DataDictionary;
use dicom_object::InMemDicomObject;
use ndarray::{ArrayD, ArrayViewD};
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use tracing::debug;

use crate::attribute::{self, GetAttributeError};
use crate::transform::{Rescale, WindowLevel, WindowLevelTransform};

/// The maximum output value of the VOI transformation.
const DISPLAY_MAX: f64 = 255.;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Could not read pixel transform attributes"))]
    ReadAttribute {
        #[snafu(backtrace)]
        source: GetAttributeError,
    },

    #[snafu(display("Unsupported pixel array shape {:?}", shape))]
    UnsupportedShape {
        shape: Vec<usize>,
        backtrace: Backtrace,
    },

    #[snafu(display("Pixel array is empty"))]
    EmptyArray { backtrace: Backtrace },

    #[snafu(display("Pixel array has non-finite sample values"))]
    NonFiniteSamples { backtrace: Backtrace },

    #[snafu(display("Pixel value range from {} to {} is too wide to normalize", min, max))]
    RangeOverflow {
        min: f64,
        max: f64,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Override for the VOI step of the pipeline.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub enum WindowOption {
    /// Use the window described in the object, if any.
    #[default]
    Default,
    /// Use this window regardless of the object's attributes.
    Custom(WindowLevelTransform),
    /// Never apply a VOI transformation.
    Ignore,
}

/// Options for rendering pixel data.
///
/// # Example
///
/// ```
/// # use dicom_render::{RenderOptions, WindowLevel, WindowLevelTransform, WindowOption};
/// let options = RenderOptions::new()
///     .with_window(WindowOption::Custom(WindowLevelTransform::linear(WindowLevel {
///         center: 40.,
///         width: 400.,
///     })));
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct RenderOptions {
    window: WindowOption,
}

impl RenderOptions {
    /// Options following the attributes of each object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how the VOI step is chosen.
    pub fn with_window(mut self, window: WindowOption) -> Self {
        self.window = window;
        self
    }

    /// The VOI step option.
    pub fn window(&self) -> WindowOption {
        self.window
    }
}

/// The sample value transformation applied before normalization.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PixelTransform {
    /// VOI LUT window level, mapping into `[0, 255]`
    Window(WindowLevelTransform),
    /// modality LUT rescale
    Rescale(Rescale),
    /// values pass through unchanged
    Identity,
}

impl PixelTransform {
    /// Choose the transformation to apply on the pixel data of `obj`.
    ///
    /// Missing attributes only make the selection fall through
    /// to the next candidate,
    /// whereas present but invalid values are reported as errors.
    pub fn from_object<D>(obj: &InMemDicomObject<D>, options: &RenderOptions) -> Result<Self>
    where
        D: DataDictionary + Clone,
    {
        let transform = match options.window() {
            WindowOption::Custom(voi) => PixelTransform::Window(voi),
            WindowOption::Ignore => Self::rescale_from_object(obj)?,
            WindowOption::Default => {
                let center = attribute::window_center(obj).context(ReadAttributeSnafu)?;
                let width = attribute::window_width(obj).context(ReadAttributeSnafu)?;
                match (center, width) {
                    (Some(center), Some(width)) => {
                        let function =
                            attribute::voi_lut_function(obj).context(ReadAttributeSnafu)?;
                        PixelTransform::Window(WindowLevelTransform::new(
                            function,
                            WindowLevel { center, width },
                        ))
                    }
                    _ => Self::rescale_from_object(obj)?,
                }
            }
        };
        debug!("Selected pixel transform: {:?}", transform);
        Ok(transform)
    }

    fn rescale_from_object<D>(obj: &InMemDicomObject<D>) -> Result<Self>
    where
        D: DataDictionary + Clone,
    {
        let slope = attribute::rescale_slope(obj).context(ReadAttributeSnafu)?;
        let intercept = attribute::rescale_intercept(obj).context(ReadAttributeSnafu)?;
        Ok(match (slope, intercept) {
            (Some(slope), Some(intercept)) => PixelTransform::Rescale(Rescale::new(slope, intercept)),
            _ => PixelTransform::Identity,
        })
    }

    /// Apply the transformation to a single sample value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            PixelTransform::Window(voi) => voi.apply(value, DISPLAY_MAX),
            PixelTransform::Rescale(rescale) => rescale.apply(value),
            PixelTransform::Identity => value,
        }
    }
}

/// Run the full pipeline on a pixel array of shape
/// `[rows, columns]` or `[rows, columns, samples]`.
///
/// The input is left untouched and a new array of the same shape is returned.
pub fn render(pixels: ArrayViewD<'_, f64>, transform: &PixelTransform) -> Result<ArrayD<u8>> {
    ensure!(
        matches!(pixels.ndim(), 2 | 3),
        UnsupportedShapeSnafu {
            shape: pixels.shape().to_vec(),
        }
    );
    let transformed = pixels.mapv(|v| transform.apply(v));
    normalize(transformed.view())
}

/// Stretch the values of an array to span `[0, 255]`.
///
/// The minimum is subtracted from every value,
/// which is then divided by the resulting maximum,
/// scaled by 255 and truncated.
/// An array of constant value yields all zeros.
/// Values spanning more than `f64::MAX` are an error.
pub fn normalize(values: ArrayViewD<'_, f64>) -> Result<ArrayD<u8>> {
    ensure!(!values.is_empty(), EmptyArraySnafu);
    ensure!(values.iter().all(|v| v.is_finite()), NonFiniteSamplesSnafu);

    let min = values.fold(f64::INFINITY, |acc, &v| acc.min(v));
    let max = values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let range = max - min;
    ensure!(range.is_finite(), RangeOverflowSnafu { min, max });

    if range == 0. {
        debug!("Constant pixel value {}, normalizing to zero", min);
        return Ok(ArrayD::zeros(values.raw_dim()));
    }

    Ok(values.mapv(|v| ((v - min) / range * 255.) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::VoiLutFunction;
    use dicom_core::{dicom_value, VR};
    use dicom_dictionary_std::tags;
    use dicom_object::mem::InMemElement;
    use ndarray::{array, Array3, ArrayD, IxDyn};

    fn object(elements: Vec<InMemElement>) -> InMemDicomObject {
        InMemDicomObject::from_element_iter(elements)
    }

    fn window_elements(center: &str, width: &str) -> Vec<InMemElement> {
        vec![
            InMemElement::new(tags::WINDOW_CENTER, VR::DS, dicom_value!(Strs, [center])),
            InMemElement::new(tags::WINDOW_WIDTH, VR::DS, dicom_value!(Strs, [width])),
        ]
    }

    fn rescale_elements(slope: &str, intercept: &str) -> Vec<InMemElement> {
        vec![
            InMemElement::new(tags::RESCALE_SLOPE, VR::DS, dicom_value!(Strs, [slope])),
            InMemElement::new(
                tags::RESCALE_INTERCEPT,
                VR::DS,
                dicom_value!(Strs, [intercept]),
            ),
        ]
    }

    #[test]
    fn window_takes_precedence_over_rescale() {
        let mut elements = window_elements("100", "50");
        elements.extend(rescale_elements("2", "10"));
        let obj = object(elements);

        let transform = PixelTransform::from_object(&obj, &RenderOptions::new()).unwrap();
        assert_eq!(
            transform,
            PixelTransform::Window(WindowLevelTransform::new(
                VoiLutFunction::Linear,
                WindowLevel {
                    center: 100.,
                    width: 50.
                }
            ))
        );
        assert_eq!(transform.apply(75.), 0.);
        assert_eq!(transform.apply(125.), 255.);
        assert_eq!(transform.apply(10.), 0.);
        assert_eq!(transform.apply(500.), 255.);
    }

    #[test]
    fn rescale_without_window() {
        let obj = object(rescale_elements("2.0", "10"));
        let transform = PixelTransform::from_object(&obj, &RenderOptions::new()).unwrap();
        assert_eq!(transform, PixelTransform::Rescale(Rescale::new(2., 10.)));
        assert_eq!(transform.apply(5.), 20.);
    }

    #[test]
    fn incomplete_pairs_fall_through() {
        let obj = object(vec![
            InMemElement::new(tags::WINDOW_CENTER, VR::DS, dicom_value!(Strs, ["40"])),
            InMemElement::new(tags::RESCALE_SLOPE, VR::DS, dicom_value!(Strs, ["1"])),
        ]);
        let transform = PixelTransform::from_object(&obj, &RenderOptions::new()).unwrap();
        assert_eq!(transform, PixelTransform::Identity);
    }

    #[test]
    fn non_numeric_window_is_an_error() {
        let obj = object(window_elements("center", "50"));
        let result = PixelTransform::from_object(&obj, &RenderOptions::new());
        assert!(matches!(result, Err(Error::ReadAttribute { .. })));
    }

    #[test]
    fn window_options_override_attributes() {
        let mut elements = window_elements("100", "50");
        elements.extend(rescale_elements("2", "10"));
        let obj = object(elements);

        let ignore = RenderOptions::new().with_window(WindowOption::Ignore);
        assert_eq!(
            PixelTransform::from_object(&obj, &ignore).unwrap(),
            PixelTransform::Rescale(Rescale::new(2., 10.))
        );

        let voi = WindowLevelTransform::linear(WindowLevel {
            center: 0.,
            width: 10.,
        });
        let custom = RenderOptions::new().with_window(WindowOption::Custom(voi));
        assert_eq!(
            PixelTransform::from_object(&obj, &custom).unwrap(),
            PixelTransform::Window(voi)
        );
    }

    #[test]
    fn normalized_range_is_full() {
        let pixels = array![[-1024., 0.], [40., 3071.]].into_dyn();
        let out = render(pixels.view(), &PixelTransform::Identity).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.iter().copied().min(), Some(0));
        assert_eq!(out.iter().copied().max(), Some(255));
        assert_eq!(out[[0, 1]], 63);
    }

    #[test]
    fn constant_image_is_all_zeros() {
        let pixels = ArrayD::from_elem(IxDyn(&[4, 3]), 1234.);
        let out = render(pixels.view(), &PixelTransform::Identity).unwrap();
        assert_eq!(out.shape(), &[4, 3]);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn rescale_happens_before_normalization() {
        let pixels = array![[5., 5.], [0., 10.]].into_dyn();
        let transform = PixelTransform::Rescale(Rescale::new(2., 10.));
        let out = render(pixels.view(), &transform).unwrap();
        // 20 is halfway between 10 and 30
        assert_eq!(out, array![[127_u8, 127], [0, 255]].into_dyn());
    }

    #[test]
    fn input_is_not_mutated() {
        let pixels = array![[1., 2.], [3., 4.]].into_dyn();
        let copy = pixels.clone();
        let transform = PixelTransform::Rescale(Rescale::new(-1., 0.));
        let _ = render(pixels.view(), &transform).unwrap();
        assert_eq!(pixels, copy);
    }

    #[test]
    fn channels_are_preserved() {
        let pixels = Array3::from_shape_fn((2, 3, 3), |(y, x, c)| (y * 9 + x * 3 + c) as f64).into_dyn();
        let out = render(pixels.view(), &PixelTransform::Identity).unwrap();
        assert_eq!(out.shape(), &[2, 3, 3]);
        assert_eq!(out[[0, 0, 0]], 0);
        assert_eq!(out[[1, 2, 2]], 255);
    }

    #[test]
    fn bad_inputs_are_errors() {
        let flat = ArrayD::<f64>::zeros(IxDyn(&[16]));
        assert!(matches!(
            render(flat.view(), &PixelTransform::Identity),
            Err(Error::UnsupportedShape { .. })
        ));

        let empty = ArrayD::<f64>::zeros(IxDyn(&[0, 4]));
        assert!(matches!(
            render(empty.view(), &PixelTransform::Identity),
            Err(Error::EmptyArray { .. })
        ));

        let nan = array![[0., f64::NAN]].into_dyn();
        assert!(matches!(
            render(nan.view(), &PixelTransform::Identity),
            Err(Error::NonFiniteSamples { .. })
        ));
    }

    #[test]
    fn overflowing_range_is_an_error() {
        let pixels = array![[-1., 0.], [0.5, 1.]].into_dyn();
        let transform = PixelTransform::Rescale(Rescale::new(1e308, 0.));
        assert!(matches!(
            render(pixels.view(), &transform),
            Err(Error::RangeOverflow { .. })
        ));

        let extremes = array![[f64::MIN, f64::MAX]].into_dyn();
        assert!(matches!(
            normalize(extremes.view()),
            Err(Error::RangeOverflow { .. })
        ));
    }
}
