//! Pixel sample value transformation functions:
//! the modality rescale and the VOI window level.

use std::str::FromStr;

use snafu::Snafu;

/// Description of a modality rescale function,
/// defined by a _rescale slope_ and _rescale intercept_.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    /// the rescale slope
    pub slope: f64,
    /// the rescale intercept
    pub intercept: f64,
}

impl Rescale {
    /// Create a new rescale function.
    #[inline]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Rescale { slope, intercept }
    }

    /// Apply the rescale function to a value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        value * self.slope + self.intercept
    }
}

/// A known DICOM Value of Interest (VOI) LUT function descriptor.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum VoiLutFunction {
    /// LINEAR
    #[default]
    Linear,
    /// LINEAR_EXACT
    LinearExact,
    /// SIGMOID
    Sigmoid,
}

/// Unrecognized VOI LUT function name `{name}`
#[derive(Debug, Clone, PartialEq, Snafu)]
pub struct ParseVoiLutFunctionError {
    name: String,
}

impl FromStr for VoiLutFunction {
    type Err = ParseVoiLutFunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches(|c| c == ' ' || c == '\0') {
            "LINEAR" => Ok(Self::Linear),
            "LINEAR_EXACT" => Ok(Self::LinearExact),
            "SIGMOID" => Ok(Self::Sigmoid),
            other => ParseVoiLutFunctionSnafu { name: other }.fail(),
        }
    }
}

/// The parameters of a single window level
/// for a VOI LUT transformation,
/// comprising the window center and the window width.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevel {
    /// The _Window Width_.
    ///
    /// Should be greater than 0
    pub width: f64,
    /// The _Window Center_.
    pub center: f64,
}

/// A full description of a VOI LUT function transformation
/// based on a window level.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WindowLevelTransform {
    voi_lut_function: VoiLutFunction,
    window_level: WindowLevel,
}

impl WindowLevelTransform {
    /// Create a new window level transformation.
    ///
    /// The width of the given `window_level` is clamped
    /// to what the LUT function accepts:
    /// `>= 0` for [`LinearExact`](VoiLutFunction::LinearExact)
    /// and `>= 1` for the others.
    pub fn new(voi_lut_function: VoiLutFunction, window_level: WindowLevel) -> Self {
        let min_width = match voi_lut_function {
            VoiLutFunction::LinearExact => 0.,
            VoiLutFunction::Linear | VoiLutFunction::Sigmoid => 1.,
        };
        WindowLevelTransform {
            voi_lut_function,
            window_level: WindowLevel {
                center: window_level.center,
                width: window_level.width.max(min_width),
            },
        }
    }

    /// Create a new window level transformation
    /// with the `LINEAR` function.
    #[inline]
    pub fn linear(window_level: WindowLevel) -> Self {
        Self::new(VoiLutFunction::Linear, window_level)
    }

    /// The VOI LUT function of this transformation.
    pub fn voi_lut_function(&self) -> VoiLutFunction {
        self.voi_lut_function
    }

    /// The window level of this transformation,
    /// after width clamping.
    pub fn window_level(&self) -> WindowLevel {
        self.window_level
    }

    /// Map a sample value into a number between `0` and `y_max`.
    pub fn apply(&self, value: f64, y_max: f64) -> f64 {
        let WindowLevel { width, center } = self.window_level;
        match self.voi_lut_function {
            VoiLutFunction::Linear => {
                // C.11.2.1.2.1
                let lower = center - 0.5 - (width - 1.) / 2.;
                let upper = center - 0.5 + (width - 1.) / 2.;
                if value <= lower {
                    0.
                } else if value > upper {
                    y_max
                } else {
                    ((value - (center - 0.5)) / (width - 1.) + 0.5) * y_max
                }
            }
            VoiLutFunction::LinearExact => {
                // C.11.2.1.3.2
                let lower = center - width / 2.;
                let upper = center + width / 2.;
                if value <= lower {
                    0.
                } else if value > upper {
                    y_max
                } else {
                    ((value - center) / width + 0.5) * y_max
                }
            }
            VoiLutFunction::Sigmoid => {
                // C.11.2.1.3.1
                y_max / (1. + f64::exp(-4. * (value - center) / width))
            }
        }
    }
}
