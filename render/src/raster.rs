//! Packing of normalized arrays into display raster buffers.
//!
//! Raster buffers are laid out bottom-up:
//! the first row in the buffer is the last row of the image,
//! matching display surfaces with a bottom-left origin.

use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::{ArrayViewD, Axis};
use snafu::{ensure, Backtrace, OptionExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unsupported raster shape {:?}", shape))]
    UnsupportedShape {
        shape: Vec<usize>,
        backtrace: Backtrace,
    },

    #[snafu(display("Raster of {}x{} has no pixels", width, height))]
    EmptyRaster {
        width: usize,
        height: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Raster dimensions {}x{} are too large", width, height))]
    TooLarge {
        width: usize,
        height: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid buffer when constructing ImageBuffer"))]
    InvalidImageBuffer { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The channel layout of a raster buffer.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ChannelLayout {
    /// single channel, 1 byte per pixel
    Luminance,
    /// RGB color, 3 bytes per pixel
    Color,
}

impl ChannelLayout {
    /// The number of bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            ChannelLayout::Luminance => 1,
            ChannelLayout::Color => 3,
        }
    }

    /// The name of the layout.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelLayout::Luminance => "luminance",
            ChannelLayout::Color => "color",
        }
    }
}

impl std::fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flat byte buffer ready to be uploaded to a display surface.
///
/// The length of the data is always `width * height * channels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: ChannelLayout,
}

impl RasterBuffer {
    /// The raster width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The raster height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The channel layout.
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// The raw bytes, last image row first.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw bytes, last image row first.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Convert the raster into an image with the usual top-down row order.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        let stride = self.width as usize * self.layout.channels();
        let mut top_down = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(stride).rev() {
            top_down.extend_from_slice(row);
        }
        let image = match self.layout {
            ChannelLayout::Luminance => {
                GrayImage::from_raw(self.width, self.height, top_down).map(DynamicImage::ImageLuma8)
            }
            ChannelLayout::Color => {
                RgbImage::from_raw(self.width, self.height, top_down).map(DynamicImage::ImageRgb8)
            }
        };
        image.context(InvalidImageBufferSnafu)
    }
}

/// Pack a normalized array into a raster buffer.
///
/// Accepted shapes are `[height, width]` and `[height, width, 1]`
/// for luminance and `[height, width, 3]` for color.
/// Rows are flipped vertically in the process.
pub fn encode(array: ArrayViewD<'_, u8>) -> Result<RasterBuffer> {
    let (height, width, layout) = match *array.shape() {
        [height, width] | [height, width, 1] => (height, width, ChannelLayout::Luminance),
        [height, width, 3] => (height, width, ChannelLayout::Color),
        _ => {
            return UnsupportedShapeSnafu {
                shape: array.shape().to_vec(),
            }
            .fail()
        }
    };
    ensure!(width > 0 && height > 0, EmptyRasterSnafu { width, height });
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return TooLargeSnafu { width, height }.fail();
    };

    let mut data = Vec::with_capacity(width * height * layout.channels());
    for row in array.axis_iter(Axis(0)).rev() {
        data.extend(row.iter().copied());
    }
    debug_assert_eq!(data.len(), width * height * layout.channels());

    Ok(RasterBuffer {
        data,
        width: w,
        height: h,
        layout,
    })
}
