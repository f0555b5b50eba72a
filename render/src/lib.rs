//! This crate turns a DICOM file into what an image viewer displays:
//! a metadata [`Report`] and an 8-bit [`RasterBuffer`].
//!
//! Rendering happens in three steps:
//!
//! - the [`report`] module reads descriptive attributes,
//!   substituting `N/A` for those which are missing;
//! - the [`pipeline`] module applies the VOI window level
//!   or the modality rescale,
//!   then stretches the values to the full 8-bit range;
//! - the [`raster`] module packs the result into a flat buffer,
//!   last row first.
//!
//! The [`session`] module ties these together
//! for shells running a single-threaded event loop.
//!
//! # Examples
//!
//! ```no_run
//! use dicom_render::{load, LoadOutcome, RenderOptions};
//!
//! match load("scan.dcm", &RenderOptions::new()) {
//!     LoadOutcome::Loaded(rendered) => {
//!         println!("{}", rendered.report);
//!         if let Some(raster) = rendered.raster {
//!             println!("{}x{} {} raster", raster.width(), raster.height(), raster.layout());
//!         }
//!     }
//!     LoadOutcome::Failed { message } => eprintln!("{}", message),
//! }
//! ```
//!
//! Datasets decoded elsewhere can be rendered directly:
//!
//! ```
//! # use dicom_render::{render_dataset, Dataset, RenderOptions};
//! use dicom_object::InMemDicomObject;
//! use ndarray::array;
//!
//! let dataset = Dataset::new(
//!     InMemDicomObject::new_empty(),
//!     array![[0., 64.], [128., 256.]].into_dyn(),
//! );
//! let rendered = render_dataset(&dataset, "scan.dcm", &RenderOptions::new());
//! let raster = rendered.raster.unwrap();
//! assert_eq!(raster.data(), &[127, 255, 0, 63]);
//! ```

pub mod attribute;
pub mod dataset;
pub mod pipeline;
pub mod raster;
pub mod report;
pub mod session;
mod transform;

pub use dataset::{Dataset, OpenError, PixelDataError};
pub use pipeline::{PixelTransform, RenderOptions, WindowOption};
pub use raster::{ChannelLayout, RasterBuffer};
pub use report::{FieldValue, RealSize, Report, NOT_AVAILABLE};
pub use session::{
    is_dicom_file, load, render_dataset, DisplaySink, LoadOutcome, Rendered, Viewer,
};
pub use transform::{
    ParseVoiLutFunctionError, Rescale, VoiLutFunction, WindowLevel, WindowLevelTransform,
};
