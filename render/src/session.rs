//! Loading files on behalf of a display shell.
//!
//! Loads are cooperative:
//! [`Viewer::request_load`] only schedules a task,
//! which runs to completion on the next [`Viewer::tick`]
//! before its results are handed to the [`DisplaySink`].
//! Only the latest request is ever presented.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use dicom_core::DataDictionary;
use snafu::{ResultExt, Snafu};
use tracing::{debug, error, info, warn};

use crate::dataset::Dataset;
use crate::pipeline::{self, PixelTransform, RenderOptions};
use crate::raster::{self, RasterBuffer};
use crate::report::{self, Report};

/// The file extensions accepted as DICOM files.
const DICOM_EXTENSIONS: [&str; 2] = ["dcm", "dicom"];

/// Whether the path looks like a DICOM file,
/// judging by its extension (case insensitive).
pub fn is_dicom_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| DICOM_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// The image could not be rendered.
#[derive(Debug, Snafu)]
pub enum ImageError {
    #[snafu(display("Could not process the pixel data"))]
    Process {
        #[snafu(backtrace)]
        source: pipeline::Error,
    },

    #[snafu(display("Could not create the raster"))]
    Encode {
        #[snafu(backtrace)]
        source: raster::Error,
    },
}

/// Everything the shell needs to display a loaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    /// the metadata report, including any diagnostic notes
    pub report: Report,
    /// the display raster, if one could be produced
    pub raster: Option<RasterBuffer>,
}

/// The result of a load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// the file was decoded, the raster may still be missing
    Loaded(Rendered),
    /// the file could not be decoded
    Failed {
        /// a short message for the user
        message: String,
    },
}

/// Read, describe and render a DICOM file.
///
/// Only a failure to read the file is fatal.
/// Problems with the pixel data omit the raster
/// and leave a note in the report.
pub fn load(path: impl AsRef<Path>, options: &RenderOptions) -> LoadOutcome {
    let path = path.as_ref();
    match Dataset::open_file(path) {
        Ok(dataset) => LoadOutcome::Loaded(render_dataset(&dataset, path, options)),
        Err(e) => {
            error!("{}", snafu::Report::from_error(&e));
            LoadOutcome::Failed {
                message: format!("Error loading DICOM file:\n{}", e),
            }
        }
    }
}

/// Build the report and the raster of an already decoded dataset.
pub fn render_dataset<D>(
    dataset: &Dataset<D>,
    path: impl AsRef<Path>,
    options: &RenderOptions,
) -> Rendered
where
    D: DataDictionary + Clone,
{
    let mut report = report::extract(dataset.object(), path);

    let raster = match dataset.pixel_array() {
        Ok(pixels) => match render_image(dataset, pixels, options) {
            Ok(raster) => Some(raster),
            Err(e) => {
                warn!("{}", snafu::Report::from_error(&e));
                report.push_note(format!("Image not displayed: {}", e));
                None
            }
        },
        Err(e) => {
            debug!("No pixel array: {}", e);
            report.push_note(format!("Image not displayed: {}", e));
            None
        }
    };

    Rendered { report, raster }
}

fn render_image<D>(
    dataset: &Dataset<D>,
    pixels: ndarray::ArrayViewD<'_, f64>,
    options: &RenderOptions,
) -> Result<RasterBuffer, ImageError>
where
    D: DataDictionary + Clone,
{
    let transform = PixelTransform::from_object(dataset.object(), options).context(ProcessSnafu)?;
    let normalized = pipeline::render(pixels, &transform).context(ProcessSnafu)?;
    raster::encode(normalized.view()).context(EncodeSnafu)
}

/// The display side of a [`Viewer`].
pub trait DisplaySink {
    /// Clear everything shown from a previous load.
    fn reset(&mut self);

    /// Show the outcome of a successful load.
    fn present(&mut self, rendered: Rendered);

    /// Show a load error message.
    fn show_error(&mut self, message: &str);
}

#[derive(Debug)]
struct LoadTask {
    generation: u64,
    path: PathBuf,
}

/// A single-threaded viewer which loads one file at a time.
#[derive(Debug)]
pub struct Viewer<S> {
    sink: S,
    options: RenderOptions,
    pending: VecDeque<LoadTask>,
    generation: u64,
}

impl<S: DisplaySink> Viewer<S> {
    /// Create a viewer with default render options.
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, RenderOptions::default())
    }

    /// Create a viewer with the given render options.
    pub fn with_options(sink: S, options: RenderOptions) -> Self {
        Viewer {
            sink,
            options,
            pending: VecDeque::new(),
            generation: 0,
        }
    }

    /// Schedule a file to be loaded on the next tick,
    /// superseding any earlier request.
    ///
    /// Returns the generation number of the request.
    pub fn request_load(&mut self, path: impl Into<PathBuf>) -> u64 {
        self.generation += 1;
        let path = path.into();
        debug!("Scheduling load #{} of {}", self.generation, path.display());
        self.pending.push_back(LoadTask {
            generation: self.generation,
            path,
        });
        self.generation
    }

    /// Whether a load is waiting for the next tick.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Run the scheduled loads to completion
    /// and hand the latest one over to the display sink.
    ///
    /// Returns the number of loads which were presented.
    pub fn tick(&mut self) -> usize {
        let mut presented = 0;
        while let Some(task) = self.pending.pop_front() {
            if task.generation != self.generation {
                debug!("Dropping superseded load #{}", task.generation);
                continue;
            }
            let outcome = load(&task.path, &self.options);
            self.sink.reset();
            match outcome {
                LoadOutcome::Loaded(rendered) => {
                    info!("Loaded {}", task.path.display());
                    self.sink.present(rendered);
                }
                LoadOutcome::Failed { message } => self.sink.show_error(&message),
            }
            presented += 1;
        }
        presented
    }

    /// The display sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The display sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Take the display sink back.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
