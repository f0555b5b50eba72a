//! A CLI front-end for viewing a DICOM file:
//! prints the metadata report and optionally saves the rendered image.
use std::path::PathBuf;

use clap::Parser;
use dicom_render::{
    is_dicom_file, DisplaySink, RenderOptions, Rendered, Viewer, WindowLevel,
    WindowLevelTransform, WindowOption,
};
use snafu::{Report, ResultExt, Whatever};
use tracing::{error, warn, Level};

/// Show the metadata of a DICOM file and render its image
#[derive(Debug, Parser)]
struct App {
    /// Path to the DICOM file to view
    file: PathBuf,

    /// Save the rendered image to this path (PNG)
    #[arg(short = 'o', long = "out")]
    output: Option<PathBuf>,

    /// Window center, overriding the file's VOI attributes
    #[arg(long = "window-center", requires = "window_width", conflicts_with = "no_window")]
    window_center: Option<f64>,

    /// Window width, overriding the file's VOI attributes
    #[arg(long = "window-width", requires = "window_center", conflicts_with = "no_window")]
    window_width: Option<f64>,

    /// Do not apply the file's VOI window level
    #[arg(long = "no-window")]
    no_window: bool,

    /// Print more information about the image and the output file
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Prints what a graphical shell would display.
struct ConsoleSink {
    output: Option<PathBuf>,
    verbose: bool,
    failed: bool,
}

impl DisplaySink for ConsoleSink {
    fn reset(&mut self) {
        self.failed = false;
    }

    fn present(&mut self, rendered: Rendered) {
        print!("{}", rendered.report);

        let Some(raster) = rendered.raster else {
            return;
        };
        if self.verbose {
            println!(
                "{}x{} {} raster",
                raster.width(),
                raster.height(),
                raster.layout()
            );
        }

        let Some(output) = &self.output else {
            return;
        };
        let saved: Result<(), Whatever> = raster
            .to_dynamic_image()
            .whatever_context("Could not convert raster")
            .and_then(|image| {
                image
                    .save(output)
                    .whatever_context("Could not save image file")
            });
        match saved {
            Ok(()) if self.verbose => println!("Image saved to {}", output.display()),
            Ok(()) => {}
            Err(e) => {
                error!("{}", Report::from_error(e));
                self.failed = true;
            }
        }
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("{}", message);
        self.failed = true;
    }
}

fn main() {
    let App {
        file,
        output,
        window_center,
        window_width,
        no_window,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    if !is_dicom_file(&file) {
        warn!("{} does not have a DICOM file extension", file.display());
    }

    let window = match (window_center, window_width) {
        (Some(center), Some(width)) => {
            WindowOption::Custom(WindowLevelTransform::linear(WindowLevel { center, width }))
        }
        _ if no_window => WindowOption::Ignore,
        _ => WindowOption::Default,
    };
    let options = RenderOptions::new().with_window(window);

    let sink = ConsoleSink {
        output,
        verbose,
        failed: false,
    };
    let mut viewer = Viewer::with_options(sink, options);
    viewer.request_load(file);
    viewer.tick();

    if viewer.sink().failed {
        std::process::exit(-1);
    }
}
