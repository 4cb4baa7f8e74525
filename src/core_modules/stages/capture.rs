// THEORY:
// `Capture` is the entry point of almost every vision pipeline: it asks a camera
// for a frame and publishes it. Real acquisition (exposure, settling, driver
// calls) lives behind the `ImageSource` trait so the engine never depends on a
// particular camera; `StaticSource` serves a fixed frame and `FileSource` reads
// one from disk, which is how simulated cameras are configured.
//
// Acquisition may block for hardware-bound durations. The stage checks the
// run's cancellation flag before it starts waiting and passes it down so a
// source that supports interruption can abandon the wait; the engine then
// reports the interruption as an ordinary stage failure.

use crate::core_modules::context::ExecutionContext;
use crate::core_modules::error::StageError;
use crate::core_modules::stage::{Stage, StageInfo, StageParameters, parse_parameters};
use crate::core_modules::stage_result::{ColorSpace, StageResult};
use image::DynamicImage;
use serde::Deserialize;
use std::path::PathBuf;

/// Something that can produce a frame on demand, typically a camera.
pub trait ImageSource: Send {
    /// Acquires one frame. `cancelled` reports whether the run wants to stop;
    /// sources that block should poll it and return `StageError::Interrupted`.
    fn capture(&mut self, cancelled: &dyn Fn() -> bool) -> Result<DynamicImage, StageError>;
}

/// Serves the same frame on every capture.
#[derive(Debug, Clone)]
pub struct StaticSource {
    frame: DynamicImage,
}

impl StaticSource {
    pub fn new(frame: DynamicImage) -> Self {
        Self { frame }
    }
}

impl ImageSource for StaticSource {
    fn capture(&mut self, _cancelled: &dyn Fn() -> bool) -> Result<DynamicImage, StageError> {
        Ok(self.frame.clone())
    }
}

/// Reads a frame from an image file on every capture.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageSource for FileSource {
    fn capture(&mut self, _cancelled: &dyn Fn() -> bool) -> Result<DynamicImage, StageError> {
        Ok(image::open(&self.path)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureParameters {
    file: Option<PathBuf>,
    color_space: Option<ColorSpace>,
}

/// Acquires a frame from its source and publishes it.
pub struct Capture {
    info: StageInfo,
    source: Option<Box<dyn ImageSource>>,
    /// Overrides the color space inferred from the captured buffer.
    color_space: Option<ColorSpace>,
}

impl Capture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: StageInfo::new(name),
            source: None,
            color_space: None,
        }
    }

    pub fn with_source(mut self, source: impl ImageSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = Some(color_space);
        self
    }

    pub fn set_source(&mut self, source: Box<dyn ImageSource>) {
        self.source = Some(source);
    }
}

impl Stage for Capture {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StageInfo {
        &mut self.info
    }

    fn kind(&self) -> &'static str {
        "Capture"
    }

    fn configure(&mut self, parameters: &StageParameters) -> Result<(), StageError> {
        let parameters: CaptureParameters = parse_parameters(parameters)?;
        if let Some(file) = parameters.file {
            self.source = Some(Box::new(FileSource::new(file)));
        }
        self.color_space = parameters.color_space;
        Ok(())
    }

    fn process(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<StageResult>, StageError> {
        let source = self.source.as_mut().ok_or_else(|| {
            StageError::InvalidConfiguration(format!("capture stage `{}` has no image source", ctx.stage_name()))
        })?;

        if ctx.is_cancelled() {
            return Err(StageError::Interrupted("cancelled before acquisition".to_string()));
        }

        let frame = source.capture(&|| ctx.is_cancelled())?;
        let color_space = self.color_space.unwrap_or_else(|| ColorSpace::of(&frame));
        Ok(Some(StageResult::with_image(frame, color_space)))
    }
}
