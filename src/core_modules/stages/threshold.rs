use crate::core_modules::context::ExecutionContext;
use crate::core_modules::error::StageError;
use crate::core_modules::stage::{Stage, StageInfo, StageParameters, parse_parameters};
use crate::core_modules::stage_result::{ColorSpace, StageResult};
use image::DynamicImage;
use serde::Deserialize;

const DEFAULT_THRESHOLD: u8 = 128;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdParameters {
    #[serde(default = "default_threshold")]
    threshold: u8,
    #[serde(default)]
    invert: bool,
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

/// Binarises the luma of the working image into a 0/255 gray mask.
pub struct Threshold {
    info: StageInfo,
    /// Luma values strictly above this become white.
    threshold: u8,
    /// Swaps black and white in the output mask.
    invert: bool,
}

impl Threshold {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: StageInfo::new(name),
            threshold: DEFAULT_THRESHOLD,
            invert: false,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

impl Stage for Threshold {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StageInfo {
        &mut self.info
    }

    fn kind(&self) -> &'static str {
        "Threshold"
    }

    fn configure(&mut self, parameters: &StageParameters) -> Result<(), StageError> {
        let parameters: ThresholdParameters = parse_parameters(parameters)?;
        self.threshold = parameters.threshold;
        self.invert = parameters.invert;
        Ok(())
    }

    fn process(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<StageResult>, StageError> {
        let Some(image) = ctx.working_image().and_then(StageResult::image) else {
            return Ok(None);
        };

        // Work on our own buffer; the cached input stays untouched.
        let mut mask = image.to_luma8();
        for pixel in mask.pixels_mut() {
            let above = pixel.0[0] > self.threshold;
            pixel.0[0] = if above != self.invert { 255 } else { 0 };
        }
        Ok(Some(StageResult::with_image(DynamicImage::ImageLuma8(mask), ColorSpace::Gray)))
    }
}
