// Converts the working image between the color spaces the reference stages
// understand. BGR is stored as an 8-bit three channel buffer with the red and
// blue channels swapped, matching what camera drivers typically hand over.

use crate::core_modules::context::ExecutionContext;
use crate::core_modules::error::StageError;
use crate::core_modules::stage::{Stage, StageInfo, StageParameters, parse_parameters};
use crate::core_modules::stage_result::{ColorSpace, StageResult};
use crate::core_modules::utils::image_helper::image_helper::swap_red_blue;
use image::{DynamicImage, RgbImage};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertColorParameters {
    conversion: ColorSpace,
}

pub struct ConvertColor {
    info: StageInfo,
    /// Target color space.
    conversion: ColorSpace,
}

impl ConvertColor {
    pub fn new(name: impl Into<String>, conversion: ColorSpace) -> Self {
        Self {
            info: StageInfo::new(name),
            conversion,
        }
    }
}

/// Brings an image tagged `color_space` into plain RGB channel order.
fn to_rgb(image: &DynamicImage, color_space: ColorSpace) -> Result<RgbImage, StageError> {
    match color_space {
        ColorSpace::Gray | ColorSpace::Rgb | ColorSpace::Rgba => Ok(image.to_rgb8()),
        ColorSpace::Bgr | ColorSpace::Bgra => Ok(swap_red_blue(image.to_rgb8())),
        ColorSpace::Hsv => Err(StageError::InvalidConfiguration(
            "conversion from Hsv is not supported".to_string(),
        )),
    }
}

impl Stage for ConvertColor {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StageInfo {
        &mut self.info
    }

    fn kind(&self) -> &'static str {
        "ConvertColor"
    }

    fn configure(&mut self, parameters: &StageParameters) -> Result<(), StageError> {
        let parameters: ConvertColorParameters = parse_parameters(parameters)?;
        self.conversion = parameters.conversion;
        Ok(())
    }

    fn process(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<StageResult>, StageError> {
        let Some(working) = ctx.working_image() else {
            return Ok(None);
        };
        let Some(image) = working.image() else {
            return Ok(None);
        };

        let rgb = to_rgb(image, working.color_space())?;
        let converted = match self.conversion {
            ColorSpace::Gray => DynamicImage::ImageLuma8(DynamicImage::ImageRgb8(rgb).to_luma8()),
            ColorSpace::Rgb => DynamicImage::ImageRgb8(rgb),
            ColorSpace::Bgr => DynamicImage::ImageRgb8(swap_red_blue(rgb)),
            other => {
                return Err(StageError::InvalidConfiguration(format!(
                    "conversion to {other:?} is not supported"
                )));
            }
        };
        Ok(Some(StageResult::with_image(converted, self.conversion)))
    }
}
