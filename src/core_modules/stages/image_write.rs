// Debug sink: writes the working image to a PNG file and publishes nothing, so
// it can be dropped anywhere in a pipeline without disturbing what later stages
// see as the working image.

use crate::core_modules::context::ExecutionContext;
use crate::core_modules::error::StageError;
use crate::core_modules::stage::{Stage, StageInfo, StageParameters, parse_parameters};
use crate::core_modules::stage_result::StageResult;
use crate::core_modules::utils::image_helper::image_helper;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageWriteParameters {
    file: Option<PathBuf>,
}

pub struct ImageWrite {
    info: StageInfo,
    file: Option<PathBuf>,
}

impl ImageWrite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: StageInfo::new(name),
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl Stage for ImageWrite {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StageInfo {
        &mut self.info
    }

    fn kind(&self) -> &'static str {
        "ImageWrite"
    }

    fn configure(&mut self, parameters: &StageParameters) -> Result<(), StageError> {
        let parameters: ImageWriteParameters = parse_parameters(parameters)?;
        self.file = parameters.file;
        Ok(())
    }

    fn process(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<StageResult>, StageError> {
        let file = self.file.as_ref().ok_or_else(|| {
            StageError::InvalidConfiguration(format!("image write stage `{}` has no file", ctx.stage_name()))
        })?;
        let Some(working) = ctx.working_image() else {
            return Ok(None);
        };
        if let Some(image) = working.image() {
            image_helper::save(file, image, working.color_space())?;
            debug!(stage = ctx.stage_name(), file = %file.display(), "wrote working image");
        }
        Ok(None)
    }
}
