// THEORY:
// `Recall` republishes an earlier stage's image so that later stages can branch
// off an intermediate result without re-running whatever produced it. A
// pipeline like `capture -> threshold -> recall(capture) -> detect edges`
// gives the edge detector the raw frame again, not the thresholded mask.
//
// Three outcomes:
// - no target configured (unset, or blank after trimming): publish nothing. The
//   stage is idle, which is not an error.
// - a target that has no result in this run: fail. Recalling something that
//   is not there is a misconfiguration.
// - a target that exists but carries no image: publish nothing.
//
// The republished image is always a deep copy. Downstream stages may mutate
// their working image in place; an alias would let them corrupt the cached
// original.

use crate::core_modules::context::ExecutionContext;
use crate::core_modules::error::StageError;
use crate::core_modules::stage::{Stage, StageInfo, StageParameters, parse_parameters};
use crate::core_modules::stage_result::StageResult;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecallParameters {
    image_stage_name: Option<String>,
}

/// Republishes a copy of a named earlier stage's image.
#[derive(Debug, Clone)]
pub struct Recall {
    info: StageInfo,
    /// The stage whose image should be recalled.
    image_stage_name: Option<String>,
}

impl Recall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: StageInfo::new(name),
            image_stage_name: None,
        }
    }

    pub fn with_image_stage_name(mut self, image_stage_name: impl Into<String>) -> Self {
        self.image_stage_name = Some(image_stage_name.into());
        self
    }

    pub fn image_stage_name(&self) -> Option<&str> {
        self.image_stage_name.as_deref()
    }

    pub fn set_image_stage_name(&mut self, image_stage_name: Option<String>) {
        self.image_stage_name = image_stage_name;
    }
}

impl Stage for Recall {
    fn info(&self) -> &StageInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut StageInfo {
        &mut self.info
    }

    fn kind(&self) -> &'static str {
        "ImageRecall"
    }

    fn configure(&mut self, parameters: &StageParameters) -> Result<(), StageError> {
        let parameters: RecallParameters = parse_parameters(parameters)?;
        self.image_stage_name = parameters.image_stage_name;
        Ok(())
    }

    fn process(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<StageResult>, StageError> {
        let source_name = match self.image_stage_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!(stage = ctx.stage_name(), "no recall target configured");
                return Ok(None);
            }
        };

        let recalled = ctx.get_expected_result(source_name)?;
        let Some(image) = recalled.image() else {
            debug!(stage = ctx.stage_name(), source_name, "recalled result carries no image");
            return Ok(None);
        };

        Ok(Some(StageResult::with_image(image.clone(), recalled.color_space())))
    }
}
