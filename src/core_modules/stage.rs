// THEORY:
// A `Stage` is one configured unit of work inside a pipeline. The engine only
// ever talks to the capability defined here: identify yourself, say whether
// you are enabled, accept configuration, and process. What a stage actually
// computes (capturing a frame, thresholding, matching a template) is entirely
// its own business.
//
// Key architectural principles:
// 1.  **Capability, not hierarchy**: every concrete vision operation is a
//     separate type implementing `Stage`; the pipeline holds them as
//     `Box<dyn Stage>` and never downcasts.
// 2.  **Write only through the return value**: `process` returns the stage's
//     own outcome. The pipeline stores it under the stage's name; a stage has
//     no way to write any other entry.
// 3.  **Shared identity**: name and enabled flag live in a small `StageInfo`
//     that every variant embeds, so the trait's identity methods come for free.

use crate::core_modules::context::ExecutionContext;
use crate::core_modules::error::StageError;
use crate::core_modules::stage_result::StageResult;
use serde::de::DeserializeOwned;

/// Stage-specific parameters as they appear in a pipeline document.
pub type StageParameters = serde_yaml::Mapping;

/// The identity every stage carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    /// Unique, case-sensitive name within one pipeline; the result store key.
    pub name: String,
    /// Disabled stages are skipped entirely and publish nothing.
    pub enabled: bool,
}

impl StageInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }
}

/// The capability every stage variant implements.
pub trait Stage: Send {
    fn info(&self) -> &StageInfo;

    fn info_mut(&mut self) -> &mut StageInfo;

    /// Short type tag used in pipeline documents and logs.
    fn kind(&self) -> &'static str;

    /// Applies typed parameter values from a pipeline document.
    fn configure(&mut self, _parameters: &StageParameters) -> Result<(), StageError> {
        Ok(())
    }

    /// Runs the stage. `Ok(None)` means "ran, produced nothing" and is not a failure.
    fn process(&mut self, ctx: &ExecutionContext<'_>) -> Result<Option<StageResult>, StageError>;

    fn name(&self) -> &str {
        &self.info().name
    }

    fn is_enabled(&self) -> bool {
        self.info().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.info_mut().enabled = enabled;
    }
}

/// Deserializes a parameter mapping into a stage's typed parameter struct.
pub fn parse_parameters<T: DeserializeOwned>(parameters: &StageParameters) -> Result<T, StageError> {
    serde_yaml::from_value(serde_yaml::Value::Mapping(parameters.clone()))
        .map_err(|e| StageError::InvalidConfiguration(e.to_string()))
}
