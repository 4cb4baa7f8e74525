// THEORY:
// Failures in the engine fall into two layers. A `StageError` is what a single
// stage reports from its `process` call: it knows nothing about which pipeline
// it runs in or what position it holds. A `PipelineError` is what the caller of
// `Pipeline::run` sees: stage failures are wrapped with the failing stage's
// name so every aborted run is attributable to exactly one stage.
//
// The explicit "no result" outcome is absent from both enums. A
// stage that has nothing to publish returns `Ok(None)`; that is a value, not
// a failure.

use thiserror::Error;

/// A failure raised by a stage's `configure` or `process` call.
#[derive(Error, Debug)]
pub enum StageError {
    /// A recall lookup named a stage that has no result in the current run.
    #[error("no result available for stage `{0}`")]
    MissingResult(String),

    /// The stage stopped waiting on hardware because cancellation was requested.
    #[error("stage interrupted: {0}")]
    Interrupted(String),

    /// The stage's parameters could not be applied or make no sense together.
    #[error("invalid stage configuration: {0}")]
    InvalidConfiguration(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A failure surfaced to callers of the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Recall of a name that is unknown, disabled, not yet run, or produced nothing.
    #[error("no result available for stage `{0}`")]
    MissingResult(String),

    /// A second stage tried to claim a name already used in this pipeline or run.
    #[error("stage name `{0}` is already in use")]
    DuplicateName(String),

    /// `run` was called while another run on the same pipeline was in progress.
    #[error("pipeline is already running")]
    ConcurrentExecution,

    /// A stage failed; the remainder of the run was abandoned.
    #[error("stage `{stage}` failed: {source}")]
    StageExecution {
        stage: String,
        #[source]
        source: StageError,
    },

    /// A cancellation request was honored before `stage` started.
    #[error("run cancelled before stage `{stage}`")]
    Cancelled { stage: String },

    /// A configuration call named a stage this pipeline does not contain.
    #[error("no stage named `{0}` in this pipeline")]
    UnknownStage(String),

    #[error("pipeline configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Name of the stage a failed run is attributed to, if any.
    pub fn failing_stage(&self) -> Option<&str> {
        match self {
            PipelineError::StageExecution { stage, .. } => Some(stage.as_str()),
            _ => None,
        }
    }

    /// The unresolved recall target, whether it was raised directly or by a stage.
    pub fn missing_result(&self) -> Option<&str> {
        match self {
            PipelineError::MissingResult(name) => Some(name.as_str()),
            PipelineError::StageExecution {
                source: StageError::MissingResult(name),
                ..
            } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl From<PipelineError> for StageError {
    /// Lets stages use `?` on recall lookups made through the execution context.
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingResult(name) => StageError::MissingResult(name),
            other => StageError::Other(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_reports_stage_and_missing_target() {
        let err = PipelineError::StageExecution {
            stage: "echo".to_string(),
            source: StageError::MissingResult("missing".to_string()),
        };
        assert_eq!(err.failing_stage(), Some("echo"));
        assert_eq!(err.missing_result(), Some("missing"));
        assert_eq!(
            err.to_string(),
            "stage `echo` failed: no result available for stage `missing`"
        );
    }

    #[test]
    fn missing_result_converts_into_stage_error() {
        let err: StageError = PipelineError::MissingResult("raw".to_string()).into();
        assert!(matches!(err, StageError::MissingResult(name) if name == "raw"));

        let err: StageError = PipelineError::ConcurrentExecution.into();
        assert!(matches!(err, StageError::Other(_)));
    }
}
