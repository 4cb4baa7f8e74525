//! Execution context handed to each stage's `process` call.
//!
//! The context is a read-only window onto the run in progress: stages recall
//! earlier outputs through it, learn their own identity for diagnostics, and
//! poll the cancellation flag while blocked on hardware. Stages never receive
//! the pipeline itself, so they cannot write another stage's entry.

use crate::core_modules::error::PipelineError;
use crate::core_modules::result_store::ResultStore;
use crate::core_modules::stage_result::StageResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable handle used to request cooperative cancellation of a run.
///
/// The request is honored at the next stage boundary; stages may also poll it
/// through [`ExecutionContext::is_cancelled`] to abandon a blocking wait.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Withdraws a pending request. The pipeline does this when a run ends.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Everything a stage may see of the run that is executing it.
pub struct ExecutionContext<'a> {
    store: &'a ResultStore,
    stage_name: &'a str,
    stage_index: usize,
    cancel: &'a CancelHandle,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        store: &'a ResultStore,
        stage_name: &'a str,
        stage_index: usize,
        cancel: &'a CancelHandle,
    ) -> Self {
        Self {
            store,
            stage_name,
            stage_index,
            cancel,
        }
    }

    /// Recalls the result an earlier stage published in this run.
    ///
    /// Fails with `MissingResult` when `name` is unknown, disabled, has not run
    /// yet, or ran and produced nothing.
    pub fn get_expected_result(&self, name: &str) -> Result<&'a StageResult, PipelineError> {
        self.store.get(name).map(Arc::as_ref)
    }

    /// The most recent image-bearing result of this run, if any.
    pub fn working_image(&self) -> Option<&'a StageResult> {
        self.store.working_image().map(Arc::as_ref)
    }

    /// Name of the stage currently executing.
    pub fn stage_name(&self) -> &str {
        self.stage_name
    }

    /// Position of the executing stage in the configured order.
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
