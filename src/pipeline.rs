// THEORY:
// The `pipeline` module is the top-level API of the vision engine. A `Pipeline`
// owns an ordered list of named stages and the `ResultStore` they publish into,
// and drives one run at a time through them.
//
// Key architectural principles:
// 1.  **Linear execution, non-linear data flow**: stages run strictly in their
//     configured order on the calling thread, because several of them drive
//     cameras and motion hardware whose ordering matters. Any stage may still
//     recall the output of any earlier stage by name, so the data dependencies
//     form whatever graph the configuration implies without ever being
//     declared.
// 2.  **Fresh memory every run**: the store is reset unconditionally when a run
//     starts, so neither a success nor a failure can leak results into the
//     next run.
// 3.  **Fail fast, attributably**: the first stage failure aborts the run and is
//     returned wrapped with the failing stage's name. Results published before
//     the failure stay inspectable until the next run starts. "No result" is
//     not a failure.
// 4.  **One run at a time**: an atomic running flag is claimed on entry and
//     released by a drop guard on every exit path, panics included. A second
//     `run` on the same instance, including one made from inside a stage, is
//     refused with `ConcurrentExecution` instead of corrupting the store.
// 5.  **Cooperative cancellation**: a `CancelHandle` can be triggered from any
//     thread (a watchdog, a UI). It is honored at the next stage boundary,
//     including one issued before the run got going; stages blocked on
//     hardware may poll it and interrupt themselves. The flag is cleared when
//     the run ends, so a request never outlives the run it targeted.

use crate::core_modules::result_store::ResultStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::context::{CancelHandle, ExecutionContext};
pub use crate::core_modules::error::{PipelineError, StageError};
pub use crate::core_modules::result_store::ResultSnapshot;
pub use crate::core_modules::stage::{Stage, StageInfo, StageParameters};
pub use crate::core_modules::stage_result::{ColorSpace, Model, StageResult};

/// Lifecycle of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run has been started yet.
    Idle,
    Running,
    /// The last run executed every enabled stage without failure.
    Completed,
    /// The last run was aborted by a stage failure or a cancellation.
    Failed,
}

/// What happened to one enabled stage during a run.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    /// Position in the configured order, disabled stages included.
    pub index: usize,
    /// Whether the stage published a result rather than "no result."
    pub produced: bool,
    pub duration: Duration,
}

/// The value returned by a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Every entry the run wrote, in execution order.
    pub results: ResultSnapshot,
    /// One report per executed stage.
    pub reports: Vec<StageReport>,
    pub duration: Duration,
}

impl RunOutcome {
    /// The last published result of the run, if any stage published one.
    pub fn last_result(&self) -> Option<&Arc<StageResult>> {
        self.results.last_result()
    }
}

/// A stage failure recorded by a validation pass.
#[derive(Debug)]
pub struct ValidationIssue {
    pub stage: String,
    pub error: StageError,
}

impl ValidationIssue {
    /// The unresolved recall target, if this issue is a missing reference.
    pub fn missing_result(&self) -> Option<&str> {
        match &self.error {
            StageError::MissingResult(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// The outcome of `Pipeline::validate`.
#[derive(Debug)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub results: ResultSnapshot,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// `(stage, missing name)` for every unresolved recall, in execution order.
    pub fn missing_references(&self) -> Vec<(&str, &str)> {
        self.issues
            .iter()
            .filter_map(|issue| issue.missing_result().map(|missing| (issue.stage.as_str(), missing)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionMode {
    /// Abort on the first stage failure.
    Run,
    /// Record every stage failure and keep going.
    Validate,
}

struct Execution {
    results: ResultSnapshot,
    reports: Vec<StageReport>,
    issues: Vec<ValidationIssue>,
    duration: Duration,
}

/// Holds the running flag for the duration of one run.
struct RunGuard<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> RunGuard<'a> {
    fn acquire(pipeline: &'a Pipeline) -> Result<Self, PipelineError> {
        pipeline
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::ConcurrentExecution)?;
        Ok(Self { pipeline })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        // A stage panicked if the run never reached a final state.
        let mut state = self.pipeline.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == RunState::Running {
            *state = RunState::Failed;
        }
        self.pipeline.cancel.clear();
        self.pipeline.running.store(false, Ordering::Release);
    }
}

/// An ordered, name-indexed sequence of stages plus the per-run result store.
pub struct Pipeline {
    name: String,
    stages: Mutex<Vec<Box<dyn Stage>>>,
    /// Stage names in configured order; names never change once added.
    stage_names: Vec<String>,
    store: Mutex<ResultStore>,
    state: Mutex<RunState>,
    running: AtomicBool,
    cancel: CancelHandle,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::named("pipeline")
    }

    /// Creates an empty pipeline whose name is used in log output.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Mutex::new(Vec::new()),
            stage_names: Vec::new(),
            store: Mutex::new(ResultStore::new()),
            state: Mutex::new(RunState::Idle),
            running: AtomicBool::new(false),
            cancel: CancelHandle::new(),
        }
    }

    /// Builds a pipeline from stages in execution order.
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new();
        for stage in stages {
            pipeline.add_boxed_stage(stage)?;
        }
        Ok(pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a stage. Fails if another stage already uses its name.
    pub fn add_stage(&mut self, stage: impl Stage + 'static) -> Result<(), PipelineError> {
        self.add_boxed_stage(Box::new(stage))
    }

    pub fn add_boxed_stage(&mut self, stage: Box<dyn Stage>) -> Result<(), PipelineError> {
        let name = stage.name().to_string();
        if self.stage_names.contains(&name) {
            return Err(PipelineError::DuplicateName(name));
        }
        self.stages.get_mut().unwrap_or_else(PoisonError::into_inner).push(stage);
        self.stage_names.push(name);
        Ok(())
    }

    /// Chaining form of `add_stage`.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Result<Self, PipelineError> {
        self.add_stage(stage)?;
        Ok(self)
    }

    /// Enables or disables the stage called `name`.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), PipelineError> {
        let stage = self
            .stages
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
            .find(|stage| stage.name() == name)
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))?;
        stage.set_enabled(enabled);
        Ok(())
    }

    /// Stage names in execution order, disabled stages included.
    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    pub fn len(&self) -> usize {
        self.stage_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stage_names.is_empty()
    }

    /// Whether the stage called `name` is enabled.
    pub fn is_stage_enabled(&self, name: &str) -> Result<bool, PipelineError> {
        self.ensure_idle()?;
        let stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        stages
            .iter()
            .find(|stage| stage.name() == name)
            .map(|stage| stage.is_enabled())
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// A handle that cancels the current or next run at its next stage boundary.
    ///
    /// A pending request is cleared when that run ends.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns the result `name` published in the most recent run.
    ///
    /// Fails with `MissingResult` if `name` is unknown, was disabled, did not
    /// run, or produced nothing, and with `ConcurrentExecution` while a run is
    /// in progress. Stages recall through their `ExecutionContext` instead.
    pub fn get_expected_result(&self, name: &str) -> Result<Arc<StageResult>, PipelineError> {
        self.ensure_idle()?;
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.get(name).cloned()
    }

    /// A snapshot of every entry the most recent run wrote, for display.
    pub fn last_results(&self) -> Result<ResultSnapshot, PipelineError> {
        self.ensure_idle()?;
        Ok(self.store.lock().unwrap_or_else(PoisonError::into_inner).snapshot())
    }

    /// Executes every enabled stage in order.
    pub fn run(&self) -> Result<RunOutcome, PipelineError> {
        let execution = self.execute(ExecutionMode::Run)?;
        Ok(RunOutcome {
            results: execution.results,
            reports: execution.reports,
            duration: execution.duration,
        })
    }

    /// Dry run: executes every enabled stage once but records each stage
    /// failure instead of aborting, so every unresolved recall in the
    /// configuration is reported at once.
    pub fn validate(&self) -> Result<ValidationReport, PipelineError> {
        let execution = self.execute(ExecutionMode::Validate)?;
        Ok(ValidationReport {
            issues: execution.issues,
            results: execution.results,
        })
    }

    fn ensure_idle(&self) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::ConcurrentExecution);
        }
        Ok(())
    }

    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn fail(&self, err: PipelineError) -> Result<Execution, PipelineError> {
        warn!(pipeline = %self.name, error = %err, "pipeline run failed");
        self.set_state(RunState::Failed);
        Err(err)
    }

    fn execute(&self, mode: ExecutionMode) -> Result<Execution, PipelineError> {
        let _guard = RunGuard::acquire(self)?;
        self.set_state(RunState::Running);

        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.reset();

        info!(pipeline = %self.name, stages = stages.len(), ?mode, "pipeline run started");
        let started = Instant::now();
        let mut reports = Vec::with_capacity(stages.len());
        let mut issues = Vec::new();

        for (index, stage) in stages.iter_mut().enumerate() {
            if !stage.is_enabled() {
                debug!(stage = stage.name(), "skipping disabled stage");
                continue;
            }
            let name = stage.name().to_string();

            if self.cancel.is_cancelled() {
                return self.fail(PipelineError::Cancelled { stage: name });
            }

            debug!(stage = %name, kind = stage.kind(), index, "processing stage");
            let stage_started = Instant::now();
            let outcome = {
                let ctx = ExecutionContext::new(&store, &name, index, &self.cancel);
                stage.process(&ctx)
            };

            let result = match outcome {
                Ok(result) => result,
                Err(source) if mode == ExecutionMode::Validate => {
                    warn!(stage = %name, error = %source, "stage failed during validation");
                    issues.push(ValidationIssue {
                        stage: name.clone(),
                        error: source,
                    });
                    None
                }
                Err(source) => {
                    return self.fail(PipelineError::StageExecution { stage: name, source });
                }
            };

            let produced = result.is_some();
            if let Err(err) = store.put(&name, result) {
                return self.fail(err);
            }

            let duration = stage_started.elapsed();
            debug!(stage = %name, produced, elapsed_ms = duration.as_millis() as u64, "stage finished");
            reports.push(StageReport {
                name,
                index,
                produced,
                duration,
            });
        }

        let duration = started.elapsed();
        if issues.is_empty() {
            self.set_state(RunState::Completed);
        } else {
            self.set_state(RunState::Failed);
        }
        info!(
            pipeline = %self.name,
            executed = reports.len(),
            issues = issues.len(),
            elapsed_ms = duration.as_millis() as u64,
            "pipeline run finished"
        );

        Ok(Execution {
            results: store.snapshot(),
            reports,
            issues,
            duration,
        })
    }
}
