// THEORY:
// The `ResultStore` is the memory of a single pipeline run. Every enabled
// stage writes exactly one entry under its own name: either a published
// `StageResult` or an explicit "ran, produced nothing." Later stages recall
// entries by name, which is what lets a linear sequence of stages form
// diamond-shaped data dependencies without declaring them up front.
//
// Key architectural principles:
// 1.  **Run scoped**: the owning pipeline resets the store exactly once at the
//     start of every run, whatever the previous run's outcome was. Nothing
//     ever survives from one run into the next.
// 2.  **Write once**: a name written during a run can never be overwritten in
//     that run. Stage names are unique, so a second write is an invariant
//     violation and is rejected rather than allowed to shadow the first.
// 3.  **One failure for every kind of absence**: to a reader, "ran and produced
//     nothing", "disabled" and "never configured" all mean "nothing to recall",
//     so `get` reports all three as the same `MissingResult`.

use crate::core_modules::error::PipelineError;
use crate::core_modules::stage_result::StageResult;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-run mapping from stage name to its outcome.
#[derive(Debug, Default)]
pub struct ResultStore {
    /// Outcome per stage name. `None` records an explicit "no result."
    entries: HashMap<String, Option<Arc<StageResult>>>,
    /// Stage names in the order they were written this run.
    order: Vec<String>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for `name`. Fails if `name` was already written this run.
    pub fn put(&mut self, name: &str, result: Option<StageResult>) -> Result<(), PipelineError> {
        if self.entries.contains_key(name) {
            return Err(PipelineError::DuplicateName(name.to_string()));
        }
        self.entries.insert(name.to_string(), result.map(Arc::new));
        self.order.push(name.to_string());
        Ok(())
    }

    /// Looks up the result published under `name` in this run.
    pub fn get(&self, name: &str) -> Result<&Arc<StageResult>, PipelineError> {
        match self.entries.get(name) {
            Some(Some(result)) => Ok(result),
            _ => Err(PipelineError::MissingResult(name.to_string())),
        }
    }

    /// Whether `name` wrote an entry this run, including an explicit "no result."
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names written this run, in write order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// The most recently written result that carries an image.
    pub fn working_image(&self) -> Option<&Arc<StageResult>> {
        self.order
            .iter()
            .rev()
            .filter_map(|name| self.entries.get(name).and_then(Option::as_ref))
            .find(|result| result.has_image())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Clears every entry ahead of a new run.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// An immutable copy of the current entries. Results are shared, not copied.
    pub fn snapshot(&self) -> ResultSnapshot {
        let entries = self
            .order
            .iter()
            .map(|name| {
                let result = self.entries.get(name).cloned().flatten();
                (name.clone(), result)
            })
            .collect();
        ResultSnapshot { entries }
    }
}

/// A read-only view of a run's results, detached from the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ResultSnapshot {
    entries: Vec<(String, Option<Arc<StageResult>>)>,
}

impl ResultSnapshot {
    /// Same lookup semantics as `ResultStore::get`.
    pub fn get(&self, name: &str) -> Result<&Arc<StageResult>, PipelineError> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .and_then(|(_, result)| result.as_ref())
            .ok_or_else(|| PipelineError::MissingResult(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry_name, _)| entry_name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Every entry in write order; `None` marks a stage that produced nothing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Arc<StageResult>>)> {
        self.entries
            .iter()
            .map(|(name, result)| (name.as_str(), result.as_ref()))
    }

    /// The last entry that holds a result.
    pub fn last_result(&self) -> Option<&Arc<StageResult>> {
        self.entries.iter().rev().find_map(|(_, result)| result.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
