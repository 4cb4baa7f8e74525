// THEORY:
// This file is the main entry point for the `pnp_vision` library crate, the
// vision engine of a pick-and-place machine. It defines the public API exposed
// to the machine controller and to tools such as `pipeline_tester`.
//
// The primary export is `Pipeline`: an ordered list of named stages that run
// one after another and publish their results into a per-run store, where any
// later stage can recall them by name. `config` builds pipelines from YAML
// documents. The stage contract, the result types and the reference stages
// live in `core_modules`.

pub mod config;
pub mod core_modules;
pub mod pipeline;

pub use config::{PipelineDocument, StageRegistry};
pub use pipeline::{Pipeline, PipelineError, RunOutcome, RunState, StageResult};
