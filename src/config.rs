// THEORY:
// Pipelines are normally described in a configuration document rather than
// assembled in code. This module is that upstream producer: it reads a YAML
// document listing stages (type tag, name, enabled flag and camelCase
// parameters), instantiates each stage through a `StageRegistry`, lets the
// stage parse its own parameters, and hands back a ready `Pipeline`.
//
// The engine itself never parses anything. Everything here could be replaced
// by another front end (a GUI editor, a different file format) without
// touching `pipeline` or the result store.

use crate::core_modules::error::PipelineError;
use crate::core_modules::stage::{Stage, StageParameters};
use crate::core_modules::stage_result::ColorSpace;
use crate::core_modules::stages::{Capture, ConvertColor, ImageWrite, Recall, Threshold};
use crate::pipeline::Pipeline;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Creates an unconfigured stage with the given name.
pub type StageFactory = Box<dyn Fn(&str) -> Box<dyn Stage> + Send + Sync>;

/// Maps stage type tags to constructors.
pub struct StageRegistry {
    factories: HashMap<String, StageFactory>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StageRegistry {
    /// A registry with no stage types.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with every reference stage registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("Capture", |name| Box::new(Capture::new(name)));
        registry.register("ConvertColor", |name| Box::new(ConvertColor::new(name, ColorSpace::Gray)));
        registry.register("Threshold", |name| Box::new(Threshold::new(name)));
        registry.register("ImageRecall", |name| Box::new(Recall::new(name)));
        registry.register("ImageWrite", |name| Box::new(ImageWrite::new(name)));
        registry
    }

    /// Registers (or replaces) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&str) -> Box<dyn Stage> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    pub fn create(&self, kind: &str, name: &str) -> Option<Box<dyn Stage>> {
        self.factories.get(kind).map(|factory| factory(name))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

fn default_enabled() -> bool {
    true
}

/// One stage entry of a pipeline document.
#[derive(Debug, Clone, Deserialize)]
pub struct StageDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Every other key, passed to the stage's `configure`.
    #[serde(flatten)]
    pub parameters: StageParameters,
}

/// A whole pipeline as described in a configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub stages: Vec<StageDocument>,
}

impl PipelineDocument {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Instantiates and configures every stage, in document order.
    pub fn build(&self, registry: &StageRegistry) -> Result<Pipeline, PipelineError> {
        let mut pipeline = match &self.name {
            Some(name) => Pipeline::named(name.as_str()),
            None => Pipeline::new(),
        };

        for entry in &self.stages {
            let mut stage = registry
                .create(&entry.kind, &entry.name)
                .ok_or_else(|| PipelineError::Config(format!("unknown stage type `{}`", entry.kind)))?;
            stage
                .configure(&entry.parameters)
                .map_err(|e| PipelineError::Config(format!("stage `{}`: {}", entry.name, e)))?;
            stage.set_enabled(entry.enabled);
            debug!(stage = %entry.name, kind = %entry.kind, enabled = entry.enabled, "configured stage");
            pipeline.add_boxed_stage(stage)?;
        }

        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RunState;

    const DOCUMENT: &str = r#"
name: fiducial
stages:
  - type: ConvertColor
    name: gray
    conversion: Gray
  - type: Threshold
    name: mask
    threshold: 90
    invert: true
  - type: ImageRecall
    name: echo
    enabled: false
    imageStageName: gray
"#;

    #[test]
    fn document_builds_stages_in_order() {
        let document = PipelineDocument::from_yaml_str(DOCUMENT).unwrap();
        assert_eq!(document.stages[1].parameters.len(), 2);

        let pipeline = document.build(&StageRegistry::with_defaults()).unwrap();

        assert_eq!(pipeline.name(), "fiducial");
        assert_eq!(pipeline.stage_names(), &["gray", "mask", "echo"]);
        assert!(pipeline.is_stage_enabled("gray").unwrap());
        assert!(!pipeline.is_stage_enabled("echo").unwrap());
    }

    #[test]
    fn built_pipeline_runs() {
        let pipeline = PipelineDocument::from_yaml_str(DOCUMENT)
            .unwrap()
            .build(&StageRegistry::with_defaults())
            .unwrap();

        // No capture stage, so the converters have nothing to work on.
        let outcome = pipeline.run().unwrap();
        assert!(outcome.last_result().is_none());
        assert_eq!(pipeline.state(), RunState::Completed);
    }

    #[test]
    fn unknown_stage_type_is_rejected() {
        let yaml = "stages:\n  - type: TemplateMatch\n    name: match\n";
        let err = PipelineDocument::from_yaml_str(yaml)
            .unwrap()
            .build(&StageRegistry::with_defaults())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Config(message) if message.contains("TemplateMatch")));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = "stages:\n  - type: ImageRecall\n    name: echo\n  - type: Threshold\n    name: echo\n";
        let err = PipelineDocument::from_yaml_str(yaml)
            .unwrap()
            .build(&StageRegistry::with_defaults())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::DuplicateName(name) if name == "echo"));
    }

    #[test]
    fn bad_parameters_name_the_stage() {
        let yaml = "stages:\n  - type: Threshold\n    name: mask\n    threshold: lots\n";
        let err = PipelineDocument::from_yaml_str(yaml)
            .unwrap()
            .build(&StageRegistry::with_defaults())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Config(message) if message.starts_with("stage `mask`")));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            PipelineDocument::from_yaml_str("stages: [unclosed"),
            Err(PipelineError::Yaml(_))
        ));
    }

    #[test]
    fn custom_stage_types_can_be_registered() {
        let mut registry = StageRegistry::empty();
        registry.register("Echo", |name| Box::new(Recall::new(name)));
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["Echo"]);
        assert!(registry.create("Echo", "e").is_some());
        assert!(registry.create("Capture", "c").is_none());
    }
}
