use std::path::PathBuf;

use indexmap::IndexMap;

use crate::models::{Record, Value};

/// One collection to run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRequest {
    /// Artifact names in collection order
    pub artifacts: Vec<String>,
    /// Raw arguments, keyed by artifact then parameter
    pub args: IndexMap<String, Record>,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    /// Definitions registered for this collection only
    pub inline_definitions: Vec<String>,
}

impl CollectionRequest {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            artifacts: Vec::new(),
            args: IndexMap::new(),
            output_path: output_path.into(),
            report_path: None,
            inline_definitions: Vec::new(),
        }
    }

    pub fn artifact(mut self, name: impl Into<String>) -> Self {
        self.artifacts.push(name.into());
        self
    }

    /// Sets one raw argument of `artifact`.
    pub fn arg(mut self, artifact: &str, parameter: &str, value: impl Into<Value>) -> Self {
        self.args
            .entry(artifact.to_string())
            .or_default()
            .insert(parameter, value);
        self
    }

    /// Replaces every argument of `artifact`.
    pub fn args(mut self, artifact: &str, args: Record) -> Self {
        self.args.insert(artifact.to_string(), args);
        self
    }

    pub fn inline_definition(mut self, text: impl Into<String>) -> Self {
        self.inline_definitions.push(text.into());
        self
    }

    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }
}
