use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::collectors::flow::{Clock, FlowIdGenerator};
use crate::config::{ArtifactDefinition, ChoicePolicy};
use crate::constants::{MANIFEST_ENTRY_NAME, REPORT_ENTRY_NAME};
use crate::errors::CollectorError;
use crate::models::{format_timestamp, CollectionRequest, ValidationWarning};
use crate::params::{ParameterBinding, ParameterCoercer};
use crate::registry::{Repository, RequestOverlay};

/// One source, ready to hand to the query engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSource {
    /// Position in collection order, across all artifacts
    pub index: usize,
    pub artifact: String,
    /// Fully qualified source name
    pub name: String,
    pub entry_name: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precondition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlannedArtifact {
    pub definition: Arc<ArtifactDefinition>,
    pub binding: ParameterBinding,
    pub sources: Vec<PlannedSource>,
}

/// A resolved collection: artifacts in order with their bound arguments.
#[derive(Debug, Clone)]
pub struct CollectionPlan {
    pub flow_id: String,
    pub request_time: DateTime<Utc>,
    pub artifacts: Vec<PlannedArtifact>,
    /// Warnings not tied to a requested artifact
    pub warnings: Vec<ValidationWarning>,
}

impl CollectionPlan {
    /// Every source in collection order
    pub fn sources(&self) -> impl Iterator<Item = (&PlannedArtifact, &PlannedSource)> {
        self.artifacts
            .iter()
            .flat_map(|artifact| artifact.sources.iter().map(move |source| (artifact, source)))
    }

    pub fn source_count(&self) -> usize {
        self.artifacts.iter().map(|a| a.sources.len()).sum()
    }

    /// Plan-level warnings followed by each artifact's binding warnings
    pub fn all_warnings(&self) -> Vec<ValidationWarning> {
        self.warnings
            .iter()
            .chain(self.artifacts.iter().flat_map(|a| a.binding.warnings.iter()))
            .cloned()
            .collect()
    }

    pub fn has_report(&self, report_type: &str) -> bool {
        self.artifacts
            .iter()
            .any(|a| a.definition.has_report(report_type))
    }

    /// JSON description of the plan, for dry runs.
    pub fn describe(&self) -> serde_json::Value {
        let artifacts: Vec<serde_json::Value> = self
            .artifacts
            .iter()
            .map(|artifact| {
                json!({
                    "name": artifact.definition.name,
                    "resolved_args": artifact.binding.scope,
                    "sources": artifact.sources,
                })
            })
            .collect();
        json!({
            "flow_id": self.flow_id,
            "request_time": format_timestamp(&self.request_time),
            "artifacts": artifacts,
            "warnings": self.all_warnings(),
        })
    }
}

/// Resolves a request into a [`CollectionPlan`] without running anything.
pub struct CollectionPlanner<'a> {
    repository: &'a Repository,
    clock: &'a dyn Clock,
    flow_ids: &'a dyn FlowIdGenerator,
    coercer: ParameterCoercer,
}

impl<'a> CollectionPlanner<'a> {
    pub fn new(
        repository: &'a Repository,
        clock: &'a dyn Clock,
        flow_ids: &'a dyn FlowIdGenerator,
        choice_policy: ChoicePolicy,
    ) -> Self {
        Self {
            repository,
            clock,
            flow_ids,
            coercer: ParameterCoercer::new(choice_policy),
        }
    }

    /// Registers the request's inline definitions, resolves the requested
    /// artifacts and binds their arguments.
    ///
    /// Fails on malformed inline definitions, unknown artifacts and
    /// colliding entry names. Argument problems are only warnings.
    pub fn plan(&self, request: &CollectionRequest) -> Result<CollectionPlan, CollectorError> {
        let mut overlay = RequestOverlay::new(self.repository);
        for text in &request.inline_definitions {
            overlay.register_inline(text)?;
        }
        let definitions = overlay.resolve(&request.artifacts)?;

        let mut warnings = Vec::new();
        for name in request.args.keys() {
            if !definitions.iter().any(|d| &d.name == name) {
                let warning = ValidationWarning {
                    artifact: name.clone(),
                    parameter: "*".to_string(),
                    message: "arguments supplied for an artifact that was not requested".to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }

        // Entry names are reserved up front so a collision fails before any
        // archive work starts.
        let mut entries: HashSet<String> =
            [MANIFEST_ENTRY_NAME, REPORT_ENTRY_NAME].iter().map(|s| s.to_string()).collect();
        let mut index = 0;
        let mut artifacts = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let binding = self
                .coercer
                .bind(&definition, request.args.get(&definition.name));

            let mut sources = Vec::with_capacity(definition.sources.len());
            for source in &definition.sources {
                let entry_name = source.entry_name(&definition.name);
                if !entries.insert(entry_name.clone()) {
                    return Err(CollectorError::DuplicateEntry(entry_name));
                }
                sources.push(PlannedSource {
                    index,
                    artifact: definition.name.clone(),
                    name: source.full_name(&definition.name),
                    entry_name,
                    query: source.query.clone(),
                    precondition: source.precondition.clone(),
                });
                index += 1;
            }

            artifacts.push(PlannedArtifact {
                definition,
                binding,
                sources,
            });
        }

        let plan = CollectionPlan {
            flow_id: self.flow_ids.new_flow_id(),
            request_time: self.clock.now(),
            artifacts,
            warnings,
        };
        info!(
            "Planned collection {}: {} artifacts, {} sources",
            plan.flow_id,
            plan.artifacts.len(),
            plan.source_count()
        );
        Ok(plan)
    }
}
