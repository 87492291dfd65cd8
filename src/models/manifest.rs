use indexmap::IndexMap;
use serde::Serialize;

use crate::models::{Record, UploadDescriptor, ValidationWarning};

/// Final state of one source.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Complete,
    Failed,
    Cancelled,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Complete => "complete",
            SourceStatus::Failed => "failed",
            SourceStatus::Cancelled => "cancelled",
        }
    }
}

/// Final state of the whole collection.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Every source ran to completion
    Complete,
    /// At least one source failed
    Partial,
    /// The collection was cancelled before every source finished
    Cancelled,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Complete => "complete",
            CollectionStatus::Partial => "partial",
            CollectionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SourceOutcome {
    pub artifact: String,
    pub source: String,
    /// Archive entry holding the rows; absent for sources never reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Rows written to the entry
    pub rows: u64,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestError {
    pub artifact: String,
    pub source: String,
    pub message: String,
}

/// The `collection_context.json` document.
///
/// Built up by the orchestrator while sources complete and serialized once,
/// as the last data entry of the archive.
#[derive(Serialize, Debug, Clone)]
pub struct CollectionManifest {
    pub flow_id: String,
    pub request_time: String,
    pub status: CollectionStatus,
    pub artifacts: Vec<String>,
    pub sources: Vec<SourceOutcome>,
    pub uploads: Vec<UploadDescriptor>,
    pub errors: Vec<ManifestError>,
    pub warnings: Vec<ValidationWarning>,
    pub resolved_args: IndexMap<String, Record>,
    pub total_rows: u64,
    pub total_uploaded_bytes: u64,
}

impl CollectionManifest {
    pub fn new(flow_id: impl Into<String>, request_time: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            request_time: request_time.into(),
            status: CollectionStatus::Complete,
            artifacts: Vec::new(),
            sources: Vec::new(),
            uploads: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            resolved_args: IndexMap::new(),
            total_rows: 0,
            total_uploaded_bytes: 0,
        }
    }

    /// Registers a collected artifact with its post-coercion arguments.
    pub fn add_artifact(&mut self, name: &str, resolved_args: Record) {
        self.artifacts.push(name.to_string());
        self.resolved_args.insert(name.to_string(), resolved_args);
    }

    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = ValidationWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn add_upload(&mut self, descriptor: UploadDescriptor) {
        self.total_uploaded_bytes += descriptor.size;
        self.uploads.push(descriptor);
    }

    /// Records a collection-level problem that is not tied to a source.
    pub fn add_error(&mut self, artifact: &str, source: &str, message: impl Into<String>) {
        self.errors.push(ManifestError {
            artifact: artifact.to_string(),
            source: source.to_string(),
            message: message.into(),
        });
    }

    pub fn record_outcome(&mut self, outcome: SourceOutcome) {
        self.total_rows += outcome.rows;
        if let Some(message) = &outcome.error {
            self.errors.push(ManifestError {
                artifact: outcome.artifact.clone(),
                source: outcome.source.clone(),
                message: message.clone(),
            });
        }
        self.sources.push(outcome);
    }

    /// Derives the overall status from the recorded source outcomes.
    pub fn finalize(&mut self) {
        self.status = if self
            .sources
            .iter()
            .any(|s| s.status == SourceStatus::Cancelled)
        {
            CollectionStatus::Cancelled
        } else if self.sources.iter().any(|s| s.status == SourceStatus::Failed) {
            CollectionStatus::Partial
        } else {
            CollectionStatus::Complete
        };
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
