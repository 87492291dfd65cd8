//! Core data models shared by the collection pipeline.

mod manifest;
mod record;
mod request;

pub use manifest::{
    CollectionManifest, CollectionStatus, ManifestError, SourceOutcome, SourceStatus,
};
pub use record::{format_timestamp, Record, Value};
pub use request::CollectionRequest;

use serde::{Deserialize, Serialize};

/// Describes one file captured while a source was running.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    /// Archive-relative name the bytes are stored under
    pub name: String,
    /// Accessor the bytes were read through
    pub accessor: String,
    /// Path (or literal content for the `data` accessor) handed to the accessor
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl UploadDescriptor {
    /// Row form handed back to the query engine.
    pub fn to_record(&self) -> Record {
        Record::new()
            .set("Path", self.path.as_str())
            .set("StoredName", self.name.as_str())
            .set("Accessor", self.accessor.as_str())
            .set("Size", self.size)
            .set("Sha256", self.sha256.as_str())
    }
}

/// A non-fatal problem found while binding arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub artifact: String,
    pub parameter: String,
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: parameter {}: {}", self.artifact, self.parameter, self.message)
    }
}
