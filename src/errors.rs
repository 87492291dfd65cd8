//! Error types shared across the collection engine.
//!
//! Fatal, collection-wide failures are [`CollectorError`]. Failures raised by
//! external collaborators (query engine, uploader, report renderer) are
//! [`EngineError`] and only ever fail the source that raised them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed artifact definition text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid artifact YAML: {0}")]
    Yaml(String),
    #[error("artifact definition has an empty name")]
    EmptyName,
    #[error("artifact {artifact}: parameter with an empty name")]
    EmptyParameterName { artifact: String },
    #[error("artifact {artifact}: duplicate parameter {parameter}")]
    DuplicateParameter { artifact: String, parameter: String },
    #[error("artifact {artifact}: parameter {parameter} has unknown type {keyword:?}")]
    UnknownType {
        artifact: String,
        parameter: String,
        keyword: String,
    },
    #[error("artifact {artifact}: choices parameter {parameter} declares no choices")]
    MissingChoices { artifact: String, parameter: String },
    #[error("artifact {artifact}: duplicate source {source_name}")]
    DuplicateSource {
        artifact: String,
        source_name: String,
    },
    #[error("artifact {artifact}: source {index} has an empty query")]
    EmptyQuery { artifact: String, index: usize },
    #[error("artifact {artifact}: {name:?} is not a safe archive path")]
    UnsafeName { artifact: String, name: String },
}

/// Errors that abort a whole collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("unknown artifact: {0}")]
    UnknownArtifact(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("archive I/O error on {path}: {source}")]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("archive is already closed")]
    ArchiveClosed,

    #[error("failed to serialize {what}: {source}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CollectorError {
    pub fn archive_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ArchiveIo {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by external collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("unsupported accessor: {0}")]
    UnsupportedAccessor(String),
    #[error("report rendering failed: {0}")]
    Render(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
