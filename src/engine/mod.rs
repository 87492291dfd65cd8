//! Collaborators the collector drives but does not implement.
//!
//! The query language, file accessors and report templating live outside
//! this crate. They are injected into the
//! [`Collector`](crate::collectors::collector::Collector) as trait objects:
//!
//! - [`QueryEngine`] turns a source's query and scope into a row stream
//! - [`Uploader`] reads the bytes behind an upload request
//! - [`ReportRenderer`] renders an artifact's report template

mod uploads;

pub use uploads::{AccessorUploader, PendingUpload, UploadSink};

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::config::{ArtifactDefinition, Report};
use crate::errors::EngineError;
use crate::models::{Record, SourceOutcome};

/// Lazy row sequence produced by one source. Pulled one row at a time.
pub type RowStream = BoxStream<'static, Result<Record, EngineError>>;

/// Everything a query engine gets to see while running one source.
#[derive(Clone)]
pub struct ExecutionContext {
    pub artifact: String,
    /// Fully qualified source name
    pub source: String,
    /// Coerced parameters, bound as named variables
    pub scope: Record,
    pub precondition: Option<String>,
    /// Upload capability for this source
    pub uploads: UploadSink,
    /// Fires when the collection is cancelled
    pub cancel: CancellationToken,
}

#[async_trait::async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute(&self, query: &str, context: ExecutionContext) -> Result<RowStream, EngineError>;
}

/// Reads upload bytes through a named accessor.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    async fn read(&self, accessor: &str, path: &str) -> Result<bytes::Bytes, EngineError>;
}

/// Inputs to one report rendering.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub flow_id: String,
    pub request_time: String,
    /// Resolved arguments of the artifact
    pub scope: Record,
    /// Outcomes of the artifact's sources
    pub sources: Vec<SourceOutcome>,
}

#[async_trait::async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(
        &self,
        artifact: &ArtifactDefinition,
        report: &Report,
        context: &ReportContext,
    ) -> Result<Vec<u8>, EngineError>;
}
