//! Collection orchestration.
//!
//! A collection runs in two phases:
//!
//! ```text
//! CollectionRequest
//!        │  planner: resolve names, bind arguments, reserve entries
//!        ▼
//! CollectionPlan
//!        │  executor: drain sources in order into the archive
//!        ▼
//! archive + collection_context.json (+ report.html)
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use artifact_collector::collectors::collector::Collector;
//! use artifact_collector::collectors::flow::{RandomFlowIds, SystemClock};
//! use artifact_collector::config::CollectorConfig;
//! use artifact_collector::engine::{AccessorUploader, QueryEngine};
//! use artifact_collector::models::CollectionRequest;
//! use artifact_collector::registry::Repository;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(engine: Arc<dyn QueryEngine>) -> anyhow::Result<()> {
//! let mut repository = Repository::new();
//! repository.load_path(std::path::Path::new("artifacts/"))?;
//!
//! let collector = Collector::new(
//!     Arc::new(repository),
//!     engine,
//!     Arc::new(AccessorUploader),
//!     Arc::new(SystemClock),
//!     Arc::new(RandomFlowIds),
//!     CollectorConfig::default(),
//! );
//! let request = CollectionRequest::new("/tmp/collection.zip")
//!     .artifact("Linux.Triage")
//!     .arg("Linux.Triage", "IncludeUsers", "Y");
//! let result = collector.collect(&request, CancellationToken::new()).await?;
//!
//! println!("Collected {} rows", result.manifest.total_rows);
//! # Ok(())
//! # }
//! ```

/// Entry point tying planning and execution together
pub mod collector;

/// Ordered, bounded-concurrency source execution
pub mod executor;

/// Injectable clock and flow id generators
pub mod flow;

/// Request resolution and argument binding
pub mod planner;
