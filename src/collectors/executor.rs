//! Runs sources against the query engine and streams their output into the
//! archive.
//!
//! Every source is drained by its own tokio task into a bounded channel.
//! The orchestrating task is the only archive writer: it consumes the
//! channels strictly in collection order, so entries come out in the same
//! order no matter how many sources run ahead. A source running ahead
//! blocks once its channel is full.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::collectors::planner::{CollectionPlan, PlannedArtifact, PlannedSource};
use crate::config::{CollectorConfig, RowFormat};
use crate::constants::{
    ERROR_COLLECTION_CANCELLED, ERROR_SOURCE_TASK_PANICKED, MANIFEST_ENTRY_NAME,
    REPORT_ENTRY_NAME,
};
use crate::engine::{ExecutionContext, PendingUpload, QueryEngine, UploadSink, Uploader};
use crate::errors::{CollectorError, EngineError};
use crate::models::{CollectionManifest, Record, SourceOutcome, SourceStatus};
use crate::security::UploadNamer;
use crate::utils::archive::ArchiveWriter;
use crate::utils::rows::RowEncoder;

/// What a source task reports to the archive writer.
pub enum SourceEvent {
    Row(Record),
    Upload(PendingUpload),
    /// The row stream ended
    Done,
    Failed(String),
    Cancelled,
}

impl SourceEvent {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceEvent::Done | SourceEvent::Failed(_) | SourceEvent::Cancelled
        )
    }
}

/// A running source. Dropping the handle aborts its task.
pub struct SourceHandle {
    events: mpsc::Receiver<SourceEvent>,
    task: JoinHandle<()>,
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn stream_rows(
    engine: &dyn QueryEngine,
    query: &str,
    context: ExecutionContext,
    events: &mpsc::Sender<SourceEvent>,
) -> SourceEvent {
    let mut rows = match engine.execute(query, context).await {
        Ok(rows) => rows,
        Err(e) => return SourceEvent::Failed(e.to_string()),
    };
    while let Some(row) = rows.next().await {
        match row {
            Ok(row) => {
                if events.send(SourceEvent::Row(row)).await.is_err() {
                    // Nobody is listening any more
                    return SourceEvent::Done;
                }
            }
            Err(e) => return SourceEvent::Failed(e.to_string()),
        }
    }
    SourceEvent::Done
}

async fn drain_source(
    engine: Arc<dyn QueryEngine>,
    query: String,
    context: ExecutionContext,
    events: mpsc::Sender<SourceEvent>,
) {
    let cancel = context.cancel.clone();
    let terminal = tokio::select! {
        biased;
        _ = cancel.cancelled() => SourceEvent::Cancelled,
        terminal = stream_rows(engine.as_ref(), &query, context, &events) => terminal,
    };
    let _ = events.send(terminal).await;
}

/// Executes planned sources and writes their results.
pub struct SourceExecutor {
    engine: Arc<dyn QueryEngine>,
    uploader: Arc<dyn Uploader>,
    row_format: RowFormat,
    row_buffer: usize,
    max_concurrent_sources: usize,
    max_upload_size: Option<u64>,
    max_buffered_upload_bytes: u64,
}

impl SourceExecutor {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        uploader: Arc<dyn Uploader>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            engine,
            uploader,
            row_format: config.row_format,
            row_buffer: config.row_buffer.max(1),
            max_concurrent_sources: config.max_concurrent_sources.max(1),
            max_upload_size: config.max_upload_size,
            max_buffered_upload_bytes: config.max_buffered_upload_bytes,
        }
    }

    /// Starts draining one source in the background.
    pub fn spawn(
        &self,
        artifact: &PlannedArtifact,
        source: &PlannedSource,
        cancel: &CancellationToken,
    ) -> SourceHandle {
        let (tx, rx) = mpsc::channel(self.row_buffer);
        let context = ExecutionContext {
            artifact: source.artifact.clone(),
            source: source.name.clone(),
            scope: artifact.binding.scope.clone(),
            precondition: source.precondition.clone(),
            uploads: UploadSink::new(
                self.uploader.clone(),
                tx.clone(),
                self.max_upload_size,
                cancel.clone(),
            ),
            cancel: cancel.clone(),
        };
        debug!("Spawning source {} (#{})", source.name, source.index);

        let task = tokio::spawn(drain_source(
            self.engine.clone(),
            source.query.clone(),
            context,
            tx,
        ));
        SourceHandle { events: rx, task }
    }

    /// Runs every source of `plan` and records each outcome in `manifest`.
    ///
    /// Up to `max_concurrent_sources` sources run at a time, the one being
    /// written included. Sources not started when `cancel` fires are
    /// recorded as cancelled without an entry. Only archive failures are
    /// returned as errors.
    pub async fn run(
        &self,
        plan: &CollectionPlan,
        archive: &mut ArchiveWriter,
        manifest: &mut CollectionManifest,
        cancel: &CancellationToken,
    ) -> Result<(), CollectorError> {
        let reserved = plan
            .sources()
            .map(|(_, source)| source.entry_name.clone())
            .chain([MANIFEST_ENTRY_NAME.to_string(), REPORT_ENTRY_NAME.to_string()]);
        let mut namer = UploadNamer::with_reserved(reserved);

        let sources: Vec<(&PlannedArtifact, &PlannedSource)> = plan.sources().collect();
        let mut pending: VecDeque<SourceHandle> = VecDeque::with_capacity(self.max_concurrent_sources);
        let mut spawned = 0;

        for (position, (_, source)) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                pending.clear();
                manifest.record_outcome(unreached(source));
                continue;
            }
            while spawned < sources.len() && spawned < position + self.max_concurrent_sources {
                let (next_artifact, next_source) = sources[spawned];
                pending.push_back(self.spawn(next_artifact, next_source, cancel));
                spawned += 1;
            }
            let Some(handle) = pending.pop_front() else {
                manifest.record_outcome(unreached(source));
                continue;
            };

            let outcome = self
                .write_source(source, handle, &mut namer, archive, manifest)
                .await?;
            manifest.record_outcome(outcome);
        }
        Ok(())
    }

    /// Writes one source's rows as its result entry, followed by the
    /// uploads it captured.
    ///
    /// Uploads are named as they are accepted here, so stored names follow
    /// collection order. Their bytes are held until the result entry is
    /// closed, up to `max_buffered_upload_bytes` per source.
    pub async fn write_source(
        &self,
        source: &PlannedSource,
        mut handle: SourceHandle,
        namer: &mut UploadNamer,
        archive: &mut ArchiveWriter,
        manifest: &mut CollectionManifest,
    ) -> Result<SourceOutcome, CollectorError> {
        info!("Collecting {}", source.name);
        archive.start_entry(&source.entry_name).await?;

        let mut encoder = RowEncoder::new(self.row_format);
        archive.write_chunk(encoder.begin()).await?;

        let mut uploads: Vec<(String, Bytes)> = Vec::new();
        let mut buffered: u64 = 0;
        let mut failure: Option<(SourceStatus, String)> = None;
        let mut terminated = false;

        while let Some(event) = handle.events.recv().await {
            terminated = event.is_terminal();
            match event {
                SourceEvent::Row(row) => match encoder.encode(&row) {
                    Ok(bytes) => archive.write_chunk(&bytes).await?,
                    Err(e) => {
                        failure = Some((SourceStatus::Failed, format!("failed to serialize row: {}", e)));
                        terminated = true;
                        break;
                    }
                },
                SourceEvent::Upload(pending) => {
                    let size = pending.data.len() as u64;
                    if buffered + size > self.max_buffered_upload_bytes {
                        warn!(
                            "Refusing upload {} from {}: {} bytes already held",
                            pending.path, source.name, buffered
                        );
                        let _ = pending.reply.send(Err(EngineError::Upload(format!(
                            "{} would exceed the {} byte upload buffer of {}",
                            pending.path, self.max_buffered_upload_bytes, source.name
                        ))));
                        continue;
                    }
                    buffered += size;

                    let stored_name = namer.allocate(&pending.accessor, pending.requested_name());
                    let descriptor = pending.descriptor(stored_name);
                    debug!("Accepted upload {} ({} bytes)", descriptor.name, descriptor.size);
                    manifest.add_upload(descriptor.clone());
                    uploads.push((descriptor.name.clone(), pending.data));
                    let _ = pending.reply.send(Ok(descriptor));
                }
                SourceEvent::Done => break,
                SourceEvent::Failed(message) => {
                    failure = Some((SourceStatus::Failed, message));
                    break;
                }
                SourceEvent::Cancelled => {
                    failure = Some((SourceStatus::Cancelled, ERROR_COLLECTION_CANCELLED.to_string()));
                    break;
                }
            }
        }

        if !terminated {
            let message = match (&mut handle.task).await {
                Err(e) => task_failure_message(e),
                Ok(()) => ERROR_SOURCE_TASK_PANICKED.to_string(),
            };
            failure = Some((SourceStatus::Failed, message));
        }
        drop(handle);

        archive.write_chunk(encoder.end()).await?;
        archive.finish_entry().await?;
        for (name, data) in &uploads {
            archive.write_entry(name, data).await?;
        }

        let rows = encoder.rows();
        let (status, error) = match failure {
            None => {
                info!("Source {} complete: {} rows, {} uploads", source.name, rows, uploads.len());
                (SourceStatus::Complete, None)
            }
            Some((status, message)) => {
                warn!("Source {} stopped after {} rows: {}", source.name, rows, message);
                (status, Some(message))
            }
        };

        Ok(SourceOutcome {
            artifact: source.artifact.clone(),
            source: source.name.clone(),
            entry: Some(source.entry_name.clone()),
            rows,
            status,
            error,
        })
    }
}

/// Describes a source task that ended without reporting a terminal event.
fn task_failure_message(error: JoinError) -> String {
    if !error.is_panic() {
        return ERROR_SOURCE_TASK_PANICKED.to_string();
    }
    let payload = error.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("{}: {}", ERROR_SOURCE_TASK_PANICKED, detail),
        None => ERROR_SOURCE_TASK_PANICKED.to_string(),
    }
}

fn unreached(source: &PlannedSource) -> SourceOutcome {
    SourceOutcome {
        artifact: source.artifact.clone(),
        source: source.name.clone(),
        entry: None,
        rows: 0,
        status: SourceStatus::Cancelled,
        error: Some(ERROR_COLLECTION_CANCELLED.to_string()),
    }
}
