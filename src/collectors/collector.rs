use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::collectors::executor::SourceExecutor;
use crate::collectors::flow::{Clock, FlowIdGenerator};
use crate::collectors::planner::{CollectionPlan, CollectionPlanner};
use crate::config::CollectorConfig;
use crate::constants::CLIENT_REPORT_TYPE;
use crate::engine::{QueryEngine, ReportContext, ReportRenderer, Uploader};
use crate::errors::CollectorError;
use crate::models::{format_timestamp, CollectionManifest, CollectionRequest, Record, Value};
use crate::registry::Repository;
use crate::utils::archive::ArchiveWriter;

/// What a finished collection hands back to the caller.
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub manifest: CollectionManifest,
    /// One record per source, then one describing the container
    pub rows: Vec<Record>,
}

/// Runs collection requests against a base repository.
///
/// Every collaborator is injected, so one collector can serve many
/// requests; nothing from one request outlives it.
pub struct Collector {
    repository: Arc<Repository>,
    engine: Arc<dyn QueryEngine>,
    uploader: Arc<dyn Uploader>,
    clock: Arc<dyn Clock>,
    flow_ids: Arc<dyn FlowIdGenerator>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(
        repository: Arc<Repository>,
        engine: Arc<dyn QueryEngine>,
        uploader: Arc<dyn Uploader>,
        clock: Arc<dyn Clock>,
        flow_ids: Arc<dyn FlowIdGenerator>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            repository,
            engine,
            uploader,
            clock,
            flow_ids,
            renderer: None,
            config,
        }
    }

    pub fn with_report_renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Resolves `request` without executing anything.
    pub fn plan(&self, request: &CollectionRequest) -> Result<CollectionPlan, CollectorError> {
        CollectionPlanner::new(
            &self.repository,
            self.clock.as_ref(),
            self.flow_ids.as_ref(),
            self.config.choice_policy,
        )
        .plan(request)
    }

    /// Runs one collection into `request.output_path`.
    ///
    /// Planning errors fail before the archive is created. Once the archive
    /// exists it is always closed, even when a write fails, and a partial
    /// file is left in place.
    pub async fn collect(
        &self,
        request: &CollectionRequest,
        cancel: CancellationToken,
    ) -> Result<CollectionResult, CollectorError> {
        let plan = self.plan(request)?;

        let mut manifest =
            CollectionManifest::new(&plan.flow_id, format_timestamp(&plan.request_time));
        for artifact in &plan.artifacts {
            manifest.add_artifact(&artifact.definition.name, artifact.binding.scope.clone());
        }
        manifest.add_warnings(plan.all_warnings());

        let mut archive =
            ArchiveWriter::open(&request.output_path, self.config.compression, plan.request_time)
                .await?;

        if let Err(e) = self
            .write_collection(&plan, request, &mut archive, &mut manifest, &cancel)
            .await
        {
            error!("Collection {} failed: {}", plan.flow_id, e);
            if let Err(close_err) = archive.close().await {
                warn!(
                    "Failed to close partial archive {}: {}",
                    request.output_path.display(),
                    close_err
                );
            }
            return Err(e);
        }
        archive.close().await?;

        info!(
            "Collection {} {}: {} sources, {} rows, {} uploads written to {}",
            manifest.flow_id,
            manifest.status.as_str(),
            manifest.sources.len(),
            manifest.total_rows,
            manifest.uploads.len(),
            request.output_path.display()
        );

        let rows = summary_rows(&manifest, &request.output_path, request.report_path.as_deref());
        Ok(CollectionResult { manifest, rows })
    }

    async fn write_collection(
        &self,
        plan: &CollectionPlan,
        request: &CollectionRequest,
        archive: &mut ArchiveWriter,
        manifest: &mut CollectionManifest,
        cancel: &CancellationToken,
    ) -> Result<(), CollectorError> {
        let executor = SourceExecutor::new(self.engine.clone(), self.uploader.clone(), &self.config);
        executor.run(plan, archive, manifest, cancel).await?;

        let report = if cancel.is_cancelled() {
            info!("Collection {} cancelled, skipping reports", plan.flow_id);
            None
        } else {
            self.render_reports(plan, request, manifest).await
        };

        manifest.finalize();
        archive.write_manifest(manifest).await?;

        if let Some(report) = report {
            archive.write_report(&report).await?;
            if let Some(path) = &request.report_path {
                tokio::fs::write(path, &report)
                    .await
                    .map_err(|e| CollectorError::archive_io(path, e))?;
                info!("Wrote report to {}", path.display());
            }
        }
        Ok(())
    }

    /// Renders every CLIENT report in artifact order. Render failures are
    /// recorded in the manifest and leave their fragment out.
    async fn render_reports(
        &self,
        plan: &CollectionPlan,
        request: &CollectionRequest,
        manifest: &mut CollectionManifest,
    ) -> Option<Vec<u8>> {
        let renderer = self.renderer.as_ref()?;
        if request.report_path.is_none() && !plan.has_report(CLIENT_REPORT_TYPE) {
            return None;
        }

        let mut fragments: Vec<Vec<u8>> = Vec::new();
        for artifact in &plan.artifacts {
            let definition = &artifact.definition;
            let context = ReportContext {
                flow_id: plan.flow_id.clone(),
                request_time: manifest.request_time.clone(),
                scope: artifact.binding.scope.clone(),
                sources: manifest
                    .sources
                    .iter()
                    .filter(|s| s.artifact == definition.name)
                    .cloned()
                    .collect(),
            };
            for report in definition
                .reports
                .iter()
                .filter(|r| r.report_type == CLIENT_REPORT_TYPE)
            {
                match renderer.render(definition, report, &context).await {
                    Ok(fragment) => fragments.push(fragment),
                    Err(e) => {
                        warn!("Report for {} failed: {}", definition.name, e);
                        manifest.add_error(&definition.name, "report", e.to_string());
                    }
                }
            }
        }
        Some(fragments.join(&b'\n'))
    }
}

/// One record per source followed by a record describing the container.
pub fn summary_rows(
    manifest: &CollectionManifest,
    output_path: &Path,
    report_path: Option<&Path>,
) -> Vec<Record> {
    let mut rows: Vec<Record> = manifest
        .sources
        .iter()
        .map(|outcome| {
            Record::new()
                .set("Artifact", outcome.artifact.as_str())
                .set("Source", outcome.source.as_str())
                .set("Entry", outcome.entry.clone())
                .set("Rows", outcome.rows)
                .set("Status", outcome.status.as_str())
                .set("Error", outcome.error.clone())
        })
        .collect();

    let report = match report_path {
        Some(path) => Value::from(path.display().to_string()),
        None => Value::Null,
    };
    rows.push(
        Record::new()
            .set("Container", output_path.display().to_string())
            .set("Report", report)
            .set("FlowId", manifest.flow_id.as_str())
            .set("Status", manifest.status.as_str())
            .set("Uploads", manifest.uploads.len() as u64),
    );
    rows
}
