//! The collection archive: a single-writer, append-only zip file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::constants::{ARCHIVE_BUFFER_SIZE, MANIFEST_ENTRY_NAME, REPORT_ENTRY_NAME};
use crate::errors::CollectorError;
use crate::models::CollectionManifest;
use crate::utils::streaming_zip::{CompressionMethod, FileOptions, StreamingZipWriter};

type ZipFile = StreamingZipWriter<BufWriter<File>>;

/// Writes named entries into one zip file.
///
/// Entry names are unique. One entry is open at a time; `write_chunk`
/// appends to it. [`close`](Self::close) finalizes the container and may be
/// called any number of times, including after a failed write.
pub struct ArchiveWriter {
    path: PathBuf,
    zip: Option<ZipFile>,
    options: FileOptions,
    names: HashSet<String>,
    order: Vec<String>,
}

impl ArchiveWriter {
    /// Creates the archive, truncating any existing file at `path`.
    pub async fn open(
        path: &Path,
        compression: CompressionMethod,
        modified: DateTime<Utc>,
    ) -> Result<Self, CollectorError> {
        let file = File::create(path)
            .await
            .map_err(|e| CollectorError::archive_io(path, e))?;
        info!("Writing collection archive to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            zip: Some(StreamingZipWriter::new(BufWriter::with_capacity(
                ARCHIVE_BUFFER_SIZE,
                file,
            ))),
            options: FileOptions::new(compression, modified),
            names: HashSet::new(),
            order: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in the order they were started
    pub fn entry_names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_closed(&self) -> bool {
        self.zip.is_none()
    }

    fn zip(&mut self) -> Result<&mut ZipFile, CollectorError> {
        self.zip.as_mut().ok_or(CollectorError::ArchiveClosed)
    }

    /// Opens a new entry. An entry still open is finished first.
    pub async fn start_entry(&mut self, name: &str) -> Result<(), CollectorError> {
        if self.names.contains(name) {
            return Err(CollectorError::DuplicateEntry(name.to_string()));
        }
        let options = self.options;
        let path = self.path.clone();
        let zip = self.zip()?;
        if zip.has_open_entry() {
            zip.finish_file()
                .await
                .map_err(|e| CollectorError::archive_io(&path, e))?;
        }
        zip.start_file(name, options)
            .await
            .map_err(|e| CollectorError::archive_io(&path, e))?;

        debug!("Started archive entry {}", name);
        self.names.insert(name.to_string());
        self.order.push(name.to_string());
        Ok(())
    }

    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), CollectorError> {
        let path = self.path.clone();
        self.zip()?
            .write_data(data)
            .await
            .map_err(|e| CollectorError::archive_io(path, e))
    }

    pub async fn finish_entry(&mut self) -> Result<(), CollectorError> {
        let path = self.path.clone();
        self.zip()?
            .finish_file()
            .await
            .map_err(|e| CollectorError::archive_io(path, e))
    }

    /// Writes a complete entry.
    pub async fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<(), CollectorError> {
        self.start_entry(name).await?;
        self.write_chunk(data).await?;
        self.finish_entry().await
    }

    /// Writes the `collection_context.json` entry.
    pub async fn write_manifest(&mut self, manifest: &CollectionManifest) -> Result<(), CollectorError> {
        let json = manifest
            .to_json_bytes()
            .map_err(|source| CollectorError::Serialization {
                what: "collection manifest".to_string(),
                source,
            })?;
        self.write_entry(MANIFEST_ENTRY_NAME, &json).await
    }

    pub async fn write_report(&mut self, report: &[u8]) -> Result<(), CollectorError> {
        self.write_entry(REPORT_ENTRY_NAME, report).await
    }

    /// Finalizes the container. Later calls do nothing.
    pub async fn close(&mut self) -> Result<(), CollectorError> {
        let Some(zip) = self.zip.take() else {
            return Ok(());
        };
        let entries = zip.entries().len();
        let mut buffered = zip
            .finish()
            .await
            .map_err(|e| CollectorError::archive_io(&self.path, e))?;
        tokio::io::AsyncWriteExt::shutdown(&mut buffered)
            .await
            .map_err(|e| CollectorError::archive_io(&self.path, e))?;

        info!(
            "Closed collection archive {} ({} entries)",
            self.path.display(),
            entries
        );
        Ok(())
    }
}
