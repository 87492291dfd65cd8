use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::collectors::executor::SourceEvent;
use crate::constants::ERROR_COLLECTION_CLOSED;
use crate::engine::Uploader;
use crate::errors::EngineError;
use crate::models::UploadDescriptor;
use crate::utils::hash::sha256_hex;

/// Bytes captured by a source, waiting for the archive writer to give them
/// a stored name.
///
/// Names are handed out by the writer as it reaches each source in
/// collection order, so the same plan always names its uploads the same
/// way however far sources run ahead.
pub struct PendingUpload {
    pub accessor: String,
    pub path: String,
    /// Name requested by the engine; `path` is used when absent
    pub name: Option<String>,
    pub data: Bytes,
    pub sha256: String,
    pub reply: oneshot::Sender<Result<UploadDescriptor, EngineError>>,
}

impl PendingUpload {
    /// The name the stored name is derived from.
    pub fn requested_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }

    pub fn descriptor(&self, stored_name: String) -> UploadDescriptor {
        UploadDescriptor {
            name: stored_name,
            accessor: self.accessor.clone(),
            path: self.path.clone(),
            size: self.data.len() as u64,
            sha256: self.sha256.clone(),
        }
    }
}

/// Upload capability handed to a query engine for one source.
///
/// Reading goes through the injected [`Uploader`]; the captured bytes travel
/// to the archive writer on the source's own event channel, so they land
/// right after the source's result entry.
#[derive(Clone)]
pub struct UploadSink {
    uploader: Arc<dyn Uploader>,
    events: mpsc::Sender<SourceEvent>,
    max_upload_size: Option<u64>,
    cancel: CancellationToken,
}

impl UploadSink {
    pub fn new(
        uploader: Arc<dyn Uploader>,
        events: mpsc::Sender<SourceEvent>,
        max_upload_size: Option<u64>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            uploader,
            events,
            max_upload_size,
            cancel,
        }
    }

    /// Captures the bytes at `path` through `accessor`.
    ///
    /// The stored name is derived from `name` when given, otherwise from
    /// `path`. Resolves once the archive writer has accepted the upload and
    /// returns the descriptor recorded in the manifest.
    pub async fn upload(
        &self,
        accessor: &str,
        path: &str,
        name: Option<&str>,
    ) -> Result<UploadDescriptor, EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Upload(ERROR_COLLECTION_CLOSED.to_string()));
        }

        let data = self.uploader.read(accessor, path).await?;
        if let Some(limit) = self.max_upload_size {
            if data.len() as u64 > limit {
                return Err(EngineError::Upload(format!(
                    "{} is {} bytes, over the {} byte upload limit",
                    path,
                    data.len(),
                    limit
                )));
            }
        }
        debug!("Captured {} bytes from {}:{}", data.len(), accessor, path);

        let (reply, accepted) = oneshot::channel();
        let event = SourceEvent::Upload(PendingUpload {
            accessor: accessor.to_string(),
            path: path.to_string(),
            name: name.map(str::to_string),
            sha256: sha256_hex(&data),
            data,
            reply,
        });
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(EngineError::Upload(ERROR_COLLECTION_CLOSED.to_string()));
            }
            sent = self.events.send(event) => {
                if sent.is_err() {
                    return Err(EngineError::Upload(ERROR_COLLECTION_CLOSED.to_string()));
                }
            }
        }
        accepted
            .await
            .map_err(|_| EngineError::Upload(ERROR_COLLECTION_CLOSED.to_string()))?
    }
}

/// Uploader for the two built-in accessors.
///
/// - `data`: the path is the content itself
/// - `file`: the path names a file on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessorUploader;

#[async_trait::async_trait]
impl Uploader for AccessorUploader {
    async fn read(&self, accessor: &str, path: &str) -> Result<Bytes, EngineError> {
        match accessor {
            "data" => Ok(Bytes::copy_from_slice(path.as_bytes())),
            "file" => {
                let data = tokio::fs::read(path).await?;
                info!("Read {} bytes from {}", data.len(), path);
                Ok(Bytes::from(data))
            }
            other => Err(EngineError::UnsupportedAccessor(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::UploadNamer;
    use crate::test_utils::create_temp_file;

    fn sink(
        max_upload_size: Option<u64>,
    ) -> (UploadSink, mpsc::Receiver<SourceEvent>, CancellationToken) {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let sink = UploadSink::new(Arc::new(AccessorUploader), tx, max_upload_size, cancel.clone());
        (sink, rx, cancel)
    }

    /// Accepts every upload the way the archive writer does and hands back
    /// what it received.
    fn accept_all(mut rx: mpsc::Receiver<SourceEvent>) -> tokio::task::JoinHandle<Vec<Bytes>> {
        tokio::spawn(async move {
            let mut namer = UploadNamer::new();
            let mut received = Vec::new();
            while let Some(event) = rx.recv().await {
                if let SourceEvent::Upload(pending) = event {
                    let descriptor =
                        pending.descriptor(namer.allocate(&pending.accessor, pending.requested_name()));
                    received.push(pending.data.clone());
                    let _ = pending.reply.send(Ok(descriptor));
                }
            }
            received
        })
    }

    #[tokio::test]
    async fn test_data_upload_is_forwarded() {
        let (sink, rx, _cancel) = sink(None);
        let writer = accept_all(rx);

        let descriptor = sink
            .upload("data", "hello world", Some("hello.txt"))
            .await
            .unwrap();
        assert_eq!(descriptor.name, "uploads/data/hello.txt");
        assert_eq!(descriptor.size, 11);
        assert_eq!(
            descriptor.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        drop(sink);
        let received = writer.await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(&received[0][..], b"hello world");
    }

    #[tokio::test]
    async fn test_file_upload_uses_path_as_name() {
        let file = create_temp_file(b"file contents").unwrap();
        let path = file.path().to_string_lossy().to_string();
        let (sink, rx, _cancel) = sink(None);
        let _writer = accept_all(rx);

        let descriptor = sink.upload("file", &path, None).await.unwrap();
        assert_eq!(descriptor.size, 13);
        assert!(descriptor.name.starts_with("uploads/file/"));
        assert!(!descriptor.name.contains("//"));
    }

    #[tokio::test]
    async fn test_upload_limits_and_errors() {
        let (sink, _rx, cancel) = sink(Some(4));
        assert!(matches!(
            sink.upload("data", "too large", None).await,
            Err(EngineError::Upload(_))
        ));
        assert!(matches!(
            sink.upload("registry", "HKLM", None).await,
            Err(EngineError::UnsupportedAccessor(_))
        ));
        assert!(matches!(
            sink.upload("file", "/non/existent/file", None).await,
            Err(EngineError::Io(_))
        ));

        cancel.cancel();
        assert!(sink.upload("data", "ok", None).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_fails_upload() {
        let (sink, rx, _cancel) = sink(None);
        drop(rx);
        assert!(sink.upload("data", "x", None).await.is_err());
    }

    #[tokio::test]
    async fn test_refused_upload_is_an_error() {
        let (sink, mut rx, _cancel) = sink(None);
        tokio::spawn(async move {
            if let Some(SourceEvent::Upload(pending)) = rx.recv().await {
                let _ = pending
                    .reply
                    .send(Err(EngineError::Upload("over budget".to_string())));
            }
        });

        let err = sink.upload("data", "x", None).await.unwrap_err();
        assert_eq!(err.to_string(), EngineError::Upload("over budget".to_string()).to_string());
    }
}
