//! Utility functions for packaging collection output.
//!
//! ## Components
//!
//! - **Archive**: the single-writer collection archive
//! - **Rows**: JSON serialization of a source's rows
//! - **Hashing**: SHA-256 of captured uploads
//! - **Streaming ZIP**: the zip container format, written without seeking
//!
//! ## Writing an Archive
//!
//! ```no_run
//! use artifact_collector::utils::archive::ArchiveWriter;
//! use artifact_collector::utils::streaming_zip::CompressionMethod;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), artifact_collector::errors::CollectorError> {
//! let mut archive = ArchiveWriter::open(
//!     Path::new("/tmp/collection.zip"),
//!     CompressionMethod::Deflated,
//!     chrono::Utc::now(),
//! )
//! .await?;
//! archive.write_entry("Generic.Client.Info.json", b"{\"Hostname\":\"ws01\"}\n").await?;
//! archive.close().await?;
//! # Ok(())
//! # }
//! ```

/// Collection archive writer
pub mod archive;

/// Cryptographic hash calculation utilities
pub mod hash;

/// Row serialization for result entries
pub mod rows;

/// Streaming ZIP archive creation for large collections
pub mod streaming_zip;
