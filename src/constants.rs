//! Global constants for the artifact collector.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Archive layout
/// Name of the manifest entry written at the end of every collection
pub const MANIFEST_ENTRY_NAME: &str = "collection_context.json";

/// Name of the rendered report entry
pub const REPORT_ENTRY_NAME: &str = "report.html";

/// Prefix under which captured uploads are stored
pub const UPLOADS_PREFIX: &str = "uploads";

/// Extension of per-source result entries
pub const RESULT_ENTRY_EXTENSION: &str = "json";

/// Report type rendered into the collection archive
pub const CLIENT_REPORT_TYPE: &str = "CLIENT";

/// Prefix of generated flow ids
pub const FLOW_ID_PREFIX: &str = "F.";

/// Default value bound to an unset `json_array` parameter
pub const EMPTY_JSON_ARRAY: &str = "[]";

// Buffer and concurrency constants
/// Buffer size for the archive file writer (1MB)
pub const ARCHIVE_BUFFER_SIZE: usize = 1024 * 1024;

/// Default number of rows staged per source before the producer blocks
pub const DEFAULT_ROW_BUFFER: usize = 256;

/// Default number of sources drained at the same time
pub const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 1;

/// Default cap on upload bytes held for one source until its entry closes (256MB)
pub const DEFAULT_MAX_BUFFERED_UPLOAD_BYTES: u64 = 256 * 1024 * 1024;

// ZIP format constants
/// ZIP local file header signature
pub const ZIP_LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;

/// ZIP data descriptor signature
pub const ZIP_DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;

/// ZIP central directory header signature
pub const ZIP_CENTRAL_DIR_HEADER_SIGNATURE: u32 = 0x02014b50;

/// ZIP end of central directory signature
pub const ZIP_END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x06054b50;

/// ZIP version needed to extract
pub const ZIP_VERSION_NEEDED: u16 = 20; // 2.0

/// ZIP version made by (UNIX + 3.0)
pub const ZIP_VERSION_MADE_BY: u16 = 0x031e;

/// ZIP compression method: deflate
pub const ZIP_COMPRESSION_METHOD_DEFLATE: u16 = 8;

/// ZIP compression method: store (no compression)
pub const ZIP_COMPRESSION_METHOD_STORE: u16 = 0;

/// ZIP bit flags: sizes and CRC follow the data (bit 3), names are UTF-8 (bit 11)
pub const ZIP_STREAMING_BIT_FLAG: u16 = 0x0008 | 0x0800;

/// Regular file, rw-r--r--, in the high word of the external attributes
pub const ZIP_FILE_EXTERNAL_ATTRIBUTES: u32 = 0o100644 << 16;

/// Largest offset or size representable without zip64
pub const ZIP_MAX_OFFSET: u64 = u32::MAX as u64;

/// Largest entry count representable without zip64
pub const ZIP_MAX_ENTRIES: usize = u16::MAX as usize;

// Error messages
pub const ERROR_COLLECTION_CLOSED: &str = "collection is no longer accepting uploads";
pub const ERROR_SOURCE_TASK_PANICKED: &str = "source task terminated unexpectedly";
pub const ERROR_COLLECTION_CANCELLED: &str = "collection cancelled";
