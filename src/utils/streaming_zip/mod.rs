// Re-export all items from the submodules
mod formats;
mod helpers;
mod writer;

// Re-export the main types and functions
pub use formats::{CompressionMethod, FileOptions, ZipEntry};
pub use helpers::dos_time;
pub use writer::StreamingZipWriter;
