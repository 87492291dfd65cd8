use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ZIP_CENTRAL_DIR_HEADER_SIGNATURE as CENTRAL_DIR_HEADER_SIGNATURE,
    ZIP_DATA_DESCRIPTOR_SIGNATURE as DATA_DESCRIPTOR_SIGNATURE,
    ZIP_END_OF_CENTRAL_DIR_SIGNATURE as END_OF_CENTRAL_DIR_SIGNATURE,
    ZIP_LOCAL_FILE_HEADER_SIGNATURE as LOCAL_FILE_HEADER_SIGNATURE,
};

// Re-export these constants publicly
pub use crate::constants::{
    ZIP_COMPRESSION_METHOD_DEFLATE as COMPRESSION_METHOD_DEFLATE,
    ZIP_COMPRESSION_METHOD_STORE as COMPRESSION_METHOD_STORE,
    ZIP_FILE_EXTERNAL_ATTRIBUTES as FILE_EXTERNAL_ATTRIBUTES,
    ZIP_STREAMING_BIT_FLAG as STREAMING_BIT_FLAG, ZIP_VERSION_MADE_BY as VERSION_MADE_BY,
    ZIP_VERSION_NEEDED as VERSION_NEEDED,
};

/// A finished entry, kept for the central directory.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub crc32: u32,
    pub offset: u32,
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
}

/// File options for ZIP entries
#[derive(Debug, Clone, Copy)]
pub struct FileOptions {
    pub compression_method: CompressionMethod,
    /// Stamped into the entry header; callers pass their injected clock here
    /// so identical runs produce identical archives.
    pub last_modified: DateTime<Utc>,
}

/// Compression methods
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    Stored,
    Deflated,
}

impl CompressionMethod {
    pub fn code(self) -> u16 {
        match self {
            CompressionMethod::Stored => COMPRESSION_METHOD_STORE,
            CompressionMethod::Deflated => COMPRESSION_METHOD_DEFLATE,
        }
    }
}

impl FileOptions {
    pub fn new(compression_method: CompressionMethod, last_modified: DateTime<Utc>) -> Self {
        Self {
            compression_method,
            last_modified,
        }
    }
}

/// Local file header. CRC and sizes are always zero here: the streaming bit
/// flag defers them to the data descriptor that follows the entry data.
pub struct LocalFileHeader<'a> {
    pub compression_method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub file_name: &'a [u8],
}

impl LocalFileHeader<'_> {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(LOCAL_FILE_HEADER_SIGNATURE);
        buf.put_u16_le(VERSION_NEEDED);
        buf.put_u16_le(STREAMING_BIT_FLAG);
        buf.put_u16_le(self.compression_method);
        buf.put_u16_le(self.last_mod_time);
        buf.put_u16_le(self.last_mod_date);
        // crc32, compressed size, uncompressed size
        buf.put_u32_le(0);
        buf.put_u32_le(0);
        buf.put_u32_le(0);
        buf.put_u16_le(self.file_name.len() as u16);
        // extra field length
        buf.put_u16_le(0);
        buf.put_slice(self.file_name);
    }
}

/// Trailer carrying the real CRC and sizes of a streamed entry.
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(DATA_DESCRIPTOR_SIGNATURE);
        buf.put_u32_le(self.crc32);
        buf.put_u32_le(self.compressed_size);
        buf.put_u32_le(self.uncompressed_size);
    }
}

/// Central directory header structure
pub struct CentralDirectoryHeader<'a> {
    pub entry: &'a ZipEntry,
}

impl CentralDirectoryHeader<'_> {
    pub fn encode(&self, buf: &mut BytesMut) {
        let entry = self.entry;
        buf.put_u32_le(CENTRAL_DIR_HEADER_SIGNATURE);
        buf.put_u16_le(VERSION_MADE_BY);
        buf.put_u16_le(VERSION_NEEDED);
        buf.put_u16_le(STREAMING_BIT_FLAG);
        buf.put_u16_le(entry.compression_method);
        buf.put_u16_le(entry.last_mod_time);
        buf.put_u16_le(entry.last_mod_date);
        buf.put_u32_le(entry.crc32);
        buf.put_u32_le(entry.compressed_size);
        buf.put_u32_le(entry.uncompressed_size);
        buf.put_u16_le(entry.name.len() as u16);
        // extra field length, comment length, disk number start, internal attributes
        buf.put_u16_le(0);
        buf.put_u16_le(0);
        buf.put_u16_le(0);
        buf.put_u16_le(0);
        buf.put_u32_le(FILE_EXTERNAL_ATTRIBUTES);
        buf.put_u32_le(entry.offset);
        buf.put_slice(entry.name.as_bytes());
    }
}

/// End of central directory record structure
pub struct EndOfCentralDirectoryRecord {
    pub total_entries: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
}

impl EndOfCentralDirectoryRecord {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(END_OF_CENTRAL_DIR_SIGNATURE);
        // this disk, disk holding the central directory
        buf.put_u16_le(0);
        buf.put_u16_le(0);
        buf.put_u16_le(self.total_entries);
        buf.put_u16_le(self.total_entries);
        buf.put_u32_le(self.central_dir_size);
        buf.put_u32_le(self.central_dir_offset);
        // comment length
        buf.put_u16_le(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_header_layout() {
        let mut buf = BytesMut::new();
        LocalFileHeader {
            compression_method: COMPRESSION_METHOD_DEFLATE,
            last_mod_time: 0x1234,
            last_mod_date: 0x5678,
            file_name: b"a.json",
        }
        .encode(&mut buf);

        assert_eq!(buf.len(), 30 + 6);
        assert_eq!(&buf[0..4], &LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        assert_eq!(&buf[6..8], &STREAMING_BIT_FLAG.to_le_bytes());
        assert_eq!(&buf[8..10], &8u16.to_le_bytes());
        assert_eq!(&buf[30..], b"a.json");
    }

    #[test]
    fn test_data_descriptor_layout() {
        let mut buf = BytesMut::new();
        DataDescriptor {
            crc32: 0xdeadbeef,
            compressed_size: 3,
            uncompressed_size: 5,
        }
        .encode(&mut buf);
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[4..8], &0xdeadbeefu32.to_le_bytes());
    }

    #[test]
    fn test_compression_method_serde_names() {
        assert_eq!(serde_yaml::to_string(&CompressionMethod::Stored).unwrap().trim(), "stored");
        let method: CompressionMethod = serde_yaml::from_str("deflated").unwrap();
        assert_eq!(method, CompressionMethod::Deflated);
        assert_eq!(method.code(), 8);
    }
}
