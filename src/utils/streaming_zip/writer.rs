use std::io;

use async_compression::tokio::write::DeflateEncoder;
use bytes::BytesMut;
use crc32fast::Hasher;
use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::constants::{ZIP_MAX_ENTRIES, ZIP_MAX_OFFSET};
use crate::utils::streaming_zip::formats::{
    CentralDirectoryHeader, CompressionMethod, DataDescriptor, EndOfCentralDirectoryRecord,
    FileOptions, LocalFileHeader, ZipEntry,
};
use crate::utils::streaming_zip::helpers::dos_time;

/// Streaming ZIP writer that creates ZIP archives directly to an output stream.
///
/// Entries are written strictly one after another without seeking: each
/// local header is followed by the entry data and a data descriptor carrying
/// the CRC32 and sizes, and the central directory is written by
/// [`finish`](Self::finish). Deflated data passes through a small in-memory
/// staging buffer, so memory use does not depend on entry size.
///
/// Zip64 is not supported; entries, offsets and entry counts beyond the
/// classic limits fail with `InvalidInput`.
pub struct StreamingZipWriter<W: AsyncWrite + Unpin> {
    writer: W,
    entries: Vec<ZipEntry>,
    offset: u64,
    current: Option<OpenEntry>,
}

struct OpenEntry {
    name: String,
    offset: u32,
    compression_method: u16,
    last_mod_time: u16,
    last_mod_date: u16,
    crc32: Hasher,
    uncompressed_size: u64,
    compressed_size: u64,
    encoder: Option<DeflateEncoder<Vec<u8>>>,
}

fn too_large(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{} exceeds the zip limit (zip64 is not supported)", what),
    )
}

fn to_u32(value: u64, what: &str) -> io::Result<u32> {
    if value > ZIP_MAX_OFFSET {
        return Err(too_large(what));
    }
    Ok(value as u32)
}

impl<W: AsyncWrite + Unpin> StreamingZipWriter<W> {
    /// Create a new streaming ZIP writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            entries: Vec::new(),
            offset: 0,
            current: None,
        }
    }

    /// Bytes written so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Entries finished so far
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn has_open_entry(&self) -> bool {
        self.current.is_some()
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Start a new file entry. Any entry still open is an error.
    pub async fn start_file(&mut self, name: &str, options: FileOptions) -> io::Result<()> {
        if self.current.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "previous zip entry is still open",
            ));
        }
        if name.len() > u16::MAX as usize {
            return Err(too_large("entry name"));
        }
        if self.entries.len() >= ZIP_MAX_ENTRIES {
            return Err(too_large("entry count"));
        }
        let entry_offset = to_u32(self.offset, "archive offset")?;

        let compression_method = options.compression_method.code();
        let (last_mod_time, last_mod_date) = dos_time(options.last_modified);

        let mut header = BytesMut::new();
        LocalFileHeader {
            compression_method,
            last_mod_time,
            last_mod_date,
            file_name: name.as_bytes(),
        }
        .encode(&mut header);
        self.write_raw(&header).await?;

        let encoder = match options.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflated => Some(DeflateEncoder::new(Vec::new())),
        };

        self.current = Some(OpenEntry {
            name: name.to_string(),
            offset: entry_offset,
            compression_method,
            last_mod_time,
            last_mod_date,
            crc32: Hasher::new(),
            uncompressed_size: 0,
            compressed_size: 0,
            encoder,
        });
        Ok(())
    }

    /// Append data to the open entry
    pub async fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        let Self {
            writer,
            offset,
            current,
            ..
        } = self;
        let entry = current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no zip entry is open"))?;

        entry.crc32.update(data);
        entry.uncompressed_size += data.len() as u64;

        let written = match entry.encoder.as_mut() {
            Some(encoder) => {
                encoder.write_all(data).await?;
                let compressed = std::mem::take(encoder.get_mut());
                writer.write_all(&compressed).await?;
                compressed.len() as u64
            }
            None => {
                writer.write_all(data).await?;
                data.len() as u64
            }
        };
        entry.compressed_size += written;
        *offset += written;
        Ok(())
    }

    /// Finish the open entry: flush the compressor, write the data
    /// descriptor and record the entry for the central directory.
    pub async fn finish_file(&mut self) -> io::Result<()> {
        let Some(mut entry) = self.current.take() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no zip entry is open",
            ));
        };

        if let Some(mut encoder) = entry.encoder.take() {
            encoder.shutdown().await?;
            let tail = encoder.into_inner();
            self.write_raw(&tail).await?;
            entry.compressed_size += tail.len() as u64;
        }

        let finished = ZipEntry {
            name: entry.name,
            compressed_size: to_u32(entry.compressed_size, "compressed entry size")?,
            uncompressed_size: to_u32(entry.uncompressed_size, "entry size")?,
            crc32: entry.crc32.finalize(),
            offset: entry.offset,
            compression_method: entry.compression_method,
            last_mod_time: entry.last_mod_time,
            last_mod_date: entry.last_mod_date,
        };

        let mut descriptor = BytesMut::new();
        DataDescriptor {
            crc32: finished.crc32,
            compressed_size: finished.compressed_size,
            uncompressed_size: finished.uncompressed_size,
        }
        .encode(&mut descriptor);
        self.write_raw(&descriptor).await?;

        debug!(
            "Finished zip entry {} ({} bytes, {} stored)",
            finished.name, finished.uncompressed_size, finished.compressed_size
        );
        self.entries.push(finished);
        Ok(())
    }

    /// Write a whole entry at once
    pub async fn add_file(&mut self, name: &str, options: FileOptions, data: &[u8]) -> io::Result<()> {
        self.start_file(name, options).await?;
        self.write_data(data).await?;
        self.finish_file().await
    }

    /// Finish the ZIP file. An entry left open is finished first so its data
    /// stays readable.
    pub async fn finish(mut self) -> io::Result<W> {
        if self.current.is_some() {
            self.finish_file().await?;
        }

        let central_dir_offset = to_u32(self.offset, "central directory offset")?;
        let mut directory = BytesMut::new();
        for entry in &self.entries {
            CentralDirectoryHeader { entry }.encode(&mut directory);
        }
        let central_dir_size = to_u32(directory.len() as u64, "central directory size")?;

        EndOfCentralDirectoryRecord {
            total_entries: self.entries.len() as u16,
            central_dir_size,
            central_dir_offset,
        }
        .encode(&mut directory);
        self.write_raw(&directory).await?;
        self.writer.flush().await?;

        Ok(self.writer)
    }
}
