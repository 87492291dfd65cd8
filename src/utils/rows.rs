//! Serialization of a source's rows into its result entry.

use crate::config::RowFormat;
use crate::models::Record;

/// Incremental encoder for one result entry.
///
/// `begin`, then `encode` per row, then `end`; the concatenated output is
/// the entry content.
#[derive(Debug)]
pub struct RowEncoder {
    format: RowFormat,
    rows: u64,
}

impl RowEncoder {
    pub fn new(format: RowFormat) -> Self {
        Self { format, rows: 0 }
    }

    pub fn begin(&self) -> &'static [u8] {
        match self.format {
            RowFormat::JsonLines => b"",
            RowFormat::JsonArray => b"[",
        }
    }

    pub fn encode(&mut self, record: &Record) -> serde_json::Result<Vec<u8>> {
        let json = serde_json::to_vec(record)?;
        let mut out = Vec::with_capacity(json.len() + 2);
        match self.format {
            RowFormat::JsonLines => {
                out.extend_from_slice(&json);
                out.push(b'\n');
            }
            RowFormat::JsonArray => {
                out.extend_from_slice(if self.rows == 0 { b"\n" } else { b",\n" });
                out.extend_from_slice(&json);
            }
        }
        self.rows += 1;
        Ok(out)
    }

    pub fn end(&self) -> &'static [u8] {
        match self.format {
            RowFormat::JsonLines => b"",
            RowFormat::JsonArray if self.rows == 0 => b"]\n",
            RowFormat::JsonArray => b"\n]\n",
        }
    }

    /// Rows encoded so far
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
