use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_BUFFERED_UPLOAD_BYTES, DEFAULT_MAX_CONCURRENT_SOURCES, DEFAULT_ROW_BUFFER,
};
use crate::utils::streaming_zip::CompressionMethod;

/// What to bind when a `choices` argument is not one of the declared choices.
///
/// Either way an `invalid choice` warning is recorded.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChoicePolicy {
    /// Bind the supplied value unchanged
    #[default]
    PassThrough,
    /// Bind the parameter's default instead
    UseDefault,
}

/// Serialization of a source's rows inside its archive entry.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowFormat {
    /// One JSON object per line
    #[default]
    JsonLines,
    /// A single JSON array of objects
    JsonArray,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    pub choice_policy: ChoicePolicy,
    pub row_format: RowFormat,
    pub compression: CompressionMethod,
    /// Sources drained ahead of the archive writer; 1 means strictly sequential.
    pub max_concurrent_sources: usize,
    /// Rows staged per source before its producer blocks.
    pub row_buffer: usize,
    /// Uploads larger than this many bytes fail the owning source.
    pub max_upload_size: Option<u64>,
    /// Upload bytes one source may hold until its result entry is closed.
    /// Uploads past this total are refused.
    pub max_buffered_upload_bytes: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            choice_policy: ChoicePolicy::default(),
            row_format: RowFormat::default(),
            compression: CompressionMethod::Deflated,
            max_concurrent_sources: DEFAULT_MAX_CONCURRENT_SOURCES,
            row_buffer: DEFAULT_ROW_BUFFER,
            max_upload_size: None,
            max_buffered_upload_bytes: DEFAULT_MAX_BUFFERED_UPLOAD_BYTES,
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CollectorConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_sources == 0 {
            bail!("max_concurrent_sources must be at least 1");
        }
        if self.row_buffer == 0 {
            bail!("row_buffer must be at least 1");
        }
        if self.max_buffered_upload_bytes == 0 {
            bail!("max_buffered_upload_bytes must be at least 1");
        }
        Ok(())
    }
}

/// Load the configuration at `config_path`, or the defaults when no path is given.
pub fn load_or_default(config_path: Option<&Path>) -> Result<CollectorConfig> {
    match config_path {
        Some(path) => CollectorConfig::from_yaml_file(path),
        None => {
            debug!("No collector config given, using defaults");
            Ok(CollectorConfig::default())
        }
    }
}
