use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::photo::DEFAULT_MAX_ENCODED_LEN;

/// Largest raw photo upload accepted, in bytes
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workbook location
    pub store: StoreConfig,
    /// Photo limits
    pub photo: PhotoConfig,
    /// Log level, format and file
    pub logging: LoggingConfig,
}

/// Where the workbook lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one CSV file per sheet
    pub workbook_dir: String,
}

/// Photo upload and storage limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoConfig {
    /// Budget for the base64 text stored in the photo cell
    pub max_encoded_len: usize,
    /// Largest raw upload, in bytes
    pub max_upload_bytes: u64,
    /// Accepted file extensions, case-insensitive
    pub allowed_extensions: Vec<String>,
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Daily-rolled JSON log file, if any
    pub file_path: Option<String>,
    /// `json` or `text`
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                workbook_dir: "data/registros_vacas".to_string(),
            },
            photo: PhotoConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_encoded_len: DEFAULT_MAX_ENCODED_LEN,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from multiple sources with precedence:
    /// defaults, `config/default`, `config/local`, `extra_file`, then
    /// `HERD_LEDGER__*` environment variables.
    pub fn load_from(extra_file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).context("Failed to serialize default configuration")?;

        let mut builder = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("HERD_LEDGER").separator("__"))
            .build()
            .context("Failed to load configuration")?;

        let app_config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.store.workbook_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("workbook_dir cannot be empty"));
        }

        if self.photo.max_encoded_len == 0 {
            return Err(anyhow::anyhow!("max_encoded_len must be greater than 0"));
        }
        if self.photo.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("max_upload_bytes must be greater than 0"));
        }
        if self.photo.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("allowed_extensions cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Workbook directory as a path
    #[must_use]
    pub fn workbook_path(&self) -> PathBuf {
        PathBuf::from(&self.store.workbook_dir)
    }
}
