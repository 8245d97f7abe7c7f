//! # Configuration Management
//!
//! This module handles loading the service configuration from multiple sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml, optional)
//! - Environment variables (with APP_ prefix)
//! - `HOST`/`PORT` as used by deployment platforms
//!
//! The configuration is loaded once at startup and shared read-only afterwards.
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: the same structs are deserialized from TOML/env and serialized
//!   back for the `/api/v1/config` endpoint
//! - **Builder pattern**: `config::Config::builder()` stacks the sources
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT`
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_RECOGNITION__LANGUAGE`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use crate::transcription::RecognitionConfig;
use anyhow::{anyhow, Result};
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Largest accepted request body: 16 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Placeholder shown instead of secrets.
const REDACTED: &str = "***";

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each section belongs to one layer: `server` to the HTTP shell, `upload` to
/// the transport limits and the pipeline's scratch space, `recognition` to the
/// transcription client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub recognition: RecognitionConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: only accept connections from localhost
/// - `host = "0.0.0.0"`: accept connections from any address (default)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upload limits and scratch directory.
///
/// ## Fields:
/// - `max_body_bytes`: requests above this size get 413 "file too large"
/// - `temp_dir`: where uploads and converted files live while a request runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_body_bytes: usize,
    pub temp_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            upload: UploadConfig {
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                temp_dir: env::temp_dir(),
            },
            recognition: RecognitionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: override server port
    /// - `APP_UPLOAD__TEMP_DIR=/var/tmp/stt`: override the scratch directory
    /// - `APP_RECOGNITION__LANGUAGE=en-US`: override the recognition locale
    /// - `PORT=3000`: special case for deployment platforms
    ///
    /// Sections and keys are separated by a double underscore because keys
    /// themselves contain single underscores.
    pub fn load() -> Result<Self> {
        let mut settings = Self::base_builder()?
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Defaults as the lowest-priority source.
    fn base_builder() -> Result<ConfigBuilder<DefaultState>> {
        Ok(config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?))
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The body limit allows at least one byte
    /// - The temp directory is named
    /// - Recognition settings (see [`RecognitionConfig::validate`])
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.upload.max_body_bytes == 0 {
            return Err(anyhow!("Upload body limit must be greater than 0"));
        }

        if self.upload.temp_dir.as_os_str().is_empty() {
            return Err(anyhow!("Upload temp directory cannot be empty"));
        }

        self.recognition.validate()?;

        Ok(())
    }

    /// Copy safe to show to callers: secrets replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.recognition.api_key.is_empty() {
            config.recognition.api_key = REDACTED.to_string();
        }
        config
    }
}
