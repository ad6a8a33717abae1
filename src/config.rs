//! Configuration types for model acquisition and batch background removal

use crate::error::{BgRemovalError, Result};
use crate::utils::ModelValidator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default model file name inside the model directory
pub const DEFAULT_MODEL_FILE: &str = "u2net_human_seg.pth";

/// Default remote identifier of the model file
pub const DEFAULT_REMOTE_ID: &str = "1-Yg0cxgrNhHP-016FPdp902BR-kSsA4P";

/// Default document-export endpoint used for the two-step download
pub const DEFAULT_DOWNLOAD_ENDPOINT: &str = "https://docs.google.com/uc?export=download";

/// Default streaming chunk size for model downloads
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Seconds allowed for the TCP/TLS connection
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Seconds of silence after which a transfer counts as stalled
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Environment variable overriding the model directory
pub const MODEL_DIR_ENV: &str = "NOBG_MODEL_DIR";

/// Location of the model on disk and where to fetch it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReference {
    /// Target path of the model file; must end in `.pth`
    pub local_path: PathBuf,
    /// Identifier of the model on the remote document store
    pub remote_id: String,
    /// Optional hex SHA-256 the download must match before it is published
    #[serde(default)]
    pub sha256: Option<String>,
}

impl ModelReference {
    /// Create a model reference without an integrity digest
    pub fn new<P: Into<PathBuf>, S: Into<String>>(local_path: P, remote_id: S) -> Self {
        Self {
            local_path: local_path.into(),
            remote_id: remote_id.into(),
            sha256: None,
        }
    }

    /// Attach an expected SHA-256 digest
    #[must_use]
    pub fn with_sha256<S: Into<String>>(mut self, digest: S) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Directory holding the model file
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.local_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Model name as understood by the segmentation service (file stem)
    #[must_use]
    pub fn model_name(&self) -> String {
        self.local_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Validate path extension, remote id and digest format
    ///
    /// # Errors
    /// - `InvalidArgument` for any malformed field
    pub fn validate(&self) -> Result<()> {
        ModelValidator::validate_model_path(&self.local_path)?;
        ModelValidator::validate_remote_id(&self.remote_id)?;
        if let Some(digest) = &self.sha256 {
            ModelValidator::validate_sha256(digest)?;
        }
        Ok(())
    }

    /// Default model directory
    ///
    /// `$NOBG_MODEL_DIR` when set, otherwise `~/.u2net`.
    ///
    /// # Errors
    /// - the home directory cannot be determined and no override is set
    pub fn default_dir() -> Result<PathBuf> {
        if let Ok(dir_override) = std::env::var(MODEL_DIR_ENV) {
            return Ok(PathBuf::from(dir_override));
        }

        Ok(dirs::home_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_argument(format!(
                    "Failed to determine home directory. Set {} environment variable.",
                    MODEL_DIR_ENV
                ))
            })?
            .join(".u2net"))
    }

    /// Default model reference (`<default_dir>/u2net_human_seg.pth`)
    ///
    /// # Errors
    /// - see [`Self::default_dir`]
    pub fn default_reference() -> Result<Self> {
        Ok(Self::new(
            Self::default_dir()?.join(DEFAULT_MODEL_FILE),
            DEFAULT_REMOTE_ID,
        ))
    }
}

/// Settings for the streamed model transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Document-export endpoint; `id` and `confirm` are appended as query parameters
    pub endpoint: String,
    /// Read buffer size used while streaming to disk
    pub chunk_size: usize,
    /// Limit on establishing the connection
    pub connect_timeout: Duration,
    /// Longest silence tolerated while waiting for response headers or body
    /// bytes; a transfer that keeps making progress is never cut off
    pub idle_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_DOWNLOAD_ENDPOINT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl DownloadConfig {
    /// Validate the download settings
    ///
    /// # Errors
    /// - `InvalidArgument` for a zero chunk size, an empty endpoint or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BgRemovalError::invalid_argument(
                "Download chunk size must be greater than zero",
            ));
        }
        if self.endpoint.is_empty() {
            return Err(BgRemovalError::invalid_argument(
                "Download endpoint cannot be empty",
            ));
        }
        if self.connect_timeout.is_zero() || self.idle_timeout.is_zero() {
            return Err(BgRemovalError::invalid_argument(
                "Download timeouts must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model location and origin
    pub model: ModelReference,
    /// Download settings
    pub download: DownloadConfig,
    /// Ask the segmentation service for alpha-matting refinement
    pub alpha_matting: bool,
    /// Maximum concurrent removal jobs (0 = available parallelism)
    pub max_workers: usize,
}

impl AppConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use nobg::{AppConfig, ModelReference};
    ///
    /// let config = AppConfig::builder()
    ///     .model(ModelReference::new("./models/u2net_human_seg.pth", "abc123"))
    ///     .alpha_matting(false)
    ///     .max_workers(4)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.effective_workers(), 4);
    /// ```
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Worker count with `0` resolved to the available parallelism
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        resolve_workers(self.max_workers)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - `InvalidArgument` for a bad model reference or bad download settings
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.download.validate()
    }
}

/// Resolve a configured worker count, mapping `0` to the available parallelism
#[must_use]
pub fn resolve_workers(max_workers: usize) -> usize {
    if max_workers > 0 {
        return max_workers;
    }
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// Builder for [`AppConfig`]
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    model: Option<ModelReference>,
    download: Option<DownloadConfig>,
    alpha_matting: Option<bool>,
    max_workers: Option<usize>,
}

impl AppConfigBuilder {
    /// Set the model reference
    #[must_use]
    pub fn model(mut self, model: ModelReference) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the download settings
    #[must_use]
    pub fn download(mut self, download: DownloadConfig) -> Self {
        self.download = Some(download);
        self
    }

    /// Set the download endpoint, keeping other download settings
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        let mut download = self.download.take().unwrap_or_default();
        download.endpoint = endpoint.into();
        self.download = Some(download);
        self
    }

    /// Enable or disable alpha matting
    #[must_use]
    pub fn alpha_matting(mut self, enabled: bool) -> Self {
        self.alpha_matting = Some(enabled);
        self
    }

    /// Set the maximum number of concurrent removal jobs
    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - no model given and the default directory cannot be resolved
    /// - any error from [`AppConfig::validate`]
    pub fn build(self) -> Result<AppConfig> {
        let model = match self.model {
            Some(model) => model,
            None => ModelReference::default_reference()?,
        };

        let config = AppConfig {
            model,
            download: self.download.unwrap_or_default(),
            alpha_matting: self.alpha_matting.unwrap_or(true),
            max_workers: self.max_workers.unwrap_or(0),
        };
        config.validate()?;
        Ok(config)
    }
}
