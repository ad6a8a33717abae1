//! Model acquisition
//!
//! [`ModelStore`] checks for the model file and, when missing, streams it from
//! the document-export endpoint into a staging file next to the target. The
//! staging file is only renamed onto the final path once every byte is on
//! disk (and the optional SHA-256 matches), so a concurrent [`ModelStore::exists`]
//! never sees a partial model.

use crate::config::{DownloadConfig, ModelReference};
use crate::error::{BgRemovalError, Result};
use crate::utils::ModelValidator;
use futures_util::stream::TryStreamExt;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Download progress information
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// File being downloaded
    pub file_name: String,
    /// Bytes downloaded
    pub downloaded: u64,
    /// Total file size (if known)
    pub total: Option<u64>,
    /// Download completed
    pub completed: bool,
}

/// Callback receiving download progress
pub type ProgressCallback = dyn Fn(&DownloadProgress) + Send + Sync;

/// Local model storage with one-shot remote acquisition
#[derive(Debug, Clone)]
pub struct ModelStore {
    client: Client,
    config: DownloadConfig,
}

impl ModelStore {
    /// Create a new model store
    ///
    /// The client carries no whole-request deadline: only connecting and
    /// each wait for the next bytes are bounded.
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Invalid download settings
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, config })
    }

    /// Download settings in use
    #[must_use]
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Check whether the model file is present
    ///
    /// # Errors
    /// - `InvalidArgument` when `local_path` does not end in `.pth`
    pub fn exists(model: &ModelReference) -> Result<bool> {
        ModelValidator::validate_model_path(&model.local_path)?;
        Ok(model.local_path.is_file())
    }

    /// Make sure the model file is present, downloading it if needed
    ///
    /// Returns immediately without touching the network when the file already
    /// exists. Otherwise performs exactly one download attempt; there is no
    /// retry.
    ///
    /// # Errors
    /// - `InvalidArgument` for a malformed model reference
    /// - `Download` for network failures, non-200 responses, write failures or
    ///   a digest mismatch
    pub async fn ensure(
        &self,
        model: &ModelReference,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        model.validate()?;

        if Self::exists(model)? {
            log::info!("Model already present: {}", model.local_path.display());
            return Ok(());
        }

        log::info!(
            "Downloading model {} -> {}",
            model.remote_id,
            model.local_path.display()
        );

        let directory = model.directory();
        if !directory.as_os_str().is_empty() {
            fs::create_dir_all(directory).map_err(|e| {
                BgRemovalError::download(format!(
                    "Failed to create model directory '{}': {}",
                    directory.display(),
                    e
                ))
            })?;
        }

        // Staged in the target directory so the final rename stays on one filesystem
        let staging = tempfile::Builder::new()
            .prefix(".nobg-download-")
            .suffix(".part")
            .tempfile_in(if directory.as_os_str().is_empty() {
                Path::new(".")
            } else {
                directory
            })
            .map_err(|e| {
                BgRemovalError::download(format!("Failed to create staging file: {}", e))
            })?;
        let (std_file, staging_path) = staging.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let file_name = model
            .local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let digest = self
            .transfer(&model.remote_id, &mut file, &file_name, on_progress)
            .await?;
        drop(file);

        if let Some(expected) = &model.sha256 {
            if !digest.eq_ignore_ascii_case(expected) {
                log::warn!(
                    "Model integrity check failed: expected {}, got {}",
                    expected,
                    digest
                );
                return Err(BgRemovalError::download(format!(
                    "SHA-256 mismatch for {}: expected {}, got {}",
                    model.local_path.display(),
                    expected,
                    digest
                )));
            }
        }

        staging_path.persist(&model.local_path).map_err(|e| {
            BgRemovalError::download(format!(
                "Failed to move downloaded model to '{}': {}",
                model.local_path.display(),
                e
            ))
        })?;

        log::info!("Model ready: {}", model.local_path.display());
        Ok(())
    }

    /// Build the request URL for one step of the two-step confirm pattern
    fn request(&self, remote_id: &str, confirm: bool) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(&self.config.endpoint)
            .query(&[("id", remote_id)]);
        if confirm {
            request.query(&[("confirm", "t")])
        } else {
            request
        }
    }

    /// Await one network step, failing once the peer has been silent for the idle timeout
    async fn within_idle<T>(&self, step: impl std::future::Future<Output = T>) -> Result<T> {
        let idle = self.config.idle_timeout;
        tokio::time::timeout(idle, step)
            .await
            .map_err(|_| BgRemovalError::download(format!("Download stalled: no data for {:?}", idle)))
    }

    /// Stream the remote file into `file`, returning the hex SHA-256 of the body
    async fn transfer(
        &self,
        remote_id: &str,
        file: &mut tokio::fs::File,
        file_name: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<String> {
        // The first response may be the interstitial warning page; only the
        // confirmed request carries the payload.
        let warning = self
            .within_idle(self.request(remote_id, false).send())
            .await?
            .map_err(|e| BgRemovalError::network_error("Failed to reach model endpoint", e))?;
        drop(warning);

        let response = self
            .within_idle(self.request(remote_id, true).send())
            .await?
            .map_err(|e| BgRemovalError::network_error("Failed to download model", e))?;

        if response.status() != StatusCode::OK {
            return Err(BgRemovalError::download(format!(
                "HTTP error {} for model {}",
                response.status(),
                remote_id
            )));
        }

        let total = response.content_length();

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .try_filter(|chunk| futures::future::ready(!chunk.is_empty()))
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut buffer = vec![0; self.config.chunk_size];

        loop {
            let bytes_read = self
                .within_idle(stream.read(&mut buffer))
                .await?
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            let chunk = buffer.get(..bytes_read).unwrap_or_default();
            file.write_all(chunk)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to write model data", e))?;
            hasher.update(chunk);
            downloaded += bytes_read as u64;

            if let Some(callback) = on_progress {
                callback(&DownloadProgress {
                    file_name: file_name.to_string(),
                    downloaded,
                    total,
                    completed: false,
                });
            }
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to flush model data", e))?;
        file.sync_all()
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to sync model data", e))?;

        if let Some(callback) = on_progress {
            callback(&DownloadProgress {
                file_name: file_name.to_string(),
                downloaded,
                total,
                completed: true,
            });
        }

        log::debug!("Downloaded {} bytes for {}", downloaded, file_name);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
