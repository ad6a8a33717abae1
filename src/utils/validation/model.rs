//! Model validation utilities
//!
//! Provides centralized validation for model references: the local file
//! path, the remote identifier and the optional integrity digest.

use crate::error::{BgRemovalError, Result};
use std::path::Path;

/// File extension every local model path must carry
pub const MODEL_EXTENSION: &str = "pth";

/// Validator for model-related configuration values
pub struct ModelValidator;

impl ModelValidator {
    /// Validate that a local model path ends in [`MODEL_EXTENSION`]
    ///
    /// The check is on the final path component: `u2net.pth/png` and `.pth`
    /// are rejected, `./models/u2net.pth` is accepted.
    pub fn validate_model_path(path: &Path) -> Result<()> {
        let extension = path.extension().and_then(|ext| ext.to_str());

        if extension != Some(MODEL_EXTENSION) {
            return Err(BgRemovalError::invalid_argument(format!(
                "Expected a .{} model file, but got: '{}'",
                MODEL_EXTENSION,
                path.display()
            )));
        }
        Ok(())
    }

    /// Validate a remote model identifier
    pub fn validate_remote_id(remote_id: &str) -> Result<()> {
        if remote_id.is_empty() {
            return Err(BgRemovalError::invalid_argument(
                "Remote model ID cannot be empty",
            ));
        }

        if !remote_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(BgRemovalError::invalid_argument(format!(
                "Invalid characters in remote model ID: {}",
                remote_id
            )));
        }

        Ok(())
    }

    /// Validate a hex-encoded SHA-256 digest
    pub fn validate_sha256(digest: &str) -> Result<()> {
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BgRemovalError::invalid_argument(format!(
                "Expected a 64 character hex SHA-256 digest, got: {}",
                digest
            )));
        }
        Ok(())
    }
}
