//! Error types for background removal operations

use std::path::Path;
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types for model acquisition and batch background removal
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Image path with a missing or unsupported extension, or not valid UTF-8
    #[error("Invalid image path: {0}")]
    InvalidPath(String),

    /// Bad configuration value (wrong model file extension, zero chunk size, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Network or storage failure while fetching the model
    #[error("Download error: {0}")]
    Download(String),

    /// Decode, encode or segmentation failure for a single image
    #[error("Removal error: {0}")]
    Removal(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A batch or a download is already running
    #[error("Busy: {0}")]
    Busy(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new invalid path error
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        Self::Download(msg.into())
    }

    /// Create a new removal error
    pub fn removal<S: Into<String>>(msg: S) -> Self {
        Self::Removal(msg.into())
    }

    /// Create a new busy error
    pub fn busy<S: Into<String>>(msg: S) -> Self {
        Self::Busy(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create a download error carrying the underlying network cause
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Download(format!("{}: {}", context.into(), error))
    }

    /// Create removal error with stage context
    pub fn removal_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Removal(format!(
            "Removal failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether this error was raised by model acquisition
    #[must_use]
    pub fn is_download(&self) -> bool {
        matches!(self, Self::Download(_))
    }

    /// Whether this error is a validation failure raised before any work began
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidPath(_) | Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BgRemovalError::invalid_path("cat");
        assert!(matches!(err, BgRemovalError::InvalidPath(_)));
        assert!(err.is_validation());

        let err = BgRemovalError::invalid_argument("model.txt");
        assert!(matches!(err, BgRemovalError::InvalidArgument(_)));
        assert!(err.is_validation());

        let err = BgRemovalError::download("connection reset");
        assert!(err.is_download());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_error_display() {
        let err = BgRemovalError::invalid_argument("Expected a .pth model file");
        assert_eq!(err.to_string(), "Invalid argument: Expected a .pth model file");
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BgRemovalError::file_io_error("write output", Path::new("/tmp/a_NO_BG.jpg"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write output"));
        assert!(error_string.contains("/tmp/a_NO_BG.jpg"));

        let err = BgRemovalError::network_error("Failed to fetch model", "HTTP 404");
        assert!(err.is_download());
        assert!(err.to_string().contains("HTTP 404"));

        let err = BgRemovalError::removal_stage_error("decode", "bad header", Some("b.jpg"));
        let error_string = err.to_string();
        assert!(error_string.contains("decode"));
        assert!(error_string.contains("b.jpg"));
    }
}
