//! Segmentation service abstraction
//!
//! The neural network itself lives outside this crate. Anything that turns
//! encoded image bytes into an encoded image with an alpha channel can back
//! [`SegmentationService`].

use crate::{config::ModelReference, error::Result};

/// Trait for external background-segmentation services
pub trait SegmentationService: Send + Sync {
    /// Human-readable service name for logs
    fn name(&self) -> &str;

    /// One-time warm-up run before the first batch
    ///
    /// Slow imports or runtime probing belong here; it runs on a worker
    /// thread while the shell stays responsive.
    ///
    /// # Errors
    /// - the service cannot be started
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Remove the background of one encoded image
    ///
    /// Returns an encoded image with an alpha channel. Called concurrently
    /// from several worker threads; `model` is only read.
    ///
    /// # Errors
    /// - model invocation failures
    fn remove(&self, image: &[u8], alpha_matting: bool, model: &ModelReference)
        -> Result<Vec<u8>>;
}
