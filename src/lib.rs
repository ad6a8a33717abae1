#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # nobg
//!
//! Batch background removal with white-background flattening.
//!
//! The segmentation network itself runs outside this crate behind the
//! [`SegmentationService`] trait. `nobg` takes care of everything around it:
//! fetching the model file once, validating image paths, fanning removal jobs
//! out over a bounded worker pool and writing `<stem>_NO_BG.<ext>` next to
//! every input with transparency flattened onto white.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nobg::{AppConfig, AppContext, CommandSegmentationService, ModelReference};
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = AppConfig::builder()
//!     .model(ModelReference::default_reference()?)
//!     .max_workers(4)
//!     .build()?;
//!
//! let context = AppContext::new(config, Arc::new(CommandSegmentationService::default()))?;
//! context.ensure_model(None)?;
//!
//! let result = context.run_batch(&["photos/a.jpg", "photos/b.png"])?;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): the `nobg` binary, console progress and tracing setup
//! - `tracing-json`: JSON log output for the binary

pub mod backends;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod inference;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod utils;

use std::sync::Arc;

// Public API exports
pub use backends::{CommandSegmentationService, MockSegmentationService};
pub use batch::{BatchJobCoordinator, BatchResult, ImageJob, JobStatus};
pub use config::{AppConfig, AppConfigBuilder, DownloadConfig, ModelReference};
pub use context::AppContext;
pub use download::{DownloadProgress, ModelStore, ProgressCallback};
pub use error::{BgRemovalError, Result};
pub use inference::SegmentationService;
pub use processor::BackgroundRemover;
pub use services::{
    BatchProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
};
pub use utils::{ImagePathResolver, ModelValidator, ResolvedPaths};

#[cfg(feature = "cli")]
pub use services::ConsoleProgressReporter;
#[cfg(feature = "cli")]
pub use tracing_config::{
    cli_tracing_config, init_cli_tracing, spans, TracingConfig, TracingFormat,
};

/// Remove the backgrounds of `paths` with a one-off coordinator
///
/// Convenience for async callers that manage their own runtime. The model
/// file must already exist; nothing is downloaded here.
///
/// # Examples
/// ```rust,no_run
/// use nobg::{remove_backgrounds, AppConfig, CommandSegmentationService, ModelReference};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = AppConfig::builder()
///     .model(ModelReference::default_reference()?)
///     .build()?;
/// let service = Arc::new(CommandSegmentationService::default());
/// let result = remove_backgrounds(&["input.jpg"], &config, service).await?;
/// assert!(result.is_success());
/// # Ok(())
/// # }
/// ```
pub async fn remove_backgrounds<S: AsRef<str>>(
    paths: &[S],
    config: &AppConfig,
    service: Arc<dyn SegmentationService>,
) -> Result<BatchResult> {
    config.validate()?;
    let coordinator = BatchJobCoordinator::new(BackgroundRemover::new(service), config.max_workers);
    coordinator
        .run(paths, &config.model, config.alpha_matting)
        .await
}
