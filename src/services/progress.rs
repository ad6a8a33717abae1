//! Progress reporting service
//!
//! This module separates progress reporting concerns from business logic,
//! allowing different frontends to implement their own progress handling.
//! Reporters are shared across worker tasks, so every method takes `&self`.

use crate::batch::{BatchResult, ImageJob};

/// Receiver of batch lifecycle events
pub trait BatchProgressReporter: Send + Sync {
    /// A batch of `total` jobs is about to start
    fn batch_started(&self, total: usize);

    /// A job took a worker slot; `job.status` is `Running`
    fn job_started(&self, index: usize, job: &ImageJob);

    /// A job reached `Done` or `Failed`, reported before its slot is released
    fn job_finished(&self, index: usize, job: &ImageJob);

    /// Every job of the batch has finished
    fn batch_finished(&self, _result: &BatchResult) {}
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl BatchProgressReporter for NoOpProgressReporter {
    fn batch_started(&self, _total: usize) {}

    fn job_started(&self, _index: usize, _job: &ImageJob) {}

    fn job_finished(&self, _index: usize, _job: &ImageJob) {}
}

/// Console progress reporter that logs each job and draws a bar
#[cfg(feature = "cli")]
pub struct ConsoleProgressReporter {
    bar: indicatif::ProgressBar,
    verbose: bool,
}

#[cfg(feature = "cli")]
impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `show_bar` - Whether to draw an `indicatif` bar
    /// * `verbose` - Whether to log every job start and finish
    #[must_use]
    pub fn new(show_bar: bool, verbose: bool) -> Self {
        let bar = if show_bar {
            let bar = indicatif::ProgressBar::new(0);
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        } else {
            indicatif::ProgressBar::hidden()
        };
        Self { bar, verbose }
    }
}

#[cfg(feature = "cli")]
impl BatchProgressReporter for ConsoleProgressReporter {
    fn batch_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn job_started(&self, index: usize, job: &ImageJob) {
        if self.verbose {
            log::info!("[{}] Removing background: {}", index + 1, job.input_path);
        }
        self.bar.set_message(job.input_path.clone());
    }

    fn job_finished(&self, index: usize, job: &ImageJob) {
        match &job.error {
            Some(error) => log::error!("❌ [{}] {}: {}", index + 1, job.input_path, error),
            None if self.verbose => {
                log::info!("✅ [{}] {} -> {}", index + 1, job.input_path, job.output_path);
            },
            None => {},
        }
        self.bar.inc(1);
    }

    fn batch_finished(&self, result: &BatchResult) {
        self.bar.finish_with_message(format!(
            "Completed! Processed: {}, Failed: {}",
            result.succeeded_count, result.failed_count
        ));
    }
}
