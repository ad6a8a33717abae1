//! Batch background removal
//!
//! [`BatchJobCoordinator`] fans one removal job per input path out over a
//! bounded pool of blocking worker threads and waits for all of them. It is a
//! barrier: a failing or slow image never stops its siblings, and the result
//! lists jobs in input order whatever order they finished in. Reporters hear
//! about each job as it starts and ends, not at the barrier.

use crate::{
    config::{resolve_workers, ModelReference},
    error::{BgRemovalError, Result},
    processor::BackgroundRemover,
    services::{BatchProgressReporter, NoOpProgressReporter},
    utils::ImagePathResolver,
};
use futures::future::join_all;
use instant::Instant;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

/// Lifecycle state of one image job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    /// Accepted into the batch, not started
    Pending,
    /// Holding a worker slot; this is the state `BatchProgressReporter::job_started` sees
    Running,
    /// Output written
    Done,
    /// Removal failed; see `ImageJob::error`
    Failed,
}

/// One image of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageJob {
    /// Normalized input path
    pub input_path: String,
    /// Derived output path
    pub output_path: String,
    /// Current status
    pub status: JobStatus,
    /// Failure description when `status` is `Failed`
    pub error: Option<String>,
    /// Wall time spent in removal
    pub elapsed_ms: Option<u64>,
}

impl ImageJob {
    /// Create a pending job for a validated input path
    ///
    /// # Errors
    /// - `InvalidPath` when the extension is not accepted
    pub fn new(path: &str) -> Result<Self> {
        let paths = ImagePathResolver::derive_output_path(path)?;
        Ok(Self {
            input_path: paths.input,
            output_path: paths.output,
            status: JobStatus::Pending,
            error: None,
            elapsed_ms: None,
        })
    }

    fn finish(&mut self, outcome: Result<()>, elapsed_ms: u64) {
        self.elapsed_ms = Some(elapsed_ms);
        match outcome {
            Ok(()) => self.status = JobStatus::Done,
            Err(error) => {
                self.status = JobStatus::Failed;
                self.error = Some(error.to_string());
            },
        }
    }
}

/// Outcome of one batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Jobs in input order
    pub jobs: Vec<ImageJob>,
    /// Jobs that ended `Done`
    pub succeeded_count: usize,
    /// Jobs that ended `Failed`
    pub failed_count: usize,
}

impl BatchResult {
    /// Build a result, counting outcomes from the job statuses
    #[must_use]
    pub fn from_jobs(jobs: Vec<ImageJob>) -> Self {
        let succeeded_count = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Done)
            .count();
        let failed_count = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
            .count();
        Self {
            jobs,
            succeeded_count,
            failed_count,
        }
    }

    /// Whether no job failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count == 0
    }

    /// Jobs that ended `Failed`
    pub fn failed_jobs(&self) -> impl Iterator<Item = &ImageJob> {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
    }

    /// One-line summary for the final notification
    #[must_use]
    pub fn summary(&self) -> String {
        if self.jobs.is_empty() {
            return "No images were selected.".to_string();
        }
        if self.is_success() {
            return format!(
                "All backgrounds were successfully removed ({} image(s)).",
                self.succeeded_count
            );
        }
        let failed: Vec<&str> = self.failed_jobs().map(|job| job.input_path.as_str()).collect();
        format!(
            "Removed {} background(s); {} failed: {}",
            self.succeeded_count,
            self.failed_count,
            failed.join(", ")
        )
    }
}

/// Runs batches of removal jobs on a bounded worker pool
#[derive(Clone)]
pub struct BatchJobCoordinator {
    remover: BackgroundRemover,
    max_workers: usize,
    reporter: Arc<dyn BatchProgressReporter>,
}

impl std::fmt::Debug for BatchJobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchJobCoordinator")
            .field("remover", &self.remover)
            .field("max_workers", &self.max_workers)
            .finish_non_exhaustive()
    }
}

impl BatchJobCoordinator {
    /// Create a coordinator running at most `max_workers` jobs at once
    /// (`0` = available parallelism)
    pub fn new(remover: BackgroundRemover, max_workers: usize) -> Self {
        Self {
            remover,
            max_workers: resolve_workers(max_workers),
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    /// Attach a progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn BatchProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Effective concurrency ceiling
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Build the job list: validate every path and drop repeated inputs
    ///
    /// # Errors
    /// - `InvalidPath` for the first path with an unaccepted extension
    pub fn plan<S: AsRef<str>>(paths: &[S]) -> Result<Vec<ImageJob>> {
        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(paths.len());

        for path in paths {
            let job = ImageJob::new(path.as_ref())?;
            if seen.insert(job.input_path.clone()) {
                jobs.push(job);
            } else {
                warn!(input = %job.input_path, "Ignoring image that is already selected");
            }
        }

        Ok(jobs)
    }

    /// Remove the background of every image in `paths`
    ///
    /// All paths are validated before any job starts. Per-image failures are
    /// recorded in the returned jobs and never abort the batch.
    ///
    /// # Errors
    /// - `InvalidPath` when any path is rejected; nothing has run at that point
    pub async fn run<S: AsRef<str>>(
        &self,
        paths: &[S],
        model: &ModelReference,
        alpha_matting: bool,
    ) -> Result<BatchResult> {
        let mut jobs = Self::plan(paths)?;
        if jobs.is_empty() {
            return Ok(BatchResult::from_jobs(jobs));
        }

        let batch_start = Instant::now();
        info!(
            jobs = jobs.len(),
            workers = self.max_workers,
            "Starting background removal batch"
        );
        self.reporter.batch_started(jobs.len());

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let model = Arc::new(model.clone());

        let handles: Vec<_> = jobs
            .iter()
            .enumerate()
            .map(|(index, planned)| {
                let semaphore = Arc::clone(&semaphore);
                let remover = self.remover.clone();
                let reporter = Arc::clone(&self.reporter);
                let model = Arc::clone(&model);
                let mut job = planned.clone();
                let span = tracing::info_span!("image_job", index, input = %job.input_path);

                tokio::spawn(
                    async move {
                        // The slot stays taken until the outcome has been reported
                        let _permit = match semaphore.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(e) => {
                                job.finish(
                                    Err(BgRemovalError::internal(format!("Worker pool closed: {}", e))),
                                    0,
                                );
                                reporter.job_finished(index, &job);
                                return job;
                            },
                        };

                        job.status = JobStatus::Running;
                        reporter.job_started(index, &job);

                        let started = Instant::now();
                        let input_path = job.input_path.clone();
                        let outcome = tokio::task::spawn_blocking(move || {
                            remover.remove(&input_path, &model, alpha_matting).map(|_| ())
                        })
                        .await
                        .map_err(|e| BgRemovalError::internal(format!("Removal task failed: {}", e)))
                        .and_then(|outcome| outcome);

                        job.finish(outcome, started.elapsed().as_millis() as u64);
                        reporter.job_finished(index, &job);
                        job
                    }
                    .instrument(span),
                )
            })
            .collect();

        for (index, (job, joined)) in jobs.iter_mut().zip(join_all(handles).await).enumerate() {
            match joined {
                Ok(finished) => *job = finished,
                Err(join_error) => {
                    job.finish(
                        Err(BgRemovalError::internal(format!("Removal task failed: {}", join_error))),
                        0,
                    );
                    self.reporter.job_finished(index, job);
                },
            }
        }

        let result = BatchResult::from_jobs(jobs);
        info!(
            succeeded = result.succeeded_count,
            failed = result.failed_count,
            elapsed_ms = batch_start.elapsed().as_millis() as u64,
            "Batch finished"
        );
        self.reporter.batch_finished(&result);
        Ok(result)
    }
}
