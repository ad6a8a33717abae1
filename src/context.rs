//! Application context for shells
//!
//! [`AppContext`] is built once at startup and handed to the shell. It owns
//! the async runtime and every collaborator, and exposes a blocking API so a
//! single-threaded shell can drive downloads and batches without touching
//! async code. The segmentation service warms up on a worker thread from the
//! moment the context exists; batches wait for it.

use crate::{
    batch::{BatchJobCoordinator, BatchResult},
    config::AppConfig,
    download::{ModelStore, ProgressCallback},
    error::{BgRemovalError, Result},
    inference::SegmentationService,
    processor::BackgroundRemover,
    services::BatchProgressReporter,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;

/// Outcome of the one-time service warm-up; `None` while it is still running
type Readiness = Option<std::result::Result<(), String>>;

/// Clears the in-flight flag when a download or batch ends
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Dependency container shared by the shell
///
/// All methods block the calling thread and must not be called from inside
/// an async context.
pub struct AppContext {
    runtime: Runtime,
    config: AppConfig,
    store: ModelStore,
    coordinator: BatchJobCoordinator,
    readiness: watch::Receiver<Readiness>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build the context and start warming up the segmentation service
    ///
    /// # Errors
    /// - `InvalidArgument` for an invalid configuration
    /// - `Internal` when the runtime cannot be created
    /// - any error from [`ModelStore::new`]
    pub fn new(config: AppConfig, service: Arc<dyn SegmentationService>) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("nobg-worker")
            .build()
            .map_err(|e| BgRemovalError::internal(format!("Failed to start runtime: {}", e)))?;

        let store = ModelStore::new(config.download.clone())?;
        let coordinator = BatchJobCoordinator::new(
            BackgroundRemover::new(Arc::clone(&service)),
            config.max_workers,
        );

        let (ready_tx, readiness) = watch::channel(None);
        runtime.spawn(async move {
            let warmup = tokio::task::spawn_blocking(move || {
                let _span = tracing::info_span!("service_initialize", service = %service.name()).entered();
                service.initialize()
            });
            let state = match warmup.await {
                Ok(Ok(())) => {
                    tracing::info!("Segmentation service ready");
                    Ok(())
                },
                Ok(Err(error)) => Err(error.to_string()),
                Err(join_error) => Err(format!("warm-up task failed: {}", join_error)),
            };
            ready_tx.send_replace(Some(state));
        });

        Ok(Self {
            runtime,
            config,
            store,
            coordinator,
            readiness,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Replace the batch progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn BatchProgressReporter>) -> Self {
        self.coordinator = self.coordinator.with_reporter(reporter);
        self
    }

    /// Configuration the context was built with
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Model store in use
    #[must_use]
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Batch coordinator in use
    #[must_use]
    pub fn coordinator(&self) -> &BatchJobCoordinator {
        &self.coordinator
    }

    /// Whether the configured model file is present
    ///
    /// # Errors
    /// - `InvalidArgument` when the model path has the wrong extension
    pub fn model_exists(&self) -> Result<bool> {
        ModelStore::exists(&self.config.model)
    }

    /// Download the model unless it is already present
    ///
    /// # Errors
    /// - `Busy` while a batch or another download is running
    /// - any error from [`ModelStore::ensure`]
    pub fn ensure_model(&self, on_progress: Option<&ProgressCallback>) -> Result<()> {
        let _guard = self.begin("model download")?;
        self.runtime
            .block_on(self.store.ensure(&self.config.model, on_progress))
    }

    /// Whether the segmentation service finished warming up successfully
    ///
    /// Never blocks, even while another thread sits in [`Self::wait_until_ready`].
    pub fn is_ready(&self) -> bool {
        matches!(*self.readiness.borrow(), Some(Ok(())))
    }

    /// Block until the segmentation service has warmed up
    ///
    /// # Errors
    /// - `Removal` when warm-up failed; the failure is remembered
    /// - `Internal` when the warm-up task vanished without reporting
    pub fn wait_until_ready(&self) -> Result<()> {
        let mut readiness = self.readiness.clone();
        let state = self.runtime.block_on(async move {
            let settled = readiness
                .wait_for(Option::is_some)
                .await
                .map(|state| (*state).clone());
            settled
        });

        match state {
            Ok(Some(Ok(()))) => Ok(()),
            Ok(Some(Err(reason))) => Err(BgRemovalError::removal(format!(
                "Segmentation service failed to initialize: {}",
                reason
            ))),
            Ok(None) | Err(_) => Err(BgRemovalError::internal(
                "Segmentation service warm-up ended without a result",
            )),
        }
    }

    /// Remove the backgrounds of `paths` and wait for every job
    ///
    /// # Errors
    /// - `Removal` when the segmentation service failed to warm up
    /// - `Busy` while another batch or a download is running
    /// - `InvalidArgument` when the model file is missing
    /// - `InvalidPath` from batch validation
    pub fn run_batch<S: AsRef<str>>(&self, paths: &[S]) -> Result<BatchResult> {
        if paths.is_empty() {
            return Ok(BatchResult::from_jobs(Vec::new()));
        }

        self.wait_until_ready()?;
        let _guard = self.begin("batch")?;

        if !self.model_exists()? {
            return Err(BgRemovalError::invalid_argument(format!(
                "Model file '{}' is missing; download it first",
                self.config.model.local_path.display()
            )));
        }

        self.runtime.block_on(self.coordinator.run(
            paths,
            &self.config.model,
            self.config.alpha_matting,
        ))
    }

    /// Claim the single in-flight slot
    fn begin(&self, operation: &str) -> Result<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                BgRemovalError::busy(format!(
                    "Cannot start {} while another operation is running",
                    operation
                ))
            })?;
        Ok(FlightGuard(&self.in_flight))
    }
}
