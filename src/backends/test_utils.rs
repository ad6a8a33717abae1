//! Test utilities and mock services for testing removal functionality
//!
//! This module provides a mock implementation of the `SegmentationService`
//! trait to enable testing without a model file or an external
//! segmentation program.

use crate::{
    config::ModelReference,
    error::{BgRemovalError, Result},
    inference::SegmentationService,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use instant::Duration;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Deterministic mock segmentation service
///
/// Output is an RGBA PNG of the input's size whose left half is fully
/// transparent and right half keeps the input colors. Clones share call
/// history and concurrency counters.
#[derive(Debug, Clone, Default)]
pub struct MockSegmentationService {
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    /// Exact input payloads that make `remove` fail
    failing_inputs: Vec<Vec<u8>>,
    /// Whether to simulate initialization failure
    should_fail_init: bool,
    /// Artificial latency per `remove` call
    delay: Option<Duration>,
    /// Artificial latency in `initialize`
    init_delay: Option<Duration>,
    /// Calls currently inside `remove`
    active: Arc<AtomicUsize>,
    /// Highest value `active` ever reached
    peak: Arc<AtomicUsize>,
}

impl MockSegmentationService {
    /// Create a new mock service that succeeds on every decodable input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock service that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            should_fail_init: true,
            ..Self::default()
        }
    }

    /// Fail every `remove` call whose input equals `payload`
    #[must_use]
    pub fn with_failing_input(mut self, payload: Vec<u8>) -> Self {
        self.failing_inputs.push(payload);
        self
    }

    /// Sleep for `delay` inside every `remove` call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep for `delay` inside `initialize`, simulating a slow warm-up
    #[must_use]
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    /// Number of `remove` calls so far
    pub fn remove_calls(&self) -> usize {
        self.get_call_history()
            .iter()
            .filter(|call| call.starts_with("remove"))
            .count()
    }

    /// Highest number of overlapping `remove` calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Record a method call for testing verification
    fn record_call(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }

    /// Make the left half transparent, keep the right half opaque
    fn generate_mock_output(image: &DynamicImage) -> Result<Vec<u8>> {
        let source = image.to_rgba8();
        let (width, height) = source.dimensions();
        let mut output = RgbaImage::new(width, height);

        for (x, y, pixel) in source.enumerate_pixels() {
            let alpha = if x < width / 2 { 0 } else { 255 };
            output.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
        }

        let mut buffer = Cursor::new(Vec::new());
        output
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| BgRemovalError::removal(format!("Mock encode failed: {}", e)))?;
        Ok(buffer.into_inner())
    }
}

/// Decrements the active counter when a call leaves `remove`
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SegmentationService for MockSegmentationService {
    fn name(&self) -> &str {
        "mock"
    }

    fn initialize(&self) -> Result<()> {
        self.record_call("initialize".to_string());

        if let Some(delay) = self.init_delay {
            std::thread::sleep(delay);
        }

        if self.should_fail_init {
            return Err(BgRemovalError::removal(
                "Mock segmentation service initialization failed",
            ));
        }
        Ok(())
    }

    fn remove(
        &self,
        image: &[u8],
        alpha_matting: bool,
        model: &ModelReference,
    ) -> Result<Vec<u8>> {
        self.record_call(format!(
            "remove alpha_matting={} model={}",
            alpha_matting,
            model.model_name()
        ));

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if self.failing_inputs.iter().any(|payload| payload == image) {
            return Err(BgRemovalError::removal(
                "Mock segmentation service rejected input",
            ));
        }

        let decoded = image::load_from_memory(image)
            .map_err(|e| BgRemovalError::removal(format!("Mock decode failed: {}", e)))?;
        Self::generate_mock_output(&decoded)
    }
}
