//! Integration tests for complete batch background removal workflows
//!
//! These tests run real file I/O and the real worker pool against the mock
//! segmentation service, so no model or external program is needed.

use image::{ImageFormat, Rgb, RgbImage};
use nobg::{
    AppConfig, AppContext, BackgroundRemover, BatchJobCoordinator, BatchProgressReporter,
    BatchResult, BgRemovalError, ImageJob, JobStatus, MockSegmentationService, ModelReference,
    SegmentationService,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write a solid-color image and return its path as a string
fn create_test_image(dir: &Path, name: &str, width: u32, height: u32, shade: u8) -> String {
    let path = dir.join(name);
    let format = ImageFormat::from_path(&path).unwrap();
    RgbImage::from_pixel(width, height, Rgb([shade, 128, 255 - shade]))
        .save_with_format(&path, format)
        .unwrap();
    path.to_str().unwrap().to_string()
}

fn model(dir: &Path) -> ModelReference {
    ModelReference::new(dir.join("u2net_human_seg.pth"), "abc")
}

fn coordinator(service: &MockSegmentationService, workers: usize) -> BatchJobCoordinator {
    BatchJobCoordinator::new(
        BackgroundRemover::new(Arc::new(service.clone())),
        workers,
    )
}

#[tokio::test]
async fn test_one_failing_image_does_not_stop_the_batch() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let a = create_test_image(temp_dir.path(), "a.jpg", 16, 16, 10);
    let b = create_test_image(temp_dir.path(), "b.jpg", 24, 12, 200);

    let service = MockSegmentationService::new().with_failing_input(fs::read(&b).unwrap());
    let result = coordinator(&service, 2)
        .run(&[a.clone(), b.clone()], &model(temp_dir.path()), true)
        .await
        .unwrap();

    assert_eq!(result.jobs.len(), 2);
    assert_eq!(result.jobs[0].input_path, a);
    assert_eq!(result.jobs[0].status, JobStatus::Done);
    assert!(result.jobs[0].error.is_none());
    assert_eq!(result.jobs[1].input_path, b);
    assert_eq!(result.jobs[1].status, JobStatus::Failed);
    assert!(result.jobs[1].error.as_deref().is_some_and(|e| !e.is_empty()));
    assert_eq!(result.succeeded_count, 1);
    assert_eq!(result.failed_count, 1);
    assert!(!result.is_success());

    assert!(temp_dir.path().join("a_NO_BG.jpg").exists());
    assert!(!temp_dir.path().join("b_NO_BG.jpg").exists());
    assert_eq!(service.remove_calls(), 2);
}

#[tokio::test]
async fn test_results_keep_input_order() {
    let temp_dir = TempDir::new().unwrap();
    let paths: Vec<String> = (0..6u8)
        .map(|i| create_test_image(temp_dir.path(), &format!("img{}.png", i), 8 + u32::from(i), 8, i * 30))
        .collect();

    let service = MockSegmentationService::new().with_delay(Duration::from_millis(15));
    let result = coordinator(&service, 3)
        .run(&paths, &model(temp_dir.path()), false)
        .await
        .unwrap();

    let order: Vec<&str> = result.jobs.iter().map(|job| job.input_path.as_str()).collect();
    assert_eq!(order, paths.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(result.is_success());
    assert!(result.jobs.iter().all(|job| job.elapsed_ms.is_some()));
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    let temp_dir = TempDir::new().unwrap();
    let paths: Vec<String> = (0..8u8)
        .map(|i| create_test_image(temp_dir.path(), &format!("p{}.png", i), 4, 4, i))
        .collect();

    let service = MockSegmentationService::new().with_delay(Duration::from_millis(40));
    let result = coordinator(&service, 2)
        .run(&paths, &model(temp_dir.path()), true)
        .await
        .unwrap();

    assert_eq!(result.succeeded_count, 8);
    assert!(service.peak_concurrency() <= 2);
    assert!(service.peak_concurrency() >= 1);
    assert_eq!(service.remove_calls(), 8);
}

#[tokio::test]
async fn test_output_keeps_input_dimensions() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_image(temp_dir.path(), "img.png", 13, 7, 90);

    let service = MockSegmentationService::new();
    let result = coordinator(&service, 1)
        .run(&[input.as_str()], &model(temp_dir.path()), true)
        .await
        .unwrap();

    assert_eq!(result.jobs[0].output_path, input.replace("img.png", "img_NO_BG.png"));
    let output = image::open(temp_dir.path().join("img_NO_BG.png")).unwrap();
    assert_eq!((output.width(), output.height()), (13, 7));
    assert!(!output.color().has_alpha());
    assert_eq!(output.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
}

#[tokio::test]
async fn test_duplicate_inputs_run_once() {
    let temp_dir = TempDir::new().unwrap();
    let input = create_test_image(temp_dir.path(), "dup.png", 4, 4, 1);

    let service = MockSegmentationService::new();
    let result = coordinator(&service, 4)
        .run(&[input.clone(), input.clone()], &model(temp_dir.path()), true)
        .await
        .unwrap();

    assert_eq!(result.jobs.len(), 1);
    assert_eq!(service.remove_calls(), 1);
}

#[tokio::test]
async fn test_invalid_path_fails_whole_batch_without_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let good = create_test_image(temp_dir.path(), "good.png", 4, 4, 1);
    let bad = temp_dir.path().join("clip.gif");

    let service = MockSegmentationService::new();
    let result = coordinator(&service, 2)
        .run(
            &[good, bad.to_str().unwrap().to_string()],
            &model(temp_dir.path()),
            true,
        )
        .await;

    assert!(matches!(result, Err(BgRemovalError::InvalidPath(_))));
    assert_eq!(service.remove_calls(), 0);
    assert!(!temp_dir.path().join("good_NO_BG.png").exists());
}

/// Service that panics on one payload
struct PanickingService {
    inner: MockSegmentationService,
    poison: Vec<u8>,
}

impl SegmentationService for PanickingService {
    fn name(&self) -> &str {
        "panicking"
    }

    fn remove(&self, image: &[u8], alpha_matting: bool, model: &ModelReference) -> nobg::Result<Vec<u8>> {
        assert!(image != self.poison.as_slice(), "segmentation crashed");
        self.inner.remove(image, alpha_matting, model)
    }
}

#[tokio::test]
async fn test_panicking_job_only_fails_itself() {
    let temp_dir = TempDir::new().unwrap();
    let ok = create_test_image(temp_dir.path(), "ok.png", 4, 4, 1);
    let crash = create_test_image(temp_dir.path(), "crash.png", 5, 5, 2);

    let service = PanickingService {
        inner: MockSegmentationService::new(),
        poison: fs::read(&crash).unwrap(),
    };
    let coordinator = BatchJobCoordinator::new(BackgroundRemover::new(Arc::new(service)), 2);
    let result = coordinator
        .run(&[crash, ok], &model(temp_dir.path()), true)
        .await
        .unwrap();

    assert_eq!(result.jobs[0].status, JobStatus::Failed);
    assert_eq!(result.jobs[1].status, JobStatus::Done);
}

/// Reporter that records every event
#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl BatchProgressReporter for RecordingReporter {
    fn batch_started(&self, total: usize) {
        self.events.lock().unwrap().push(format!("batch_started {}", total));
    }

    fn job_started(&self, index: usize, job: &ImageJob) {
        self.events
            .lock()
            .unwrap()
            .push(format!("job_started {} {:?}", index, job.status));
    }

    fn job_finished(&self, index: usize, job: &ImageJob) {
        self.events
            .lock()
            .unwrap()
            .push(format!("job_finished {} {:?}", index, job.status));
    }

    fn batch_finished(&self, result: &BatchResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("batch_finished {}", result.succeeded_count));
    }
}

#[tokio::test]
async fn test_reporter_sees_every_job() {
    let temp_dir = TempDir::new().unwrap();
    let paths = vec![
        create_test_image(temp_dir.path(), "r0.png", 4, 4, 1),
        create_test_image(temp_dir.path(), "r1.jpg", 4, 4, 2),
    ];

    let reporter = Arc::new(RecordingReporter::default());
    let service = MockSegmentationService::new();
    let result = coordinator(&service, 2)
        .with_reporter(reporter.clone())
        .run(&paths, &model(temp_dir.path()), true)
        .await
        .unwrap();
    assert!(result.is_success());

    let events = reporter.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("batch_started 2"));
    assert_eq!(events.last().map(String::as_str), Some("batch_finished 2"));
    assert!(events.contains(&"job_started 0 Running".to_string()));
    assert!(events.contains(&"job_started 1 Running".to_string()));
    assert!(events.contains(&"job_finished 0 Done".to_string()));
    assert!(events.contains(&"job_finished 1 Done".to_string()));
}

#[tokio::test]
async fn test_job_finished_is_reported_as_each_job_ends() {
    let temp_dir = TempDir::new().unwrap();
    let paths = vec![
        create_test_image(temp_dir.path(), "s0.png", 4, 4, 1),
        create_test_image(temp_dir.path(), "s1.png", 4, 4, 2),
    ];

    let reporter = Arc::new(RecordingReporter::default());
    let service = MockSegmentationService::new().with_delay(Duration::from_millis(50));
    coordinator(&service, 1)
        .with_reporter(reporter.clone())
        .run(&paths, &model(temp_dir.path()), true)
        .await
        .unwrap();

    // With one worker, a job's completion must be heard before the next starts
    let events = reporter.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "batch_started 2",
            "job_started 0 Running",
            "job_finished 0 Done",
            "job_started 1 Running",
            "job_finished 1 Done",
            "batch_finished 2",
        ]
    );
}

#[test]
fn test_app_context_runs_batch_end_to_end() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let model = model(temp_dir.path());
    fs::write(&model.local_path, b"weights").unwrap();
    let input = create_test_image(temp_dir.path(), "ctx.jpeg", 6, 6, 3);

    let config = AppConfig::builder()
        .model(model)
        .alpha_matting(false)
        .max_workers(2)
        .build()
        .unwrap();
    let service = MockSegmentationService::new();
    let context = AppContext::new(config, Arc::new(service.clone())).unwrap();

    let result = context.run_batch(&[input]).unwrap();
    assert!(result.is_success());
    assert!(context.is_ready());
    assert!(temp_dir.path().join("ctx_NO_BG.jpeg").exists());
    assert!(service
        .get_call_history()
        .contains(&"remove alpha_matting=false model=u2net_human_seg".to_string()));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["succeeded_count"], 1);
    assert_eq!(json["jobs"][0]["status"], "Done");
}
