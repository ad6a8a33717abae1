//! Background Removal CLI Tool
//!
//! Command-line shell over [`AppContext`]: downloads the model on first run,
//! expands inputs, runs one batch and reports a single summary.

use super::config::CliConfigBuilder;
use crate::{
    backends::command::{CommandSegmentationService, DEFAULT_PROGRAM},
    config::DEFAULT_REMOTE_ID,
    context::AppContext,
    download::{DownloadProgress, ProgressCallback},
    services::ConsoleProgressReporter,
    tracing_config::{init_cli_tracing, spans},
    utils::{validation::OUTPUT_SUFFIX, ImagePathResolver},
    BatchResult,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

/// Remove image backgrounds and flatten them onto white
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "nobg")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input images or directories
    #[arg(value_name = "INPUT", required_unless_present_any = &["only_download", "show_model"])]
    pub input: Vec<String>,

    /// Model file location (must end in .pth)
    #[arg(long, value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Remote identifier of the model file
    #[arg(long, default_value = DEFAULT_REMOTE_ID)]
    pub remote_id: String,

    /// Expected SHA-256 of the model file, checked after download
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Disable alpha matting refinement
    #[arg(long)]
    pub no_alpha_matting: bool,

    /// Maximum concurrent removals (0 = number of CPUs)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub workers: usize,

    /// Enable verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Search directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g. "*.png")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Download the model and exit
    #[arg(long)]
    pub only_download: bool,

    /// Print the model location and whether it is present, then exit
    #[arg(long)]
    pub show_model: bool,

    /// Segmentation program to run
    #[arg(long, value_name = "PROGRAM", default_value = DEFAULT_PROGRAM)]
    pub rembg_command: String,

    /// Print the batch result as JSON
    #[arg(long)]
    pub json: bool,

    /// Show progress bars
    #[arg(long)]
    pub progress: bool,
}

pub fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let session_id = uuid::Uuid::new_v4().to_string();

    init_cli_tracing(cli.verbose, cli.json, &session_id).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    if cli.show_model {
        println!("Model path: {}", config.model.local_path.display());
        println!("Remote ID:  {}", config.model.remote_id);
        println!(
            "Present:    {}",
            crate::ModelStore::exists(&config.model).context("Invalid model path")?
        );
        return Ok(ExitCode::SUCCESS);
    }

    let service = Arc::new(CommandSegmentationService::new(&cli.rembg_command));
    let _session = spans::session(&session_id, &cli.rembg_command).entered();

    let context = AppContext::new(config, service)
        .context("Failed to create application context")?
        .with_reporter(Arc::new(ConsoleProgressReporter::new(
            cli.progress,
            cli.verbose > 0,
        )));

    // Status lines go to stderr so `--json` leaves stdout holding only the document
    ensure_model_available(&context, cli.progress, &mut std::io::stderr())
        .context("Failed to ensure model is available")?;

    if cli.only_download {
        println!(
            "Model ready: {}",
            context.config().model.local_path.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let inputs = collect_inputs(&cli)?;
    if inputs.is_empty() {
        warn!("No supported images found in the provided inputs");
        return Ok(ExitCode::SUCCESS);
    }
    info!("Found {} image(s) to process", inputs.len());

    let start_time = Instant::now();
    let result = context
        .run_batch(&inputs)
        .context("Background removal batch failed")?;
    info!(
        "Processed {} image(s) in {:.2}s",
        result.jobs.len(),
        start_time.elapsed().as_secs_f64()
    );

    report(&result, cli.json)?;

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Download the model if it is missing, writing status lines to `status`
fn ensure_model_available(
    context: &AppContext,
    show_progress: bool,
    status: &mut impl Write,
) -> Result<()> {
    if context.model_exists()? {
        return Ok(());
    }

    let model = &context.config().model;
    let _span = spans::download(&model.remote_id, &model.local_path).entered();
    writeln!(status, "📦 Model not found. Downloading {}...", model.remote_id)?;

    let bar = if show_progress {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let on_progress: &ProgressCallback = &move |progress: &DownloadProgress| {
        if let Some(total) = progress.total {
            bar.set_length(total);
        }
        bar.set_position(progress.downloaded);
        if progress.completed {
            bar.finish_with_message(progress.file_name.clone());
        }
    };

    context.ensure_model(Some(on_progress))?;
    writeln!(status, "✅ Model downloaded successfully!")?;
    Ok(())
}

/// Print the batch outcome
fn report(result: &BatchResult, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(result).context("Failed to serialize batch result")?;
        println!("{}", rendered);
        return Ok(());
    }

    for job in result.failed_jobs() {
        eprintln!(
            "❌ {}: {}",
            job.input_path,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("{}", result.summary());
    Ok(())
}

/// Expand CLI inputs into image paths
///
/// Explicit files keep their order; each directory contributes its images in
/// sorted order.
fn collect_inputs(cli: &Cli) -> Result<Vec<String>> {
    let mut all_files = Vec::new();

    for input in &cli.input {
        let path = PathBuf::from(input);

        if path.is_dir() {
            let mut dir_files = find_image_files(&path, cli.recursive, cli.pattern.as_deref())?;
            dir_files.sort();
            all_files.extend(dir_files.into_iter().filter_map(path_to_string));
        } else if path.is_file() {
            if is_image_file(&path) {
                all_files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    Ok(all_files)
}

/// Find image files in a directory, skipping earlier outputs
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let max_depth = if recursive { usize::MAX } else { 1 };

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_image_file(path) && !is_previous_output(path) && matches_pattern(path, pattern) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Check if file is an accepted image based on extension
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(ImagePathResolver::is_accepted_extension)
}

/// Check if file was produced by an earlier run
fn is_previous_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(OUTPUT_SUFFIX))
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(name))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

fn path_to_string(path: PathBuf) -> Option<String> {
    match path.into_os_string().into_string() {
        Ok(path) => Some(path),
        Err(raw) => {
            warn!("Skipping non UTF-8 path: {}", Path::new(&raw).display());
            None
        },
    }
}
