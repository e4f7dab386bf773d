//! dermis-bench: CLI tool for running the lesion pipeline on image files.
//!
//! Decodes each image given on the command line, runs the segmentation
//! and feature pipeline with configurable parameters, and prints either
//! one feature record per image (JSON, one object per line) or detailed
//! per-stage diagnostics. Useful for:
//!
//! - Tuning background, crop and clustering thresholds
//! - Measuring per-stage durations to identify bottlenecks
//! - Checking which crop, cluster and component a given image ends up with
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin dermis-bench -- [OPTIONS] <IMAGE_PATH>...
//! ```
//!
//! Set `RUST_LOG=debug` to see the pipeline's per-stage log lines.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use dermis_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use dermis_pipeline::{ClustererKind, MaskSource, PipelineConfig};

/// Lesion segmentation and feature extraction for dermoscopic images.
///
/// Prints one feature record per image as a JSON line, or per-stage
/// timing and metric diagnostics with `--diagnostics`.
#[derive(Parser)]
#[command(name = "dermis-bench", version)]
struct Cli {
    /// Input images (PNG, JPEG, BMP, WebP).
    #[arg(required = true)]
    image_paths: Vec<PathBuf>,

    /// Upper bound of the vignette hue band in degrees.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BACKGROUND_HUE_MAX)]
    background_hue_max: f32,

    /// Largest HSV value (0-255) treated as vignette.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BACKGROUND_THRESHOLD)]
    background_threshold: u8,

    /// Median filter window (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MEDIAN_WINDOW)]
    median_window: u32,

    /// Gaussian sigma before the cropper binarizes.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CROP_BLUR_SIGMA)]
    crop_blur_sigma: f32,

    /// Cropper binarization level; darker pixels are foreground.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CROP_THRESHOLD)]
    crop_threshold: u8,

    /// Crop margin divisor: the box grows by `size / zoom_factor` per side.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ZOOM_FACTOR)]
    zoom_factor: f64,

    /// White ring thickness along the outside of the lesion contour.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RING_THICKNESS)]
    ring_thickness: u32,

    /// Clustering algorithm.
    #[arg(long, value_enum, default_value_t = Clusterer::Kmeans)]
    clusterer: Clusterer,

    /// Number of pixel clusters.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_COUNT)]
    clusters: usize,

    /// Clustering seed.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_SEED)]
    seed: u64,

    /// Independent clustering restarts.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_RESTARTS)]
    restarts: usize,

    /// Iteration cap for a single clustering run.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Centroid movement below which a clustering run stops early.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_TOLERANCE)]
    tolerance: f32,

    /// Structuring element size for opening and closing (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_KERNEL_SIZE)]
    kernel_size: u32,

    /// Where the feature extractors read the region mask from.
    #[arg(long, value_enum, default_value_t = MaskFrom::Explicit)]
    mask_source: MaskFrom,

    /// Print per-stage diagnostics instead of feature records.
    #[arg(long)]
    diagnostics: bool,

    /// With `--diagnostics`, output JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Number of runs per image for averaging (diagnostics only).
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Clustering algorithm selection.
#[derive(Clone, Copy, ValueEnum)]
enum Clusterer {
    /// k-means with k-means++ seeding.
    Kmeans,
}

/// Mask source selection.
#[derive(Clone, Copy, ValueEnum)]
enum MaskFrom {
    /// The hole filler's mask.
    Explicit,
    /// Re-derive the mask from non-white composited pixels.
    WhiteSentinel,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            background_hue_max: cli.background_hue_max,
            background_threshold: cli.background_threshold,
            median_window: cli.median_window,
            crop_blur_sigma: cli.crop_blur_sigma,
            crop_threshold: cli.crop_threshold,
            zoom_factor: cli.zoom_factor,
            ring_thickness: cli.ring_thickness,
            clusterer: match cli.clusterer {
                Clusterer::Kmeans => ClustererKind::KMeans,
            },
            cluster_count: cli.clusters,
            cluster_seed: cli.seed,
            cluster_restarts: cli.restarts,
            cluster_max_iterations: cli.max_iterations,
            cluster_tolerance: cli.tolerance,
            kernel_size: cli.kernel_size,
            mask_source: match cli.mask_source {
                MaskFrom::Explicit => MaskSource::Explicit,
                MaskFrom::WhiteSentinel => MaskSource::WhiteSentinel,
            },
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Decode one image file.
fn load(path: &Path) -> Result<dermis_pipeline::RgbImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    dermis_pipeline::grayscale::decode(&bytes).map_err(|e| format!("{}: {e}", path.display()))
}

/// Identifier recorded for `path`: its file name.
fn image_id(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    log::debug!("config: {config:?}");

    let mut failures = 0_usize;
    for path in &cli.image_paths {
        let result = if cli.diagnostics {
            run_diagnostics(&cli, &config, path)
        } else {
            run_record(&config, path)
        };
        if let Err(msg) = result {
            eprintln!("{msg}");
            failures += 1;
        }
    }

    if failures > 0 {
        log::warn!("{failures} of {} images failed", cli.image_paths.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Print the feature record of one image as a JSON line.
fn run_record(config: &PipelineConfig, path: &Path) -> Result<(), String> {
    let image = load(path)?;
    let record = dermis_pipeline::process(&image_id(path), image, config)
        .map_err(|e| format!("{}: pipeline error: {e}", path.display()))?;
    let json =
        serde_json::to_string(&record).map_err(|e| format!("Error serializing record: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Print diagnostics for `cli.runs` runs over one image.
fn run_diagnostics(cli: &Cli, config: &PipelineConfig, path: &Path) -> Result<(), String> {
    let image = load(path)?;
    let id = image_id(path);
    eprintln!(
        "Image: {} ({}x{})",
        path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (_, diagnostics) = dermis_pipeline::diagnostics::process_staged_with_diagnostics(
            &id,
            image.clone(),
            config,
            &StdClock,
        )
        .map_err(|e| format!("{}: pipeline error: {e}", path.display()))?;

        if cli.json {
            let json = serde_json::to_string_pretty(&diagnostics)
                .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
            println!("{json}");
        } else {
            println!("{}", diagnostics.report());
        }
        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in &first.stages {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage_duration(&stage.name))
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.name);
    }
}
