//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning. [`process_staged_with_diagnostics`] drives the
//! typed [`Pipeline`](crate::Pipeline) one stage at a time and records
//! how long each stage took together with what it produced.
//!
//! Time is read through the [`Clock`] trait so the library stays free of
//! platform clocks; front ends supply an implementation backed by
//! `std::time::Instant`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{
    FeatureRecord, MaskSource, PipelineConfig, PipelineError, Rect, RgbImage, StagedResult,
};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// One entry per executed stage, in pipeline order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name, as in [`PipelineStage::NAME`].
    pub name: String,
    /// Stage index, as in [`PipelineStage::INDEX`].
    pub index: usize,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Background normalization.
    Background {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Pixels equal to the white sentinel afterwards (whitened
        /// vignette plus any pixel that was already white).
        white_pixel_count: u64,
    },
    /// Median smoothing.
    Denoise {
        /// Filter window in pixels.
        window: u32,
    },
    /// Region cropping.
    Crop {
        /// Crop rectangle in source coordinates, `None` on fallback.
        rect: Option<Rect>,
        /// Points in the selected contour (0 on fallback).
        contour_points: usize,
        /// Cropped width.
        width: u32,
        /// Cropped height.
        height: u32,
    },
    /// Pixel clustering.
    Cluster {
        /// Which clusterer ran.
        strategy: String,
        /// Requested cluster count.
        requested: usize,
        /// Pixels per cluster id.
        sizes: Vec<usize>,
        /// Within-cluster sum of squares of the kept run.
        inertia: f64,
    },
    /// Central region extraction.
    Region {
        /// Cluster id under the center pixel.
        center_cluster: u32,
        /// Component id under the center pixel (0 = background).
        component: u32,
        /// Cluster mask area after opening and closing.
        cleaned_area: u64,
        /// Area of the selected component.
        region_area: u64,
    },
    /// Hole filling.
    Fill {
        /// Pixels switched to foreground.
        filled_pixel_count: u64,
        /// Final mask area.
        mask_area: u64,
    },
    /// Compositing.
    Composite {
        /// Pixels kept from the cropped image.
        foreground_pixel_count: u64,
        /// Pixels set to the white sentinel.
        background_pixel_count: u64,
    },
    /// Feature extraction.
    Features {
        /// Where the region mask came from.
        mask_source: MaskSource,
        /// Area of the mask the extractors measured.
        measured_area: u64,
        /// The resulting record.
        record: FeatureRecord,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Crop rectangle, `None` when the cropper fell back.
    pub crop: Option<Rect>,
    /// Final mask area.
    pub mask_area: u64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = stage
                .metrics
                .as_ref()
                .map(format_metrics)
                .unwrap_or_default();
            let name = &stage.name;
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let crop = match self.summary.crop {
            Some(r) => format!("{}x{} at ({}, {})", r.width, r.height, r.x, r.y),
            None => "none (fallback)".to_string(),
        };
        lines.push(format!(
            "Crop: {crop}  |  Mask area: {}",
            self.summary.mask_area,
        ));

        lines.join("\n")
    }

    /// Duration of the named stage, if it ran.
    #[must_use]
    pub fn stage_duration(&self, name: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.duration)
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Background {
            width,
            height,
            white_pixel_count,
        } => format!("{width}x{height} white={white_pixel_count}"),
        StageMetrics::Denoise { window } => format!("window={window}"),
        StageMetrics::Crop {
            rect,
            contour_points,
            width,
            height,
        } => match rect {
            Some(r) => format!(
                "box=({}, {}) {width}x{height}, contour {contour_points} pts",
                r.x, r.y
            ),
            None => format!("no contour, passthrough {width}x{height}"),
        },
        StageMetrics::Cluster {
            strategy,
            requested,
            sizes,
            inertia,
        } => format!("{strategy} k={requested} sizes={sizes:?} inertia={inertia:.1}"),
        StageMetrics::Region {
            center_cluster,
            component,
            cleaned_area,
            region_area,
        } => format!(
            "cluster={center_cluster} cleaned={cleaned_area} component={component} area={region_area}"
        ),
        StageMetrics::Fill {
            filled_pixel_count,
            mask_area,
        } => format!("filled={filled_pixel_count} area={mask_area}"),
        StageMetrics::Composite {
            foreground_pixel_count,
            background_pixel_count,
        } => format!("kept={foreground_pixel_count} white={background_pixel_count}"),
        StageMetrics::Features {
            mask_source,
            measured_area,
            record,
        } => format!(
            "{mask_source:?} area={measured_area} hsv=({:.1}, {:.2}, {:.2}) contrast={:.3} perimeter={:.1}",
            record.color.hsv[0],
            record.color.hsv[1],
            record.color.hsv[2],
            record.texture.contrast,
            record.shape.perimeter,
        ),
    }
}

/// Record one stage: its name, index, duration since `start`, and metrics.
fn record_stage<C: Clock, S: PipelineStage>(
    clock: &C,
    start: &C::Instant,
    stage: &S,
    out: &mut Vec<StageDiagnostics>,
) {
    let duration = clock.elapsed(start);
    out.push(StageDiagnostics {
        name: S::NAME.to_string(),
        index: S::INDEX,
        duration,
        metrics: stage.metrics(),
    });
}

/// Run every stage, timing each, and return the staged result together
/// with its diagnostics.
///
/// # Errors
///
/// Returns the same errors as [`crate::process`].
pub fn process_staged_with_diagnostics<C: Clock>(
    id: &str,
    image: RgbImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let mut stages = Vec::with_capacity(crate::pipeline::STAGE_COUNT - 1);

    let pending = Pipeline::new(image, config.clone());

    let t = clock.now();
    let normalized = pending.normalize_background()?;
    record_stage(clock, &t, &normalized, &mut stages);

    let t = clock.now();
    let smoothed = normalized.suppress_noise();
    record_stage(clock, &t, &smoothed, &mut stages);

    let t = clock.now();
    let cropped = smoothed.crop();
    record_stage(clock, &t, &cropped, &mut stages);

    let t = clock.now();
    let clustered = cropped.cluster();
    record_stage(clock, &t, &clustered, &mut stages);

    let t = clock.now();
    let region = clustered.extract_central_region();
    record_stage(clock, &t, &region, &mut stages);

    let t = clock.now();
    let filled = region.fill_holes();
    record_stage(clock, &t, &filled, &mut stages);

    let t = clock.now();
    let composited = filled.composite();
    record_stage(clock, &t, &composited, &mut stages);

    let t = clock.now();
    let extracted = composited.extract_features(id);
    record_stage(clock, &t, &extracted, &mut stages);

    let total_duration = clock.elapsed(&total_start);
    let staged = extracted.into_result();
    let summary = PipelineSummary {
        image_width: staged.source_dimensions.width,
        image_height: staged.source_dimensions.height,
        pixel_count: staged.source_dimensions.pixel_count(),
        crop: staged.crop,
        mask_area: crate::mask::count(&staged.mask),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            stages,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Deterministic clock: every reading advances by one millisecond.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get() + 1;
            self.ticks.set(t);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn lesion_image() -> RgbImage {
        RgbImage::from_fn(60, 60, |x, y| {
            let (dx, dy) = (i64::from(x) - 30, i64::from(y) - 30);
            if dx * dx + dy * dy <= 144 {
                image::Rgb([100, 50, 40])
            } else {
                image::Rgb([215, 180, 160])
            }
        })
    }

    fn run_lesion() -> (StagedResult, PipelineDiagnostics) {
        let config = PipelineConfig::default();
        process_staged_with_diagnostics("a", lesion_image(), &config, &TickClock::new()).unwrap()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn every_stage_is_recorded_in_order() {
        let (staged, diag) = run_lesion();
        let names: Vec<&str> = diag.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "background",
                "denoise",
                "crop",
                "cluster",
                "region",
                "fill",
                "composite",
                "features",
            ],
        );
        for (i, stage) in diag.stages.iter().enumerate() {
            assert_eq!(stage.index, i + 1);
            assert!(stage.metrics.is_some());
        }
        assert_eq!(diag.summary.image_width, 60);
        assert_eq!(diag.summary.crop, staged.crop);
        assert_eq!(diag.summary.mask_area, crate::mask::count(&staged.mask));
    }

    #[test]
    fn clock_drives_durations() {
        let (_, diag) = run_lesion();
        for stage in &diag.stages {
            assert_eq!(stage.duration, Duration::from_millis(1));
        }
        assert!(diag.total_duration > Duration::from_millis(8));
        assert_eq!(diag.stage_duration("crop"), Some(Duration::from_millis(1)));
        assert_eq!(diag.stage_duration("missing"), None);
    }

    #[test]
    fn errors_propagate() {
        let result = process_staged_with_diagnostics(
            "a",
            RgbImage::new(0, 0),
            &PipelineConfig::default(),
            &TickClock::new(),
        );
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn report_mentions_every_stage() {
        let (_, diag) = run_lesion();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for stage in &diag.stages {
            assert!(report.contains(&stage.name), "missing {}", stage.name);
        }
        assert!(report.contains("KMeans"));
    }

    #[test]
    fn diagnostics_round_trip_through_json() {
        let (_, diag) = run_lesion();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stages.len(), diag.stages.len());
        assert_eq!(back.stages[2].metrics, diag.stages[2].metrics);
    }
}
