//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use dermis_pipeline::{Pipeline, PipelineConfig, PipelineError, RgbImage};
//! # fn run(image: RgbImage) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(image, config)
//!     .normalize_background()?
//!     .suppress_noise()
//!     .crop()
//!     .cluster()
//!     .extract_central_region()
//!     .fill_holes()
//!     .composite()
//!     .extract_features("ISIC_0000000.jpg");
//!
//! let staged = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying the intermediates that [`StagedResult`] needs. Only the first
//! transition can fail: it validates the config and rejects empty images.
//! Every later stage degrades to a neutral result instead of failing.
//!
//! # Memory
//!
//! From [`Cropped`] onward the cropped color image is retained, and
//! each later stage adds one label map or mask of the same size. All of
//! it is released when [`Extracted::into_result`] hands it over.

use crate::cluster::Clustering;
use crate::contour::Contour;
use crate::crop;
use crate::diagnostics::StageMetrics;
use crate::mask;
use crate::region::CentralRegion;
use crate::types::{
    Dimensions, FeatureRecord, GrayImage, LabelMap, MaskSource, PipelineConfig, PipelineError,
    RgbImage, StagedResult,
};

/// State every stage after [`Pending`] carries forward.
struct Context {
    config: PipelineConfig,
    source_dimensions: Dimensions,
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`normalize_background`](Self::normalize_background) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .normalize_background() to continue"]
pub struct Pending {
    config: PipelineConfig,
    image: RgbImage,
}

impl Pending {
    /// The input image.
    #[must_use]
    pub const fn source(&self) -> &RgbImage {
        &self.image
    }

    /// Validate inputs, whiten the vignette, and advance to [`Normalized`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config fails
    /// [`PipelineConfig::validate`], and [`PipelineError::EmptyInput`] if
    /// the image has zero width or height.
    pub fn normalize_background(self) -> Result<Normalized, PipelineError> {
        self.config.validate()?;
        let source_dimensions = Dimensions::of(&self.image);
        if source_dimensions.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let image = crate::background::normalize_background(
            self.image,
            self.config.background_hue_max,
            self.config.background_threshold,
        );
        Ok(Normalized {
            ctx: Context {
                config: self.config,
                source_dimensions,
            },
            image,
        })
    }
}

// ───────────────────────── Stage 1: Normalized ───────────────────────

/// Pipeline state after background normalization.
#[must_use = "pipeline stages are consumed by advancing; call .suppress_noise() to continue"]
pub struct Normalized {
    ctx: Context,
    image: RgbImage,
}

impl Normalized {
    /// The image with vignette pixels whitened.
    #[must_use]
    pub const fn normalized(&self) -> &RgbImage {
        &self.image
    }

    /// Advance to the noise suppression stage.
    pub fn suppress_noise(self) -> Smoothed {
        let image = crate::denoise::median_smooth(&self.image, self.ctx.config.median_window);
        Smoothed {
            ctx: self.ctx,
            image,
        }
    }
}

// ───────────────────────── Stage 2: Smoothed ─────────────────────────

/// Pipeline state after median smoothing.
#[must_use = "pipeline stages are consumed by advancing; call .crop() to continue"]
pub struct Smoothed {
    ctx: Context,
    image: RgbImage,
}

impl Smoothed {
    /// The median-smoothed image.
    #[must_use]
    pub const fn smoothed(&self) -> &RgbImage {
        &self.image
    }

    /// Advance to the region cropping stage.
    pub fn crop(self) -> Cropped {
        let cropped = crop::crop_region(&self.image, &self.ctx.config);
        Cropped {
            ctx: self.ctx,
            cropped,
        }
    }
}

// ───────────────────────── Stage 3: Cropped ──────────────────────────

/// Pipeline state after cropping around the dominant contour.
///
/// See the [module-level memory notes](self#memory).
#[must_use = "pipeline stages are consumed by advancing; call .cluster() to continue"]
pub struct Cropped {
    ctx: Context,
    cropped: crop::Cropped,
}

impl Cropped {
    /// The cropped, ring-whitened image.
    #[must_use]
    pub const fn cropped(&self) -> &RgbImage {
        &self.cropped.image
    }

    /// The full cropper output, including the crop rectangle and the
    /// selected contour (both `None` on the fallback path).
    #[must_use]
    pub const fn crop_output(&self) -> &crop::Cropped {
        &self.cropped
    }

    /// Advance to the pixel clustering stage.
    pub fn cluster(self) -> Clustered {
        let (labels, clustering) =
            crate::cluster::cluster_image(&self.cropped.image, &self.ctx.config);
        Clustered {
            ctx: self.ctx,
            cropped: self.cropped,
            labels,
            clustering,
        }
    }
}

// ───────────────────────── Stage 4: Clustered ────────────────────────

/// Pipeline state after pixel clustering.
#[must_use = "pipeline stages are consumed by advancing; call .extract_central_region() to continue"]
pub struct Clustered {
    ctx: Context,
    cropped: crop::Cropped,
    labels: LabelMap,
    clustering: Clustering,
}

impl Clustered {
    /// Cluster id of every cropped pixel.
    #[must_use]
    pub const fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Centroids, per-pixel labels and inertia of the chosen run.
    #[must_use]
    pub const fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    /// Advance to the central region extraction stage.
    pub fn extract_central_region(self) -> RegionExtracted {
        let region =
            crate::region::extract_central_region(&self.labels, self.ctx.config.kernel_size);
        RegionExtracted {
            ctx: self.ctx,
            cropped: self.cropped,
            labels: self.labels,
            clustering: self.clustering,
            region,
        }
    }
}

// ───────────────────────── Stage 5: RegionExtracted ──────────────────

/// Pipeline state after selecting the component under the center pixel.
#[must_use = "pipeline stages are consumed by advancing; call .fill_holes() to continue"]
pub struct RegionExtracted {
    ctx: Context,
    cropped: crop::Cropped,
    labels: LabelMap,
    clustering: Clustering,
    region: CentralRegion,
}

impl RegionExtracted {
    /// Cluster id, cleaned cluster mask, component id and component mask.
    #[must_use]
    pub const fn region(&self) -> &CentralRegion {
        &self.region
    }

    /// Advance to the hole filling stage.
    pub fn fill_holes(self) -> Filled {
        let mask = crate::fill::fill_holes(&self.region.mask);
        Filled {
            ctx: self.ctx,
            cropped: self.cropped,
            labels: self.labels,
            clustering: self.clustering,
            region: self.region,
            mask,
        }
    }
}

// ───────────────────────── Stage 6: Filled ───────────────────────────

/// Pipeline state after hole filling. The mask is final from here on.
#[must_use = "pipeline stages are consumed by advancing; call .composite() to continue"]
pub struct Filled {
    ctx: Context,
    cropped: crop::Cropped,
    labels: LabelMap,
    clustering: Clustering,
    region: CentralRegion,
    mask: GrayImage,
}

impl Filled {
    /// The final region mask.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Advance to the compositing stage.
    pub fn composite(self) -> Composited {
        let composited = crate::composite::composite(&self.cropped.image, &self.mask);
        Composited {
            ctx: self.ctx,
            cropped: self.cropped,
            labels: self.labels,
            clustering: self.clustering,
            region: self.region,
            mask: self.mask,
            composited,
        }
    }
}

// ───────────────────────── Stage 7: Composited ───────────────────────

/// Pipeline state after compositing the region onto white.
#[must_use = "pipeline stages are consumed by advancing; call .extract_features() to continue"]
pub struct Composited {
    ctx: Context,
    cropped: crop::Cropped,
    labels: LabelMap,
    clustering: Clustering,
    region: CentralRegion,
    mask: GrayImage,
    composited: RgbImage,
}

impl Composited {
    /// The cropped image with everything outside the mask set to white.
    #[must_use]
    pub const fn composited(&self) -> &RgbImage {
        &self.composited
    }

    /// Run the feature extractors and advance to the final stage.
    ///
    /// The region mask is the hole filler's output or, under
    /// [`MaskSource::WhiteSentinel`], re-derived from the composited
    /// image.
    pub fn extract_features(self, id: impl Into<String>) -> Extracted {
        let feature_mask = match self.ctx.config.mask_source {
            MaskSource::Explicit => self.mask.clone(),
            MaskSource::WhiteSentinel => crate::composite::recover_mask(&self.composited),
        };
        let record = crate::features::extract_features(id, &self.composited, &feature_mask);
        Extracted {
            ctx: self.ctx,
            cropped: self.cropped,
            labels: self.labels,
            clustering: self.clustering,
            region: self.region,
            mask: self.mask,
            composited: self.composited,
            feature_mask,
            record,
        }
    }
}

// ───────────────────────── Stage 8: Extracted ────────────────────────

/// Pipeline state after feature extraction; the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Extracted {
    ctx: Context,
    cropped: crop::Cropped,
    labels: LabelMap,
    clustering: Clustering,
    region: CentralRegion,
    mask: GrayImage,
    composited: RgbImage,
    feature_mask: GrayImage,
    record: FeatureRecord,
}

impl Extracted {
    /// The feature record.
    #[must_use]
    pub const fn record(&self) -> &FeatureRecord {
        &self.record
    }

    /// Centroids, per-pixel labels and inertia of the chosen run.
    #[must_use]
    pub const fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    /// The mask the extractors actually measured.
    #[must_use]
    pub const fn feature_mask(&self) -> &GrayImage {
        &self.feature_mask
    }

    /// Consume the pipeline and return only the record.
    #[must_use]
    pub fn into_record(self) -> FeatureRecord {
        self.record
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            source_dimensions: self.ctx.source_dimensions,
            crop: self.cropped.rect,
            cropped: self.cropped.image,
            labels: self.labels,
            center_cluster: self.region.cluster,
            region: self.region.mask,
            mask: self.mask,
            composited: self.composited,
            record: self.record,
        }
    }
}

// ──────────────────────── PipelineStage trait ─────────────────────────

/// Total number of stages in the pipeline, [`Pending`] included.
pub const STAGE_COUNT: usize = 9;

/// Trait implemented by every pipeline stage so diagnostics can label
/// and measure them uniformly.
pub trait PipelineStage {
    /// Human-readable name of this stage (e.g. `"source"`, `"crop"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `8` for
    /// Extracted).
    const INDEX: usize;

    /// Stage-specific metrics describing the work done to reach this
    /// state. `None` for [`Pending`], which has done nothing yet.
    fn metrics(&self) -> Option<StageMetrics>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

impl PipelineStage for Normalized {
    const NAME: &str = "background";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        let dims = Dimensions::of(&self.image);
        let white_pixel_count = self
            .image
            .pixels()
            .filter(|p| **p == crate::background::WHITE)
            .count() as u64;
        Some(StageMetrics::Background {
            width: dims.width,
            height: dims.height,
            white_pixel_count,
        })
    }
}

impl PipelineStage for Smoothed {
    const NAME: &str = "denoise";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Denoise {
            window: self.ctx.config.median_window,
        })
    }
}

impl PipelineStage for Cropped {
    const NAME: &str = "crop";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        let dims = Dimensions::of(&self.cropped.image);
        let contour_points = self.cropped.contour.as_ref().map_or(0, Contour::len);
        Some(StageMetrics::Crop {
            rect: self.cropped.rect,
            contour_points,
            width: dims.width,
            height: dims.height,
        })
    }
}

impl PipelineStage for Clustered {
    const NAME: &str = "cluster";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Cluster {
            strategy: format!("{:?}", self.ctx.config.clusterer),
            requested: self.ctx.config.cluster_count,
            sizes: self.clustering.sizes(),
            inertia: self.clustering.inertia,
        })
    }
}

impl PipelineStage for RegionExtracted {
    const NAME: &str = "region";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Region {
            center_cluster: self.region.cluster,
            component: self.region.component,
            cleaned_area: mask::count(&self.region.cleaned),
            region_area: mask::count(&self.region.mask),
        })
    }
}

impl PipelineStage for Filled {
    const NAME: &str = "fill";
    const INDEX: usize = 6;

    fn metrics(&self) -> Option<StageMetrics> {
        let before = mask::count(&self.region.mask);
        let after = mask::count(&self.mask);
        Some(StageMetrics::Fill {
            filled_pixel_count: after - before,
            mask_area: after,
        })
    }
}

impl PipelineStage for Composited {
    const NAME: &str = "composite";
    const INDEX: usize = 7;

    fn metrics(&self) -> Option<StageMetrics> {
        let total = Dimensions::of(&self.composited).pixel_count();
        Some(StageMetrics::Composite {
            foreground_pixel_count: mask::count(&self.mask),
            background_pixel_count: total - mask::count(&self.mask),
        })
    }
}

impl PipelineStage for Extracted {
    const NAME: &str = "features";
    const INDEX: usize = 8;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Features {
            mask_source: self.ctx.config.mask_source,
            measured_area: mask::count(&self.feature_mask),
            record: self.record.clone(),
        })
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental segmentation and feature pipeline.
///
/// Created via [`Pipeline::new`], which stores the image and config
/// without doing any processing. Each stage method consumes the current
/// state and returns the next, making it a compile-time error to skip
/// stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a decoded image and config.
    ///
    /// No processing is performed; call
    /// [`.normalize_background()`](Pending::normalize_background) to
    /// begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image: RgbImage, config: PipelineConfig) -> Pending {
        Pending { config, image }
    }
}
