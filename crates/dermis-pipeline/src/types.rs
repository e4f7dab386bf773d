//! Shared types for the dermis segmentation and feature pipeline.

use serde::{Deserialize, Serialize};

use crate::cluster::ClustererKind;

/// Re-export `GrayImage` so downstream crates can reference masks and
/// grayscale intermediates without depending on `image` directly.
///
/// Binary masks use [`mask::FOREGROUND`](crate::mask::FOREGROUND) (255)
/// and [`mask::BACKGROUND`](crate::mask::BACKGROUND) (0).
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can hand decoded images to
/// the pipeline without depending on `image` directly.
pub use image::RgbImage;

/// Per-pixel integer labels, same dimensions as the image they describe.
///
/// Used both for cluster ids (in `[0, k)`) and connected-component ids
/// (0 = background, components numbered from 1).
pub type LabelMap = image::ImageBuffer<image::Luma<u32>, Vec<u32>>;

/// A 2D integer point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Column (pixels from left edge).
    pub x: u32,
    /// Row (pixels from top edge).
    pub y: u32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

/// An axis-aligned pixel rectangle. `width` and `height` count pixels,
/// so a single pixel has a 1x1 rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether this rectangle lies entirely within `dimensions`.
    #[must_use]
    pub const fn fits_within(&self, dimensions: Dimensions) -> bool {
        self.right() <= dimensions.width && self.bottom() <= dimensions.height
    }

    /// Smallest rectangle enclosing every point, or `None` if there are
    /// no points.
    #[must_use]
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// The center pixel, `(width / 2, height / 2)`.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether either side is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Where the feature extractors obtain the region-of-interest mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskSource {
    /// Use the mask produced by the hole filler directly.
    ///
    /// Lesion pixels that happen to be pure white stay in the region.
    #[default]
    Explicit,
    /// Re-derive the mask from the composited image: every pixel equal
    /// to the white sentinel is background.
    WhiteSentinel,
}

/// Configuration for the segmentation and feature pipeline.
///
/// Every tunable threshold lives here; no stage reads ambient state.
/// Defaults are exposed as `DEFAULT_*` constants so front ends cannot
/// drift from the library.
///
/// Call [`validate`](Self::validate) before running the pipeline on a
/// hand-built or deserialized config; [`crate::process`] does so itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound (degrees, inclusive) of the hue band treated as
    /// vignette by the background normalizer. The band starts at 0.
    pub background_hue_max: f32,

    /// Maximum HSV value (0-255 scale, inclusive) of a vignette pixel.
    pub background_threshold: u8,

    /// Median filter window size in pixels. Must be odd.
    pub median_window: u32,

    /// Gaussian sigma applied to the grayscale image before the
    /// cropper binarizes it. `0.0` disables the blur.
    pub crop_blur_sigma: f32,

    /// Cropper binarization level: gray values strictly below this are
    /// foreground (lesions are darker than skin).
    pub crop_threshold: u8,

    /// The crop expands the contour's bounding box by
    /// `box_width / zoom_factor` and `box_height / zoom_factor` per side.
    pub zoom_factor: f64,

    /// Thickness in pixels of the white ring painted along the outside
    /// of the selected contour. `0` disables the ring.
    pub ring_thickness: u32,

    /// Which clustering algorithm to use.
    pub clusterer: ClustererKind,

    /// Number of pixel clusters.
    pub cluster_count: usize,

    /// Seed for clustering initialization.
    pub cluster_seed: u64,

    /// Number of independently seeded clustering runs; the run with the
    /// lowest inertia wins.
    pub cluster_restarts: usize,

    /// Iteration cap for a single clustering run.
    pub cluster_max_iterations: usize,

    /// A run stops early once no centroid moves farther than this
    /// (in 0-255 color units).
    pub cluster_tolerance: f32,

    /// Side of the square structuring element used by the central
    /// region extractor's opening and closing. Must be odd.
    pub kernel_size: u32,

    /// Where the feature extractors read the region mask from.
    pub mask_source: MaskSource,
}

impl PipelineConfig {
    /// Default background hue band upper bound (degrees).
    pub const DEFAULT_BACKGROUND_HUE_MAX: f32 = 50.0;
    /// Default background value threshold.
    pub const DEFAULT_BACKGROUND_THRESHOLD: u8 = 40;
    /// Default median window.
    pub const DEFAULT_MEDIAN_WINDOW: u32 = 5;
    /// Default cropper blur sigma (about a 5x5 kernel).
    pub const DEFAULT_CROP_BLUR_SIGMA: f32 = 1.1;
    /// Default cropper binarization level.
    pub const DEFAULT_CROP_THRESHOLD: u8 = 127;
    /// Default zoom margin factor.
    pub const DEFAULT_ZOOM_FACTOR: f64 = 5.0;
    /// Default ring thickness.
    pub const DEFAULT_RING_THICKNESS: u32 = 3;
    /// Default cluster count.
    pub const DEFAULT_CLUSTER_COUNT: usize = 2;
    /// Default clustering seed.
    pub const DEFAULT_CLUSTER_SEED: u64 = 0;
    /// Default number of clustering restarts.
    pub const DEFAULT_CLUSTER_RESTARTS: usize = 10;
    /// Default per-run iteration cap.
    pub const DEFAULT_CLUSTER_MAX_ITERATIONS: usize = 300;
    /// Default centroid convergence tolerance.
    pub const DEFAULT_CLUSTER_TOLERANCE: f32 = 1e-3;
    /// Default structuring element size.
    pub const DEFAULT_KERNEL_SIZE: u32 = 3;

    /// Check every field for values the stages cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(0.0..=360.0).contains(&self.background_hue_max) {
            return invalid(format!(
                "background_hue_max must be within [0, 360], got {}",
                self.background_hue_max
            ));
        }
        if self.median_window == 0 || self.median_window % 2 == 0 {
            return invalid(format!(
                "median_window must be a positive odd number, got {}",
                self.median_window
            ));
        }
        if !self.crop_blur_sigma.is_finite() || self.crop_blur_sigma < 0.0 {
            return invalid(format!(
                "crop_blur_sigma must be finite and non-negative, got {}",
                self.crop_blur_sigma
            ));
        }
        if !self.zoom_factor.is_finite() || self.zoom_factor <= 0.0 {
            return invalid(format!(
                "zoom_factor must be finite and positive, got {}",
                self.zoom_factor
            ));
        }
        if self.cluster_count == 0 {
            return invalid("cluster_count must be at least 1".to_string());
        }
        if self.cluster_restarts == 0 {
            return invalid("cluster_restarts must be at least 1".to_string());
        }
        if self.cluster_max_iterations == 0 {
            return invalid("cluster_max_iterations must be at least 1".to_string());
        }
        if !self.cluster_tolerance.is_finite() || self.cluster_tolerance < 0.0 {
            return invalid(format!(
                "cluster_tolerance must be finite and non-negative, got {}",
                self.cluster_tolerance
            ));
        }
        // The morphology radius is carried as a u8.
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 || self.kernel_size > 511 {
            return invalid(format!(
                "kernel_size must be an odd number in [1, 511], got {}",
                self.kernel_size
            ));
        }
        if self.ring_thickness > 255 {
            return invalid(format!(
                "ring_thickness must be at most 255, got {}",
                self.ring_thickness
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            background_hue_max: Self::DEFAULT_BACKGROUND_HUE_MAX,
            background_threshold: Self::DEFAULT_BACKGROUND_THRESHOLD,
            median_window: Self::DEFAULT_MEDIAN_WINDOW,
            crop_blur_sigma: Self::DEFAULT_CROP_BLUR_SIGMA,
            crop_threshold: Self::DEFAULT_CROP_THRESHOLD,
            zoom_factor: Self::DEFAULT_ZOOM_FACTOR,
            ring_thickness: Self::DEFAULT_RING_THICKNESS,
            clusterer: ClustererKind::default(),
            cluster_count: Self::DEFAULT_CLUSTER_COUNT,
            cluster_seed: Self::DEFAULT_CLUSTER_SEED,
            cluster_restarts: Self::DEFAULT_CLUSTER_RESTARTS,
            cluster_max_iterations: Self::DEFAULT_CLUSTER_MAX_ITERATIONS,
            cluster_tolerance: Self::DEFAULT_CLUSTER_TOLERANCE,
            kernel_size: Self::DEFAULT_KERNEL_SIZE,
            mask_source: MaskSource::default(),
        }
    }
}

/// Mean color of the region of interest in two color spaces.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorFeatures {
    /// HSV means: hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
    pub hsv: [f64; 3],
    /// CIE L\*a\*b\* (D65) means: `L` in `[0, 100]`, `a`/`b` roughly `[-128, 127]`.
    pub lab: [f64; 3],
}

/// Second-order statistics of the region's gray-level co-occurrence matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TextureFeatures {
    /// `sum P(i,j) (i-j)^2`
    pub contrast: f64,
    /// `sum P(i,j) |i-j|`
    pub dissimilarity: f64,
    /// `sum P(i,j) / (1 + (i-j)^2)`
    pub homogeneity: f64,
    /// `sqrt(sum P(i,j)^2)`
    pub energy: f64,
}

/// Geometry of the region's dominant outer contour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeFeatures {
    /// Foreground pixel count of the whole mask.
    pub area: f64,
    /// Closed arc length of the largest contour.
    pub perimeter: f64,
    /// Bounding-box width divided by height (0 when height is 0).
    pub aspect_ratio: f64,
}

/// The fixed-order descriptor produced for one image.
///
/// Immutable once built; serialize it or feed [`values`](Self::values)
/// to a table writer using [`COLUMNS`](Self::COLUMNS) as the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Caller-supplied source identifier (usually a file name).
    pub id: String,
    /// Color means.
    pub color: ColorFeatures,
    /// Texture statistics.
    pub texture: TextureFeatures,
    /// Shape measurements.
    pub shape: ShapeFeatures,
}

impl FeatureRecord {
    /// Column names, identifier first, in record order.
    pub const COLUMNS: [&'static str; 14] = [
        "image",
        "hsv_h",
        "hsv_s",
        "hsv_v",
        "lab_l",
        "lab_a",
        "lab_b",
        "contrast",
        "dissimilarity",
        "homogeneity",
        "energy",
        "area",
        "perimeter",
        "aspect_ratio",
    ];

    /// The 13 numeric fields in [`COLUMNS`](Self::COLUMNS) order
    /// (excluding the identifier).
    #[must_use]
    pub const fn values(&self) -> [f64; 13] {
        let c = &self.color;
        let t = &self.texture;
        let s = &self.shape;
        [
            c.hsv[0],
            c.hsv[1],
            c.hsv[2],
            c.lab[0],
            c.lab[1],
            c.lab[2],
            t.contrast,
            t.dissimilarity,
            t.homogeneity,
            t.energy,
            s.area,
            s.perimeter,
            s.aspect_ratio,
        ]
    }
}

/// Result of running the pipeline with the intermediates preserved.
///
/// Carries what an observer needs to render the post-crop image next
/// to the segmentation, plus the masks behind the record.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Dimensions of the input image.
    pub source_dimensions: Dimensions,
    /// Crop rectangle in source coordinates (`None` when no contour
    /// was found and the image passed through unchanged).
    pub crop: Option<Rect>,
    /// Image after background normalization, smoothing, and cropping.
    pub cropped: RgbImage,
    /// Cluster label of every cropped pixel.
    pub labels: LabelMap,
    /// The cluster id observed at the center pixel.
    pub center_cluster: u32,
    /// Connected component covering the center, after cleanup.
    pub region: GrayImage,
    /// Final mask after hole filling.
    pub mask: GrayImage,
    /// Cropped image with everything outside `mask` set to white.
    pub composited: RgbImage,
    /// The extracted descriptor.
    pub record: FeatureRecord,
}

/// Errors that can occur during pipeline processing.
///
/// Degenerate image content never produces an error; see the stage
/// modules for their fallbacks.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image bytes.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image has zero width or height (or no bytes).
    #[error("input image is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
