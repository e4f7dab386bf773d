//! dermis-pipeline: lesion segmentation and feature extraction (sans-IO).
//!
//! Turns one decoded dermoscopic image into a fixed-order
//! [`FeatureRecord`] through:
//! background normalization -> median smoothing -> region crop ->
//! pixel clustering -> central region extraction -> hole filling ->
//! compositing -> color, texture and shape features.
//!
//! This crate has **no I/O dependencies** beyond an optional byte
//! decoder ([`grayscale::decode`]). Dataset iteration, table writing and
//! display belong to the caller. Each image is processed independently,
//! so a batch driver can run one pipeline per image in parallel.

pub mod background;
pub mod blur;
pub mod cluster;
pub mod color;
pub mod composite;
pub mod contour;
pub mod crop;
pub mod denoise;
pub mod diagnostics;
pub mod features;
pub mod fill;
pub mod grayscale;
pub mod mask;
pub mod pipeline;
pub mod region;
pub mod shape;
pub mod texture;
pub mod types;

pub use cluster::{ClustererKind, Clustering, PixelClusterer};
pub use pipeline::Pipeline;
pub use types::{
    ColorFeatures, Dimensions, FeatureRecord, GrayImage, LabelMap, MaskSource, PipelineConfig,
    PipelineError, Point, Rect, RgbImage, ShapeFeatures, StagedResult, TextureFeatures,
};

/// Run the full pipeline and keep every intermediate.
///
/// # Pipeline steps
///
/// 1. Background normalization (vignette to white)
/// 2. Median smoothing
/// 3. Region crop around the dominant dark contour, exterior ring whitened
/// 4. Pixel clustering (pluggable strategy)
/// 5. Central region extraction (opening, closing, center component)
/// 6. Hole filling
/// 7. Compositing onto white
/// 8. Color, texture and shape features
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`].
/// Returns [`PipelineError::EmptyInput`] if `image` has zero width or height.
/// Degenerate content (no contour, empty region) never errors; it yields
/// the documented zero features instead.
pub fn process_staged(
    id: &str,
    image: RgbImage,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    let staged = Pipeline::new(image, config.clone())
        .normalize_background()?
        .suppress_noise()
        .crop()
        .cluster()
        .extract_central_region()
        .fill_holes()
        .composite()
        .extract_features(id)
        .into_result();
    log::debug!(
        "{id}: mask area {} of {}x{} crop",
        mask::count(&staged.mask),
        staged.cropped.width(),
        staged.cropped.height(),
    );
    Ok(staged)
}

/// Run the full pipeline and return only the feature record.
///
/// # Errors
///
/// Same as [`process_staged`].
pub fn process(
    id: &str,
    image: RgbImage,
    config: &PipelineConfig,
) -> Result<FeatureRecord, PipelineError> {
    process_staged(id, image, config).map(|staged| staged.record)
}
