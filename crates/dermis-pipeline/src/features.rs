//! Feature record assembly: step 8 in the pipeline.

use crate::types::{FeatureRecord, GrayImage, RgbImage};

/// Run the color, texture and shape extractors against one region.
///
/// `composited` supplies the pixels and `mask` the region; both must
/// have the same dimensions.
#[must_use = "returns the feature record"]
pub fn extract_features(
    id: impl Into<String>,
    composited: &RgbImage,
    mask: &GrayImage,
) -> FeatureRecord {
    FeatureRecord {
        id: id.into(),
        color: crate::color::extract_color(composited, mask),
        texture: crate::texture::extract_texture(composited, mask),
        shape: crate::shape::extract_shape(mask),
    }
}
