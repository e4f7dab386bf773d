//! Noise suppression: median smoothing of the color image.
//!
//! Removes salt-and-pepper speckle (hairs' cut ends, sensor noise,
//! compression blocks) before the cropper looks for contours. Each
//! channel is filtered independently by
//! [`imageproc::filter::median_filter`].
//!
//! This is step 2 in the pipeline.

use crate::types::RgbImage;

/// Apply a `window x window` median filter.
///
/// `window` is expected to be odd; an even value behaves like the next
/// smaller odd window. A window of 1 (or 0) returns the image unchanged.
#[must_use = "returns the smoothed image"]
pub fn median_smooth(image: &RgbImage, window: u32) -> RgbImage {
    let radius = window / 2;
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}
