//! Segmented compositing and the white-sentinel mask rule.
//!
//! The composited image keeps the source pixels inside the mask and is
//! [`WHITE`] everywhere else. [`recover_mask`] inverts that: any pixel
//! equal to the sentinel is background. The round trip loses lesion
//! pixels that are themselves pure white, which is why the pipeline
//! threads the explicit mask by default (see [`MaskSource`]).
//!
//! [`MaskSource`]: crate::types::MaskSource

use image::Luma;

use crate::background::WHITE;
use crate::mask::{self, BACKGROUND, FOREGROUND};
use crate::types::{GrayImage, RgbImage};

/// Copy of `image` with every pixel outside `mask` set to [`WHITE`].
#[must_use = "returns the composited image"]
pub fn composite(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    debug_assert_eq!(
        image.dimensions(),
        mask.dimensions(),
        "mask dimensions differ"
    );
    let mut out = image.clone();
    for (pixel, cell) in out.pixels_mut().zip(mask.pixels()) {
        if !mask::is_set(*cell) {
            *pixel = WHITE;
        }
    }
    out
}

/// Foreground wherever `composited` is not the white sentinel.
#[must_use = "returns the recovered mask"]
pub fn recover_mask(composited: &RgbImage) -> GrayImage {
    GrayImage::from_fn(composited.width(), composited.height(), |x, y| {
        if *composited.get_pixel(x, y) == WHITE {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}
