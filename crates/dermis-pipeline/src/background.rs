//! Background normalization: whiten near-black vignette pixels.
//!
//! Dermoscopy lenses leave a dark ring around the field of view. Those
//! pixels are close to black but rarely exactly black, so they are
//! selected with an HSV predicate (low hue band, low value) rather than
//! a pure luminance cutoff, then painted with the white sentinel.
//!
//! This is step 1 in the pipeline and the only stage that mutates its
//! input in place; it takes the image by value so no caller can observe
//! the pre-mutation pixels.

use image::{GrayImage, Rgb};

use crate::color::pixel_to_hsv;
use crate::mask::{BACKGROUND, FOREGROUND};
use crate::types::RgbImage;

/// The background sentinel color.
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Whether a pixel is vignette: hue in `[0, hue_max]` degrees and HSV
/// value (the largest channel) at most `threshold`.
#[must_use]
pub fn is_vignette(pixel: Rgb<u8>, hue_max: f32, threshold: u8) -> bool {
    let value = pixel.0[0].max(pixel.0[1]).max(pixel.0[2]);
    if value > threshold {
        return false;
    }
    pixel_to_hsv(pixel)[0] <= f64::from(hue_max)
}

/// Binary mask of the pixels [`is_vignette`] selects.
#[must_use = "returns the vignette mask"]
pub fn vignette_mask(image: &RgbImage, hue_max: f32, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if is_vignette(*image.get_pixel(x, y), hue_max, threshold) {
            image::Luma([FOREGROUND])
        } else {
            image::Luma([BACKGROUND])
        }
    })
}

/// Set every vignette pixel to [`WHITE`] and return the image.
///
/// Pixels outside the predicate are left untouched.
#[must_use = "returns the normalized image"]
pub fn normalize_background(mut image: RgbImage, hue_max: f32, threshold: u8) -> RgbImage {
    let mut whitened = 0_u64;
    for pixel in image.pixels_mut() {
        if is_vignette(*pixel, hue_max, threshold) {
            *pixel = WHITE;
            whitened += 1;
        }
    }
    log::debug!("background: whitened {whitened} vignette pixels");
    image
}
