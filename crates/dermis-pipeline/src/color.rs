//! Color feature extraction.
//!
//! Region pixels are converted to HSV and CIE L\*a\*b\* (D65) through
//! [`palette`] and averaged channel by channel. Hue is averaged
//! arithmetically in degrees, not on the circle.

use image::Rgb;
use palette::white_point::D65;
use palette::{FromColor, Hsv, Lab, Srgb};

use crate::mask;
use crate::types::{ColorFeatures, GrayImage, RgbImage};

fn to_srgb(pixel: Rgb<u8>) -> Srgb<f32> {
    Srgb::new(pixel.0[0], pixel.0[1], pixel.0[2]).into_format()
}

/// HSV of one pixel: hue in degrees `[0, 360)`, saturation and value in
/// `[0, 1]`. Achromatic pixels report hue 0.
#[must_use]
pub fn pixel_to_hsv(pixel: Rgb<u8>) -> [f64; 3] {
    let hsv: Hsv<palette::encoding::Srgb, f32> = Hsv::from_color(to_srgb(pixel));
    [
        f64::from(hsv.hue.into_positive_degrees()),
        f64::from(hsv.saturation),
        f64::from(hsv.value),
    ]
}

/// CIE L\*a\*b\* of one pixel under a D65 white point.
#[must_use]
pub fn pixel_to_lab(pixel: Rgb<u8>) -> [f64; 3] {
    let lab: Lab<D65, f32> = Lab::from_color(to_srgb(pixel));
    [f64::from(lab.l), f64::from(lab.a), f64::from(lab.b)]
}

/// Channel means of the pixels under `mask` in both color spaces.
///
/// An empty mask yields two zero vectors.
#[must_use = "returns the color features"]
#[allow(clippy::cast_precision_loss)]
pub fn extract_color(image: &RgbImage, mask: &GrayImage) -> ColorFeatures {
    let mut hsv_sum = [0.0_f64; 3];
    let mut lab_sum = [0.0_f64; 3];
    let mut n = 0_u64;

    for (pixel, cell) in image.pixels().zip(mask.pixels()) {
        if !mask::is_set(*cell) {
            continue;
        }
        let hsv = pixel_to_hsv(*pixel);
        let lab = pixel_to_lab(*pixel);
        for c in 0..3 {
            hsv_sum[c] += hsv[c];
            lab_sum[c] += lab[c];
        }
        n += 1;
    }

    if n == 0 {
        log::debug!("color: empty region, reporting zeros");
        return ColorFeatures::default();
    }
    let n = n as f64;
    ColorFeatures {
        hsv: hsv_sum.map(|s| s / n),
        lab: lab_sum.map(|s| s / n),
    }
}
