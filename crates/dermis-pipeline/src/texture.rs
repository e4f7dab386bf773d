//! Texture feature extraction from a gray-level co-occurrence matrix.
//!
//! The composited image is converted to grayscale and cropped to the
//! tight bounding box of the mask. Gray values are quantized to
//! [`LEVELS`] bins and horizontally adjacent pairs (offset `(1, 0)`)
//! are tallied into a symmetric, normalized matrix. Every pixel of the
//! box takes part, including any sentinel-white background caught in
//! it.

use crate::mask;
use crate::types::{GrayImage, RgbImage, TextureFeatures};

/// Number of quantized gray levels.
pub const LEVELS: usize = 8;

/// A normalized, symmetric co-occurrence matrix. `p[i][j]` is the
/// probability of level `i` sitting next to level `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct Glcm {
    p: [[f64; LEVELS]; LEVELS],
}

impl Glcm {
    /// Tally horizontal neighbor pairs of `gray`. Returns `None` when
    /// the image has no such pair (width below 2).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn horizontal(gray: &GrayImage) -> Option<Self> {
        let mut counts = [[0_u64; LEVELS]; LEVELS];
        let mut total = 0_u64;
        for y in 0..gray.height() {
            for x in 1..gray.width() {
                let a = quantize(gray.get_pixel(x - 1, y).0[0]);
                let b = quantize(gray.get_pixel(x, y).0[0]);
                counts[a][b] += 1;
                counts[b][a] += 1;
                total += 2;
            }
        }
        if total == 0 {
            return None;
        }
        let total = total as f64;
        Some(Self {
            p: counts.map(|row| row.map(|c| c as f64 / total)),
        })
    }

    /// Probability of the level pair `(i, j)`.
    #[must_use]
    pub const fn get(&self, i: usize, j: usize) -> f64 {
        self.p[i][j]
    }

    /// `sum f(i, j) * P(i, j)` over all level pairs.
    #[allow(clippy::cast_precision_loss)]
    fn weighted_sum(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut sum = 0.0;
        for (i, row) in self.p.iter().enumerate() {
            for (j, &p) in row.iter().enumerate() {
                let d = i as f64 - j as f64;
                sum += f(d) * p;
            }
        }
        sum
    }

    /// The four second-order statistics.
    #[must_use]
    pub fn features(&self) -> TextureFeatures {
        let asm: f64 = self.p.iter().flatten().map(|p| p * p).sum();
        TextureFeatures {
            contrast: self.weighted_sum(|d| d * d),
            dissimilarity: self.weighted_sum(f64::abs),
            homogeneity: self.weighted_sum(|d| 1.0 / d.mul_add(d, 1.0)),
            energy: asm.sqrt(),
        }
    }
}

/// Map a 0-255 gray value to one of [`LEVELS`] bins.
#[must_use]
pub const fn quantize(value: u8) -> usize {
    value as usize * LEVELS / 256
}

/// Texture statistics of the region under `mask`.
///
/// An empty mask, or a bounding box too narrow to hold a pixel pair,
/// yields four zeros.
#[must_use = "returns the texture features"]
pub fn extract_texture(composited: &RgbImage, mask: &GrayImage) -> TextureFeatures {
    let Some(bbox) = mask::bounding_box(mask) else {
        log::debug!("texture: empty region, reporting zeros");
        return TextureFeatures::default();
    };
    let gray = crate::grayscale::to_gray(composited);
    let roi = image::imageops::crop_imm(&gray, bbox.x, bbox.y, bbox.width, bbox.height).to_image();

    Glcm::horizontal(&roi).map_or_else(
        || {
            log::debug!("texture: region {bbox:?} has no horizontal pairs, reporting zeros");
            TextureFeatures::default()
        },
        |glcm| glcm.features(),
    )
}
