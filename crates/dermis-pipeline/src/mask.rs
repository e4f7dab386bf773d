//! Binary mask helpers.
//!
//! A mask is a [`GrayImage`] with the same dimensions as the image it
//! was derived from, holding only [`FOREGROUND`] or [`BACKGROUND`].
//! Any nonzero value is read as foreground, matching `imageproc`'s
//! binary morphology and contour conventions.

use image::{GrayImage, Luma};

use crate::types::{LabelMap, Point, Rect};

/// Foreground cell value.
pub const FOREGROUND: u8 = 255;

/// Background cell value.
pub const BACKGROUND: u8 = 0;

/// Whether a mask cell is foreground.
#[must_use]
pub const fn is_set(cell: Luma<u8>) -> bool {
    cell.0[0] != BACKGROUND
}

/// Mask selecting every cell of `labels` equal to `label`.
#[must_use = "returns the label mask"]
pub fn from_labels(labels: &LabelMap, label: u32) -> GrayImage {
    GrayImage::from_fn(labels.width(), labels.height(), |x, y| {
        if labels.get_pixel(x, y).0[0] == label {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Number of foreground cells.
#[must_use]
pub fn count(mask: &GrayImage) -> u64 {
    mask.pixels().map(|&p| u64::from(is_set(p))).sum()
}

/// Whether the mask has no foreground cells.
#[must_use]
pub fn is_empty(mask: &GrayImage) -> bool {
    !mask.pixels().any(|&p| is_set(p))
}

/// Tight bounding box of the foreground, or `None` for an empty mask.
#[must_use]
pub fn bounding_box(mask: &GrayImage) -> Option<Rect> {
    Rect::enclosing(
        mask.enumerate_pixels()
            .filter(|(_, _, p)| is_set(**p))
            .map(|(x, y, _)| Point::new(x, y)),
    )
}

/// Cell-wise complement.
#[must_use = "returns the inverted mask"]
pub fn invert(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if is_set(*mask.get_pixel(x, y)) {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Cell-wise OR of two masks of equal dimensions.
#[must_use = "returns the combined mask"]
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions(), "mask dimensions differ");
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        if is_set(*a.get_pixel(x, y)) || is_set(*b.get_pixel(x, y)) {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Whether every foreground cell of `inner` is also foreground in `outer`.
#[must_use]
pub fn is_subset(inner: &GrayImage, outer: &GrayImage) -> bool {
    inner.dimensions() == outer.dimensions()
        && inner
            .pixels()
            .zip(outer.pixels())
            .all(|(&i, &o)| !is_set(i) || is_set(o))
}
