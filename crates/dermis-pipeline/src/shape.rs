//! Shape feature extraction.

use crate::contour::{self, Contour};
use crate::mask;
use crate::types::{GrayImage, ShapeFeatures};

/// Area, perimeter and aspect ratio of the region under `mask`.
///
/// Area counts every foreground pixel. Perimeter and aspect ratio come
/// from the external contour enclosing the largest area, and are zero
/// when there is no contour.
#[must_use = "returns the shape features"]
#[allow(clippy::cast_precision_loss)]
pub fn extract_shape(mask: &GrayImage) -> ShapeFeatures {
    let area = mask::count(mask) as f64;
    let contours = contour::external_contours(mask);
    let Some(largest) = contour::best_by(&contours, Contour::area) else {
        log::debug!("shape: no contour, area {area}");
        return ShapeFeatures {
            area,
            ..ShapeFeatures::default()
        };
    };

    let aspect_ratio = largest.bounding_box().map_or(0.0, |b| {
        if b.height == 0 {
            0.0
        } else {
            f64::from(b.width) / f64::from(b.height)
        }
    });

    ShapeFeatures {
        area,
        perimeter: largest.perimeter(),
        aspect_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::FOREGROUND;
    use image::Luma;

    fn rect_mask(w: u32, h: u32, x0: u32, y0: u32, rw: u32, rh: u32) -> GrayImage {
        let mut m = GrayImage::new(w, h);
        for y in y0..y0 + rh {
            for x in x0..x0 + rw {
                m.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        m
    }

    #[test]
    fn empty_mask_is_all_zero() {
        let s = extract_shape(&GrayImage::new(12, 7));
        assert_eq!(s, ShapeFeatures::default());
    }

    #[test]
    fn rectangle_measurements() {
        let s = extract_shape(&rect_mask(30, 30, 4, 6, 12, 4));
        assert!((s.area - 48.0).abs() < f64::EPSILON);
        // Outline through pixel centers: 11 + 3 + 11 + 3.
        assert!((s.perimeter - 28.0).abs() < 1e-9, "{}", s.perimeter);
        assert!((s.aspect_ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn area_counts_all_blobs_but_perimeter_uses_largest() {
        let mut m = rect_mask(40, 40, 2, 2, 10, 10);
        for y in 30..33 {
            for x in 30..33 {
                m.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let s = extract_shape(&m);
        assert!((s.area - 109.0).abs() < f64::EPSILON);
        assert!((s.perimeter - 36.0).abs() < 1e-9);
        assert!((s.aspect_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_pixel_region() {
        let s = extract_shape(&rect_mask(5, 5, 2, 2, 1, 1));
        assert!((s.area - 1.0).abs() < f64::EPSILON);
        assert!(s.perimeter.abs() < f64::EPSILON);
        assert!((s.aspect_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn region_touching_the_edge_is_measured() {
        let s = extract_shape(&rect_mask(20, 20, 0, 0, 6, 6));
        assert!((s.area - 36.0).abs() < f64::EPSILON);
        assert!((s.perimeter - 20.0).abs() < 1e-9, "{}", s.perimeter);
        assert!((s.aspect_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn full_mask_is_measured() {
        let s = extract_shape(&rect_mask(10, 8, 0, 0, 10, 8));
        assert!((s.area - 80.0).abs() < f64::EPSILON);
        assert!((s.perimeter - 32.0).abs() < 1e-9);
        assert!((s.aspect_ratio - 1.25).abs() < 1e-9);
    }
}
