//! Contour extraction and contour geometry.
//!
//! Contours are traced with Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]. Only *external* borders are
//! kept: outer borders with no enclosing hole, i.e. the outline of each
//! top-level foreground blob. Both the region cropper and the shape
//! extractor rank contours with the measurements defined here.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::{Point, Rect};

/// A closed boundary: consecutive pixels of a blob's outline, with an
/// implicit edge from the last point back to the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a contour from boundary points in tracing order.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Enclosed area by the shoelace formula over the point polygon.
    ///
    /// Degenerate outlines (a single pixel, a one-pixel-wide line)
    /// enclose zero area.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.0.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.0[i];
                let b = self.0[(i + 1) % n];
                let (ax, ay) = (f64::from(a.x), f64::from(a.y));
                let (bx, by) = (f64::from(b.x), f64::from(b.y));
                ax.mul_add(by, -(bx * ay))
            })
            .sum();
        twice.abs() / 2.0
    }

    /// Closed arc length, including the edge back to the first point.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let n = self.0.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.0[i].distance(self.0[(i + 1) % n]))
            .sum()
    }

    /// Inclusive bounding box of the points.
    #[must_use]
    pub fn bounding_box(&self) -> Option<Rect> {
        Rect::enclosing(self.0.iter().copied())
    }

    /// Cropper ranking score, `perimeter + area`. Favors one large,
    /// detailed outline over many small noise blobs.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.perimeter() + self.area()
    }
}

/// Trace the external contours of a binary image (nonzero = foreground).
///
/// The image is traced inside a one-pixel background frame so that
/// blobs touching the image edge still report an outer border.
#[must_use = "returns the traced contours"]
pub fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    let (w, h) = binary.dimensions();
    let mut framed = GrayImage::new(w + 2, h + 2);
    image::imageops::replace(&mut framed, binary, 1, 1);

    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&framed);

    contours
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            Contour::new(
                c.points
                    .into_iter()
                    .map(|p| Point::new(p.x - 1, p.y - 1))
                    .collect(),
            )
        })
        .collect()
}

/// The contour maximizing `key`, first one winning ties.
#[must_use]
pub fn best_by(contours: &[Contour], key: impl Fn(&Contour) -> f64) -> Option<&Contour> {
    let mut best: Option<(&Contour, f64)> = None;
    for contour in contours {
        let value = key(contour);
        if best.is_none_or(|(_, b)| value > b) {
            best = Some((contour, value));
        }
    }
    best.map(|(c, _)| c)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled_rect(w: u32, h: u32, rect: Rect) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (rect.x..rect.right()).contains(&x) && (rect.y..rect.bottom()).contains(&y) {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    #[test]
    fn empty_image_produces_no_contours() {
        assert!(external_contours(&GrayImage::new(10, 10)).is_empty());
    }

    #[test]
    fn rectangle_outline_geometry() {
        let img = filled_rect(20, 20, Rect::new(5, 5, 10, 6));
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert_eq!(c.bounding_box().unwrap(), Rect::new(5, 5, 10, 6));
        // Outline runs through pixel centers: a 9x5 polygon.
        assert!((c.area() - 45.0).abs() < 1e-9, "area {}", c.area());
        assert!(
            (c.perimeter() - 28.0).abs() < 1e-9,
            "perimeter {}",
            c.perimeter()
        );
    }

    #[test]
    fn hole_outline_is_not_external() {
        // A ring: outer square with a hollow middle.
        let mut img = filled_rect(20, 20, Rect::new(2, 2, 16, 16));
        for y in 6..14 {
            for x in 6..14 {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1, "only the outer border is external");
        assert_eq!(contours[0].bounding_box().unwrap(), Rect::new(2, 2, 16, 16));
    }

    #[test]
    fn blob_inside_hole_is_not_external() {
        let mut img = filled_rect(30, 30, Rect::new(2, 2, 26, 26));
        for y in 6..24 {
            for x in 6..24 {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        for y in 12..16 {
            for x in 12..16 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
        assert_eq!(external_contours(&img).len(), 1);
    }

    #[test]
    fn single_pixel_has_zero_area_and_perimeter() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, image::Luma([255]));
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].area().abs() < f64::EPSILON);
        assert!(contours[0].perimeter().abs() < f64::EPSILON);
        assert_eq!(contours[0].bounding_box().unwrap(), Rect::new(2, 2, 1, 1));
    }

    #[test]
    fn best_by_score_prefers_large_blob() {
        let mut img = filled_rect(40, 40, Rect::new(10, 10, 15, 15));
        img.put_pixel(2, 2, image::Luma([255]));
        img.put_pixel(35, 35, image::Luma([255]));
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 3);
        let best = best_by(&contours, Contour::score).unwrap();
        assert_eq!(best.bounding_box().unwrap(), Rect::new(10, 10, 15, 15));
    }

    #[test]
    fn blob_touching_edge_is_external() {
        let img = filled_rect(20, 20, Rect::new(0, 0, 6, 6));
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box().unwrap(), Rect::new(0, 0, 6, 6));
        assert!((contours[0].area() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn full_image_has_one_outline() {
        let img = filled_rect(10, 8, Rect::new(0, 0, 10, 8));
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_box().unwrap(), Rect::new(0, 0, 10, 8));
        assert!((contours[0].perimeter() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn best_by_on_empty_is_none() {
        assert!(best_by(&[], Contour::area).is_none());
    }
}
