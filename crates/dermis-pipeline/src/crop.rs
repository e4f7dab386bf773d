//! Region cropping around the dominant dark blob.
//!
//! The grayscale image is blurred and binarized (darker than
//! `crop_threshold` is foreground), its external contours are traced,
//! and the contour with the highest `perimeter + area` score is taken
//! as the lesion outline. The image is cropped to that outline's
//! bounding box grown by `1 / zoom_factor` of its size on every side,
//! which re-centers the lesion for the central region extractor.
//!
//! Inside the crop a white ring of `ring_thickness` pixels is painted
//! along the outside of the outline, erasing shadows and vignette
//! residue that hug the lesion and would otherwise pull the clusterer.
//!
//! This is step 3 in the pipeline. With no contour the input is
//! returned unchanged.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;

use crate::background::WHITE;
use crate::contour::{self, Contour};
use crate::mask::{self, BACKGROUND, FOREGROUND};
use crate::types::{Dimensions, PipelineConfig, Rect, RgbImage};

/// Output of the region cropper.
#[derive(Debug, Clone)]
pub struct Cropped {
    /// The cropped (and ring-whitened) image.
    pub image: RgbImage,
    /// Crop rectangle in input coordinates; `None` on the fallback path.
    pub rect: Option<Rect>,
    /// The selected outline in input coordinates.
    pub contour: Option<Contour>,
}

/// Binarize for contour search: strictly darker than `threshold` is
/// foreground.
#[must_use = "returns the binary image"]
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] < threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Grow `bbox` by `bbox.width / zoom_factor` horizontally and
/// `bbox.height / zoom_factor` vertically on each side, clipped to
/// `bounds`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn expand_box(bbox: Rect, zoom_factor: f64, bounds: Dimensions) -> Rect {
    let margin_x = (f64::from(bbox.width) / zoom_factor) as u32;
    let margin_y = (f64::from(bbox.height) / zoom_factor) as u32;
    let x0 = bbox.x.saturating_sub(margin_x);
    let y0 = bbox.y.saturating_sub(margin_y);
    let x1 = bbox.right().saturating_add(margin_x).min(bounds.width);
    let y1 = bbox.bottom().saturating_add(margin_y).min(bounds.height);
    Rect::new(x0, y0, x1 - x0, y1 - y0)
}

/// Pixels within `thickness` (Chebyshev distance) of the outline that
/// lie outside the region it encloses, in crop coordinates.
#[must_use = "returns the ring mask"]
pub fn exterior_ring(contour: &Contour, crop: Rect, thickness: u32) -> GrayImage {
    let mut outline = GrayImage::new(crop.width, crop.height);
    if thickness == 0 {
        return outline;
    }
    for p in contour.points() {
        if p.x >= crop.x && p.y >= crop.y && p.x < crop.right() && p.y < crop.bottom() {
            outline.put_pixel(p.x - crop.x, p.y - crop.y, Luma([FOREGROUND]));
        }
    }
    let enclosed = crate::fill::fill_holes(&outline);
    let radius = u8::try_from(thickness).unwrap_or(u8::MAX);
    let band = imageproc::morphology::dilate(&outline, Norm::LInf, radius);
    GrayImage::from_fn(crop.width, crop.height, |x, y| {
        if mask::is_set(*band.get_pixel(x, y)) && !mask::is_set(*enclosed.get_pixel(x, y)) {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Find the dominant contour, crop around it, and whiten the ring.
#[must_use = "returns the cropped image"]
pub fn crop_region(image: &RgbImage, config: &PipelineConfig) -> Cropped {
    let gray = crate::grayscale::to_gray(image);
    let blurred = crate::blur::gaussian_blur(&gray, config.crop_blur_sigma);
    let binary = binarize(&blurred, config.crop_threshold);
    let contours = contour::external_contours(&binary);

    let Some(best) = contour::best_by(&contours, Contour::score) else {
        log::debug!("crop: no contour found, passing image through");
        return Cropped {
            image: image.clone(),
            rect: None,
            contour: None,
        };
    };
    let Some(bbox) = best.bounding_box() else {
        return Cropped {
            image: image.clone(),
            rect: None,
            contour: None,
        };
    };

    let rect = expand_box(bbox, config.zoom_factor, Dimensions::of(image));
    let mut cropped =
        image::imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();

    let ring = exterior_ring(best, rect, config.ring_thickness);
    for (x, y, cell) in ring.enumerate_pixels() {
        if mask::is_set(*cell) {
            cropped.put_pixel(x, y, WHITE);
        }
    }

    log::debug!(
        "crop: {} contours, best score {:.1}, box {bbox:?} -> crop {rect:?}, {} ring pixels",
        contours.len(),
        best.score(),
        mask::count(&ring),
    );

    Cropped {
        image: cropped,
        rect: Some(rect),
        contour: Some(best.clone()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgb;

    const SKIN: Rgb<u8> = Rgb([220, 190, 170]);
    const LESION: Rgb<u8> = Rgb([90, 40, 30]);

    fn lesion_at(w: u32, h: u32, cx: i64, cy: i64, r: i64) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
            if dx * dx + dy * dy <= r * r {
                LESION
            } else {
                SKIN
            }
        })
    }

    #[test]
    fn binarize_marks_dark_pixels() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[10, 127, 200][x as usize]]));
        let binary = binarize(&gray, 127);
        let cells: Vec<u8> = binary.pixels().map(|p| p.0[0]).collect();
        assert_eq!(cells, vec![FOREGROUND, BACKGROUND, BACKGROUND]);
    }

    #[test]
    fn expand_box_clips_to_bounds() {
        let bounds = Dimensions {
            width: 50,
            height: 40,
        };
        let grown = expand_box(Rect::new(2, 30, 20, 10), 2.0, bounds);
        assert_eq!(grown, Rect::new(0, 25, 32, 15));
        assert!(grown.fits_within(bounds));
    }

    #[test]
    fn uniform_image_passes_through() {
        let img = RgbImage::from_pixel(30, 30, SKIN);
        let out = crop_region(&img, &PipelineConfig::default());
        assert!(out.rect.is_none());
        assert!(out.contour.is_none());
        assert_eq!(out.image, img);
    }

    #[test]
    fn off_center_lesion_is_recentered() {
        let img = lesion_at(120, 100, 35, 40, 12);
        let out = crop_region(&img, &PipelineConfig::default());
        let rect = out.rect.unwrap();
        assert!(rect.fits_within(Dimensions::of(&img)));
        assert_eq!(out.image.dimensions(), (rect.width, rect.height));

        let center = Dimensions::of(&out.image).center();
        assert_eq!(*out.image.get_pixel(center.x, center.y), LESION);
    }

    #[test]
    fn crop_always_within_source_bounds() {
        // Lesion touching the top-left corner forces clipping.
        let img = lesion_at(60, 60, 3, 3, 10);
        for zoom in [0.5, 1.0, 5.0, 100.0] {
            let config = PipelineConfig {
                zoom_factor: zoom,
                ..PipelineConfig::default()
            };
            let out = crop_region(&img, &config);
            let rect = out.rect.unwrap();
            let bounds = Dimensions::of(&img);
            assert!(rect.fits_within(bounds), "zoom {zoom}: {rect:?}");
        }
    }

    #[test]
    fn lesion_touching_edge_is_found() {
        let img = lesion_at(80, 80, 0, 40, 15);
        let out = crop_region(&img, &PipelineConfig::default());
        let rect = out.rect.unwrap();
        assert!(out.contour.is_some());
        assert_eq!(rect.x, 0);
        assert!(rect.width < 40, "crop {rect:?}");

        let center = Dimensions::of(&out.image).center();
        assert_eq!(*out.image.get_pixel(center.x, center.y), LESION);
    }

    #[test]
    fn ring_whitens_outside_but_keeps_lesion() {
        let img = lesion_at(100, 100, 50, 50, 15);
        let out = crop_region(&img, &PipelineConfig::default());
        let rect = out.rect.unwrap();

        let mut lesion_pixels = 0;
        let mut lesion_whitened = 0;
        let mut white_pixels = 0;
        for (x, y, px) in out.image.enumerate_pixels() {
            let (sx, sy) = (x + rect.x, y + rect.y);
            let src = img.get_pixel(sx, sy);
            if *src == LESION {
                lesion_pixels += 1;
                if px != src {
                    lesion_whitened += 1;
                }
                // Well inside the outline nothing is touched.
                let (dx, dy) = (i64::from(sx) - 50, i64::from(sy) - 50);
                if dx * dx + dy * dy <= 13 * 13 {
                    assert_eq!(px, src, "interior pixel ({x},{y}) modified");
                }
            }
            if *px == WHITE {
                white_pixels += 1;
            }
        }
        assert!(lesion_pixels > 600);
        assert!(
            lesion_whitened * 20 < lesion_pixels,
            "{lesion_whitened} of {lesion_pixels} lesion pixels whitened",
        );
        assert!(white_pixels > 0, "expected a whitened ring");
    }

    #[test]
    fn zero_ring_thickness_paints_nothing() {
        let img = lesion_at(100, 100, 50, 50, 15);
        let config = PipelineConfig {
            ring_thickness: 0,
            ..PipelineConfig::default()
        };
        let out = crop_region(&img, &config);
        assert!(out.image.pixels().all(|p| *p != WHITE));
    }
}
