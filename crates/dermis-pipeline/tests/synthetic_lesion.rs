//! Integration test: run synthetic dermoscopy-like images through the full
//! pipeline and check the segmentation and features end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use dermis_pipeline::{
    FeatureRecord, MaskSource, PipelineConfig, RgbImage, StagedResult, mask, process,
    process_staged,
};
use image::Rgb;

const SKIN: Rgb<u8> = Rgb([205, 170, 150]);
const LESION: Rgb<u8> = Rgb([95, 48, 36]);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn in_disk(x: u32, y: u32, cx: i64, cy: i64, r: i64) -> bool {
    let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
    dx * dx + dy * dy <= r * r
}

/// A `w x h` skin field with a lesion disk of radius `r` at `(cx, cy)`.
fn disk_image(w: u32, h: u32, cx: i64, cy: i64, r: i64) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        if in_disk(x, y, cx, cy, r) {
            LESION
        } else {
            SKIN
        }
    })
}

fn within(value: f64, target: f64, fraction: f64) -> bool {
    (value - target).abs() <= target * fraction
}

fn run(image: RgbImage) -> StagedResult {
    process_staged("synthetic.png", image, &PipelineConfig::default())
        .expect("pipeline should succeed")
}

#[test]
fn centered_disk_area_and_aspect_ratio() {
    init_logging();
    let staged = run(disk_image(100, 100, 50, 50, 20));
    let expected_area = std::f64::consts::PI * 400.0;

    let shape = staged.record.shape;
    assert!(
        within(shape.area, expected_area, 0.05),
        "area {} not within 5% of {expected_area:.0}",
        shape.area,
    );
    assert!(
        within(shape.aspect_ratio, 1.0, 0.05),
        "aspect ratio {}",
        shape.aspect_ratio,
    );
    assert!(
        shape.perimeter > 100.0 && shape.perimeter < 140.0,
        "perimeter {}",
        shape.perimeter,
    );

    // The region is the lesion: its mean color is the lesion color.
    let lab = dermis_pipeline::color::pixel_to_lab(LESION);
    for c in 0..3 {
        assert!((staged.record.color.lab[c] - lab[c]).abs() < 0.5);
    }
}

#[test]
fn uniform_image_takes_every_fallback() {
    init_logging();
    let color = Rgb([200, 170, 150]);
    let staged = run(RgbImage::from_pixel(50, 40, color));

    // No contour: the crop is the input, unchanged.
    assert!(staged.crop.is_none());
    assert_eq!(staged.cropped, RgbImage::from_pixel(50, 40, color));

    // Clustering collapses to a single populated cluster covering everything.
    let center = staged.center_cluster;
    assert!(staged.labels.pixels().all(|l| l.0[0] == center));

    let record = &staged.record;
    let hsv = dermis_pipeline::color::pixel_to_hsv(color);
    let lab = dermis_pipeline::color::pixel_to_lab(color);
    for c in 0..3 {
        assert!((record.color.hsv[c] - hsv[c]).abs() < 1e-6);
        assert!((record.color.lab[c] - lab[c]).abs() < 1e-6);
    }
    assert!(record.texture.contrast.abs() < 1e-12);
    assert!(record.texture.dissimilarity.abs() < 1e-12);
    assert!((record.texture.homogeneity - 1.0).abs() < 1e-12);
    assert!((record.texture.energy - 1.0).abs() < 1e-12);
    assert!((record.shape.area - 2000.0).abs() < f64::EPSILON);
}

#[test]
fn masks_match_cropped_image_dimensions() {
    let staged = run(disk_image(90, 70, 40, 30, 14));
    let dims = staged.cropped.dimensions();
    assert_eq!(staged.labels.dimensions(), dims);
    assert_eq!(staged.region.dimensions(), dims);
    assert_eq!(staged.mask.dimensions(), dims);
    assert_eq!(staged.composited.dimensions(), dims);
}

#[test]
fn crop_stays_within_source() {
    // Lesion pressed into a corner so the margin must be clipped.
    let staged = run(disk_image(80, 80, 10, 12, 9));
    let rect = staged.crop.expect("lesion should be found");
    assert!(rect.fits_within(staged.source_dimensions));
}

#[test]
fn off_center_lesion_is_recentered_and_measured() {
    let staged = run(disk_image(140, 110, 40, 38, 15));
    let expected_area = std::f64::consts::PI * 225.0;
    assert!(
        within(staged.record.shape.area, expected_area, 0.05),
        "area {}",
        staged.record.shape.area,
    );
}

#[test]
fn lesion_touching_image_border_is_measured() {
    let img = disk_image(100, 100, 0, 50, 25);
    let lesion_pixels = img.pixels().filter(|p| **p == LESION).count();
    let staged = run(img);

    let rect = staged.crop.expect("lesion should be found");
    assert_eq!(rect.x, 0);

    #[allow(clippy::cast_precision_loss)]
    let expected_area = lesion_pixels as f64;
    let shape = staged.record.shape;
    assert!(
        within(shape.area, expected_area, 0.05),
        "area {} vs {expected_area}",
        shape.area,
    );
    assert!(shape.perimeter > 0.0);
    assert!(
        within(shape.aspect_ratio, 26.0 / 51.0, 0.1),
        "aspect ratio {}",
        shape.aspect_ratio,
    );
}

#[test]
fn enclosed_gap_is_filled() {
    // A skin-colored pocket inside the lesion, away from the center.
    let mut img = disk_image(100, 100, 50, 50, 22);
    for y in 46..54 {
        for x in 56..64 {
            img.put_pixel(x, y, SKIN);
        }
    }
    let staged = run(img);
    let rect = staged.crop.expect("lesion should be found");
    let (px, py) = (60 - rect.x, 50 - rect.y);

    assert!(
        !mask::is_set(*staged.region.get_pixel(px, py)),
        "pocket should not be in the component",
    );
    assert!(
        mask::is_set(*staged.mask.get_pixel(px, py)),
        "pocket should be filled",
    );
    assert!(mask::is_subset(&staged.region, &staged.mask));

    // The filled pocket is kept as-is in the composite, not whitened.
    assert_eq!(*staged.composited.get_pixel(px, py), SKIN);
}

#[test]
fn vignette_frame_does_not_capture_the_crop() {
    let img = RgbImage::from_fn(120, 120, |x, y| {
        if x < 12 || y < 12 || x >= 108 || y >= 108 {
            Rgb([14, 9, 6])
        } else if in_disk(x, y, 60, 60, 18) {
            LESION
        } else {
            SKIN
        }
    });
    let staged = run(img);
    let rect = staged.crop.expect("lesion should be found");
    assert!(
        rect.width < 60 && rect.height < 60,
        "crop {rect:?} grabbed the frame",
    );

    let expected_area = std::f64::consts::PI * 324.0;
    assert!(
        within(staged.record.shape.area, expected_area, 0.05),
        "area {}",
        staged.record.shape.area,
    );
}

#[test]
fn white_lesion_pixels_differ_between_mask_sources() {
    // A pure-white 5x5 fleck inside the lesion, large enough to survive
    // the median filter.
    let mut img = disk_image(100, 100, 50, 50, 20);
    for y in 38..43 {
        for x in 42..47 {
            img.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    let explicit = process("a", img.clone(), &PipelineConfig::default()).unwrap();
    let sentinel = process(
        "a",
        img,
        &PipelineConfig {
            mask_source: MaskSource::WhiteSentinel,
            ..PipelineConfig::default()
        },
    )
    .unwrap();
    assert!(sentinel.shape.area < explicit.shape.area);
}

#[test]
fn decoded_bytes_match_in_memory_image() {
    let img = disk_image(64, 64, 32, 32, 12);
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let decoded = dermis_pipeline::grayscale::decode(&png).unwrap();

    let config = PipelineConfig::default();
    assert_eq!(
        process("a", decoded, &config).unwrap(),
        process("a", img, &config).unwrap(),
    );
}

#[test]
fn record_serializes_in_column_order() {
    let record: FeatureRecord = run(disk_image(60, 60, 30, 30, 12)).record;
    assert_eq!(FeatureRecord::COLUMNS.len(), record.values().len() + 1);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["id"], "synthetic.png");
    assert!(json["shape"]["area"].as_f64().unwrap() > 0.0);
    let back: FeatureRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back.id, record.id);
    for (a, b) in back.values().iter().zip(record.values()) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
    }
}
