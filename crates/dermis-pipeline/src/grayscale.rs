//! Image decoding and grayscale conversion.
//!
//! The pipeline itself starts from an already-decoded [`RgbImage`];
//! [`decode`] is the in-memory convenience front ends use to get one
//! from file bytes (PNG, JPEG, BMP, WebP). [`to_gray`] is shared by the
//! region cropper and the texture extractor.

use image::GrayImage;

use crate::types::{PipelineError, RgbImage};

/// Decode raw image bytes into an 8-bit RGB image.
///
/// Alpha, if present, is dropped.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert an RGB image to grayscale.
///
/// Uses the `image` crate's luminance weights
/// (`0.2126*R + 0.7152*G + 0.0722*B`), so green dominates.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGB image as a PNG byte buffer.
    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn valid_png_decodes_to_same_pixels() {
        let img = RgbImage::from_fn(17, 31, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            image::Rgb([(x * 7) as u8, (y * 5) as u8, 42])
        });
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn grayscale_weights_green_highest() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgb([255, 0, 0]),
            1 => image::Rgb([0, 255, 0]),
            _ => image::Rgb([0, 0, 255]),
        });
        let gray = to_gray(&img);
        let (r, g, b) = (
            gray.get_pixel(0, 0).0[0],
            gray.get_pixel(1, 0).0[0],
            gray.get_pixel(2, 0).0[0],
        );
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn white_stays_white() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        assert!(to_gray(&img).pixels().all(|p| p.0[0] == 255));
    }
}
