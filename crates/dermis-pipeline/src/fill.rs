//! Hole filling by flood fill from the outside.
//!
//! The mask is copied into a frame one pixel larger on every side so
//! that the corner seed is always background and every exterior pocket
//! touching the image edge is reachable through the frame. Background
//! cells the 4-connected flood cannot reach are enclosed by foreground
//! and become foreground; the result is OR-ed with the input.
//!
//! This is step 6 in the pipeline. The output is always a superset of
//! the input mask.

use std::collections::VecDeque;

use image::{GrayImage, Luma};

use crate::mask::{self, BACKGROUND, FOREGROUND};

/// Flood the background of a padded copy of `mask` from its corner.
///
/// Returns a `(width + 2) x (height + 2)` grid, `true` where the flood
/// reached.
fn flood_exterior(mask: &GrayImage) -> (Vec<bool>, usize) {
    let (w, h) = mask.dimensions();
    let pw = w as usize + 2;
    let ph = h as usize + 2;

    // Foreground cells of the padded copy block the flood.
    let blocked = |px: usize, py: usize| -> bool {
        if px == 0 || py == 0 || px == pw - 1 || py == ph - 1 {
            return false;
        }
        #[allow(clippy::cast_possible_truncation)]
        let cell = *mask.get_pixel((px - 1) as u32, (py - 1) as u32);
        mask::is_set(cell)
    };

    let mut reached = vec![false; pw * ph];
    let mut queue = VecDeque::new();
    reached[0] = true;
    queue.push_back((0_usize, 0_usize));

    while let Some((x, y)) = queue.pop_front() {
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx >= pw || ny >= ph {
                continue;
            }
            let idx = ny * pw + nx;
            if !reached[idx] && !blocked(nx, ny) {
                reached[idx] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    (reached, pw)
}

/// Fill every background pocket fully enclosed by foreground.
#[must_use = "returns the filled mask"]
pub fn fill_holes(mask: &GrayImage) -> GrayImage {
    let (reached, pw) = flood_exterior(mask);
    let (w, h) = mask.dimensions();

    let flooded = GrayImage::from_fn(w, h, |x, y| {
        if reached[(y as usize + 1) * pw + (x as usize + 1)] {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });
    let filled = mask::union(mask, &mask::invert(&flooded));

    let holes = mask::count(&filled) - mask::count(mask);
    if holes > 0 {
        log::debug!("fill: closed {holes} enclosed background pixels");
    }
    filled
}
