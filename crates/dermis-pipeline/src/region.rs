//! Central region extraction.
//!
//! The cluster under the center pixel is taken as the lesion's cluster.
//! Its mask is cleaned with a binary opening then a closing (square
//! structuring element), labelled into 8-connected components, and the
//! component under the center pixel is kept.
//!
//! This is step 5 in the pipeline. It relies on the cropper having
//! re-centered the lesion; on the cropper's fallback path that is a
//! best-effort guess. A center pixel that ends up as background after
//! cleanup yields an empty mask.

use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::mask::{self, BACKGROUND};
use crate::types::{Dimensions, GrayImage, LabelMap};

/// Output of the central region extractor.
#[derive(Debug, Clone)]
pub struct CentralRegion {
    /// Cluster id under the center pixel.
    pub cluster: u32,
    /// Mask of that cluster after opening and closing.
    pub cleaned: GrayImage,
    /// Component id under the center pixel (0 when it is background).
    pub component: u32,
    /// Pixels of the center component.
    pub mask: GrayImage,
}

/// The cluster id at the center pixel and the binary mask of that
/// cluster. Returns `None` for an empty label map.
#[must_use]
pub fn center_cluster_mask(labels: &LabelMap) -> Option<(u32, GrayImage)> {
    let dims = Dimensions::of(labels);
    if dims.is_empty() {
        return None;
    }
    let center = dims.center();
    let cluster = labels.get_pixel(center.x, center.y).0[0];
    Some((cluster, mask::from_labels(labels, cluster)))
}

/// Opening followed by closing with a `kernel_size` square element.
#[must_use = "returns the cleaned mask"]
pub fn clean(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    let radius = u8::try_from(kernel_size / 2).unwrap_or(u8::MAX);
    if radius == 0 {
        return mask.clone();
    }
    let opened = imageproc::morphology::open(mask, Norm::LInf, radius);
    imageproc::morphology::close(&opened, Norm::LInf, radius)
}

/// Keep only the 8-connected component covering the center pixel.
///
/// Returns the component id (0 if the center is background) and its mask.
#[must_use]
pub fn center_component(mask: &GrayImage) -> (u32, GrayImage) {
    let dims = Dimensions::of(mask);
    if dims.is_empty() {
        return (0, mask.clone());
    }
    // The labeller cannot handle a single-pixel image.
    if dims.pixel_count() == 1 {
        return if mask::is_set(*mask.get_pixel(0, 0)) {
            (1, mask.clone())
        } else {
            (0, GrayImage::new(1, 1))
        };
    }
    let components = connected_components(mask, Connectivity::Eight, Luma([BACKGROUND]));
    let center = dims.center();
    let component = components.get_pixel(center.x, center.y).0[0];
    if component == 0 {
        return (0, GrayImage::new(dims.width, dims.height));
    }
    (component, mask::from_labels(&components, component))
}

/// Run the whole extractor on a cluster label map.
#[must_use = "returns the central region"]
pub fn extract_central_region(labels: &LabelMap, kernel_size: u32) -> CentralRegion {
    let Some((cluster, cluster_mask)) = center_cluster_mask(labels) else {
        let (w, h) = labels.dimensions();
        return CentralRegion {
            cluster: 0,
            cleaned: GrayImage::new(w, h),
            component: 0,
            mask: GrayImage::new(w, h),
        };
    };
    let cleaned = clean(&cluster_mask, kernel_size);
    let (component, mask) = center_component(&cleaned);

    log::debug!(
        "region: center cluster {cluster} ({} px), cleaned {} px, component {component} ({} px)",
        mask::count(&cluster_mask),
        mask::count(&cleaned),
        mask::count(&mask),
    );

    CentralRegion {
        cluster,
        cleaned,
        component,
        mask,
    }
}
