//! Unsupervised pixel clustering.
//!
//! This module defines the [`PixelClusterer`] trait for pluggable
//! clustering algorithms and the [`ClustererKind`] enum for selecting
//! one from configuration. The pipeline only needs a label per pixel,
//! so alternative algorithms can be added without touching the stage
//! wiring.
//!
//! The shipped algorithm is Lloyd's k-means with k-means++ seeding. A
//! single [`StdRng`] seeded from the config drives every restart, so
//! labels are reproducible run to run; the central region extractor
//! depends on that when it looks up the label under the center pixel.
//!
//! This is step 4 in the pipeline.

use image::Luma;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::{LabelMap, PipelineConfig, RgbImage};

/// Selects which clustering algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClustererKind {
    /// Lloyd's k-means, k-means++ seeding, best of several restarts by
    /// inertia.
    #[default]
    KMeans,
}

/// Knobs shared by every clustering algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Number of clusters requested.
    pub k: usize,
    /// RNG seed.
    pub seed: u64,
    /// Independent runs; the best is kept.
    pub restarts: usize,
    /// Iteration cap per run.
    pub max_iterations: usize,
    /// Convergence threshold on centroid movement.
    pub tolerance: f32,
}

impl From<&PipelineConfig> for ClusterParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            k: config.cluster_count,
            seed: config.cluster_seed,
            restarts: config.cluster_restarts,
            max_iterations: config.cluster_max_iterations,
            tolerance: config.cluster_tolerance,
        }
    }
}

/// A partition of pixel vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster id of each input vector, in input order.
    pub labels: Vec<u32>,
    /// One centroid per cluster id.
    pub centroids: Vec<[f32; 3]>,
    /// Sum of squared distances from each vector to its centroid.
    pub inertia: f64,
}

impl Clustering {
    /// Number of vectors assigned to each cluster id.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            if let Some(size) = sizes.get_mut(label as usize) {
                *size += 1;
            }
        }
        sizes
    }
}

/// Trait for clustering strategies.
///
/// Input: one color vector per pixel. Output: a label in `[0, k)` per
/// vector (fewer clusters are used when there are fewer than `k`
/// vectors).
pub trait PixelClusterer {
    /// Partition `pixels` into at most `params.k` clusters.
    fn cluster(&self, pixels: &[[f32; 3]], params: &ClusterParams) -> Clustering;
}

impl PixelClusterer for ClustererKind {
    fn cluster(&self, pixels: &[[f32; 3]], params: &ClusterParams) -> Clustering {
        match *self {
            Self::KMeans => kmeans(pixels, params),
        }
    }
}

fn distance_squared(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0.mul_add(d0, d1.mul_add(d1, d2 * d2))
}

/// Nearest centroid and its squared distance. Ties go to the lowest id.
fn nearest(pixel: [f32; 3], centroids: &[[f32; 3]]) -> (u32, f32) {
    let mut best = (0_u32, f32::INFINITY);
    for (i, &c) in centroids.iter().enumerate() {
        let d = distance_squared(pixel, c);
        if d < best.1 {
            #[allow(clippy::cast_possible_truncation)]
            let id = i as u32;
            best = (id, d);
        }
    }
    best
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn seed_centroids(pixels: &[[f32; 3]], k: usize, rng: &mut StdRng) -> Vec<[f32; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(pixels[rng.gen_range(0..pixels.len())]);

    let mut min_d2: Vec<f64> = pixels
        .iter()
        .map(|&p| f64::from(distance_squared(p, centroids[0])))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_d2.iter().sum();
        let next = if total > 0.0 {
            let target = rng.r#gen::<f64>() * total;
            let mut acc = 0.0;
            min_d2
                .iter()
                .position(|&d| {
                    acc += d;
                    acc > target
                })
                .unwrap_or(pixels.len() - 1)
        } else {
            // Every vector coincides with a centroid already.
            rng.gen_range(0..pixels.len())
        };
        let centroid = pixels[next];
        for (d, &p) in min_d2.iter_mut().zip(pixels) {
            *d = d.min(f64::from(distance_squared(p, centroid)));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Assign every vector to its nearest centroid; returns labels and inertia.
fn assign(pixels: &[[f32; 3]], centroids: &[[f32; 3]]) -> (Vec<u32>, f64) {
    let mut inertia = 0.0;
    let labels = pixels
        .iter()
        .map(|&p| {
            let (label, d2) = nearest(p, centroids);
            inertia += f64::from(d2);
            label
        })
        .collect();
    (labels, inertia)
}

/// Mean of each cluster's members. Empty clusters keep their centroid.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn update_centroids(pixels: &[[f32; 3]], labels: &[u32], previous: &[[f32; 3]]) -> Vec<[f32; 3]> {
    let mut sums = vec![[0.0_f64; 3]; previous.len()];
    let mut counts = vec![0_usize; previous.len()];
    for (&p, &label) in pixels.iter().zip(labels) {
        let s = &mut sums[label as usize];
        s[0] += f64::from(p[0]);
        s[1] += f64::from(p[1]);
        s[2] += f64::from(p[2]);
        counts[label as usize] += 1;
    }
    previous
        .iter()
        .zip(sums.iter().zip(&counts))
        .map(|(&old, (s, &n))| {
            if n == 0 {
                old
            } else {
                let n = n as f64;
                [(s[0] / n) as f32, (s[1] / n) as f32, (s[2] / n) as f32]
            }
        })
        .collect()
}

/// One Lloyd run from fresh k-means++ seeds.
fn lloyd(pixels: &[[f32; 3]], params: &ClusterParams, k: usize, rng: &mut StdRng) -> Clustering {
    let mut centroids = seed_centroids(pixels, k, rng);
    let tolerance_sq = params.tolerance * params.tolerance;

    for _ in 0..params.max_iterations {
        let (labels, _) = assign(pixels, &centroids);
        let updated = update_centroids(pixels, &labels, &centroids);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(&a, &b)| distance_squared(a, b))
            .fold(0.0_f32, f32::max);
        centroids = updated;
        if shift <= tolerance_sq {
            break;
        }
    }

    let (labels, inertia) = assign(pixels, &centroids);
    Clustering {
        labels,
        centroids,
        inertia,
    }
}

/// k-means over `pixels`, keeping the lowest-inertia restart.
#[must_use]
pub fn kmeans(pixels: &[[f32; 3]], params: &ClusterParams) -> Clustering {
    let k = params.k.min(pixels.len());
    if k == 0 {
        return Clustering {
            labels: vec![0; pixels.len()],
            centroids: Vec::new(),
            inertia: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<Clustering> = None;
    for _ in 0..params.restarts.max(1) {
        let run = lloyd(pixels, params, k, &mut rng);
        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    best.unwrap_or_else(|| Clustering {
        labels: vec![0; pixels.len()],
        centroids: Vec::new(),
        inertia: 0.0,
    })
}

/// Flatten an image into per-pixel color vectors (row-major).
#[must_use]
pub fn pixel_vectors(image: &RgbImage) -> Vec<[f32; 3]> {
    image
        .pixels()
        .map(|p| [f32::from(p.0[0]), f32::from(p.0[1]), f32::from(p.0[2])])
        .collect()
}

/// Cluster the pixels of `image` and reshape the labels to its layout.
#[must_use]
pub fn cluster_image(image: &RgbImage, config: &PipelineConfig) -> (LabelMap, Clustering) {
    let pixels = pixel_vectors(image);
    let params = ClusterParams::from(config);
    let clustering = config.clusterer.cluster(&pixels, &params);

    let width = image.width() as usize;
    let labels = LabelMap::from_fn(image.width(), image.height(), |x, y| {
        Luma([clustering.labels[y as usize * width + x as usize]])
    });

    log::debug!(
        "cluster: k={} sizes={:?} inertia={:.1}",
        clustering.centroids.len(),
        clustering.sizes(),
        clustering.inertia,
    );
    (labels, clustering)
}
