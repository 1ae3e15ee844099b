//! Centroid training for partition rebuilds.
//!
//! Spherical k-means with kmeans++ seeding. The RNG is seeded with a fixed
//! value so that rebuilding the same vector set always produces the same
//! centroids, keeping search results reproducible across rebuilds.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

const TRAINING_SEED: u64 = 0x5EED_CAFE;

/// Train `k` centroids over unit-normalized vectors.
///
/// Returns `None` when the input cannot support clustering (`k < 2` or no
/// vectors); callers fall back to a single exhaustive bucket.
pub fn train_centroids(
    vectors: &[Vec<f32>],
    k: usize,
    max_iters: usize,
) -> Option<Vec<Vec<f32>>> {
    if vectors.is_empty() || k < 2 {
        return None;
    }
    let k = k.min(vectors.len());
    let mut centroids = init_kmeans_pp(vectors, k);

    for _ in 0..max_iters.max(1) {
        let mut sums: Vec<Vec<f32>> = vec![vec![0.0; vectors[0].len()]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];

        for vec in vectors {
            let best = nearest_centroid(&centroids, vec);
            for (dst, &src) in sums[best].iter_mut().zip(vec.iter()) {
                *dst += src;
            }
            counts[best] += 1;
        }

        for (idx, count) in counts.iter().enumerate() {
            if *count == 0 {
                continue;
            }
            let inv = 1.0 / *count as f32;
            for value in sums[idx].iter_mut() {
                *value *= inv;
            }
            normalize(&mut sums[idx]);
            centroids[idx] = std::mem::take(&mut sums[idx]);
        }
    }

    Some(centroids)
}

/// Index of the centroid with the highest dot product against `vector`.
pub fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    let mut best_idx = 0usize;
    let mut best_score = f32::MIN;
    for (idx, centroid) in centroids.iter().enumerate() {
        let score = dot(centroid, vector);
        if score > best_score {
            best_score = score;
            best_idx = idx;
        }
    }
    best_idx
}

/// kmeans++ seeding: spread initial centroids by distance-weighted sampling.
fn init_kmeans_pp(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
    let mut centroids = Vec::with_capacity(k);
    if let Some(first) = vectors.choose(&mut rng) {
        centroids.push(first.clone());
    }

    while centroids.len() < k {
        let mut weights = Vec::with_capacity(vectors.len());
        let mut total = 0.0f32;
        for vec in vectors {
            let mut best = f32::MIN;
            for centroid in &centroids {
                best = best.max(dot(centroid, vec));
            }
            // convert similarity to distance weight
            let dist = (1.0 - best).max(0.0);
            let weight = dist * dist;
            weights.push(weight);
            total += weight;
        }
        if total <= f32::EPSILON {
            break;
        }
        let mut target = rng.random::<f32>() * total;
        let mut chosen_idx = 0usize;
        for (idx, weight) in weights.iter().enumerate() {
            target -= *weight;
            if target <= 0.0 {
                chosen_idx = idx;
                break;
            }
        }
        centroids.push(vectors[chosen_idx].clone());
    }
    centroids
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}
