//! Squared Euclidean distance kernels.
//!
//! Exact nearest-neighbor search compares a query against every stored
//! vector, so the inner loop matters. A `wide::f32x8` kernel handles the
//! bulk of each vector with a scalar tail, and whole-index scans go through
//! rayon above a sequential cutoff.

use rayon::prelude::*;
use wide::f32x8;

/// Batches smaller than this are scanned sequentially.
const PARALLEL_THRESHOLD: usize = 100;

/// Squared Euclidean distance between two equal-length vectors.
///
/// Callers are responsible for length agreement; the index validates
/// dimensions before reaching this kernel.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < 8 {
        return squared_euclidean_scalar(a, b);
    }
    squared_euclidean_simd(a, b)
}

/// Scalar reference kernel.
pub fn squared_euclidean_scalar(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// SIMD kernel processing 8 lanes at a time with a scalar remainder loop.
pub fn squared_euclidean_simd(a: &[f32], b: &[f32]) -> f32 {
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    let mut acc = f32x8::splat(0.0);
    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        let va = f32x8::new(*<&[f32; 8]>::try_from(chunk_a).unwrap());
        let vb = f32x8::new(*<&[f32; 8]>::try_from(chunk_b).unwrap());
        let diff = va - vb;
        acc += diff * diff;
    }

    let mut sum = acc.reduce_add();
    for (x, y) in remainder_a.iter().zip(remainder_b.iter()) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

/// Squared distances from `query` to every row of a contiguous vector block.
///
/// `data` holds `data.len() / dimension` vectors back to back. Large blocks
/// are scanned in parallel.
pub fn batch_squared_euclidean(query: &[f32], data: &[f32], dimension: usize) -> Vec<f32> {
    debug_assert_eq!(query.len(), dimension);
    debug_assert_eq!(data.len() % dimension.max(1), 0);

    if dimension == 0 || data.is_empty() {
        return Vec::new();
    }

    let count = data.len() / dimension;
    if count < PARALLEL_THRESHOLD {
        return data
            .chunks_exact(dimension)
            .map(|row| squared_euclidean(query, row))
            .collect();
    }

    data.par_chunks_exact(dimension)
        .map(|row| squared_euclidean(query, row))
        .collect()
}
