//! Squared Euclidean distance with strict dimension checking.
//!
//! The search only compares distances, never reports them, so the square
//! root is skipped. Accumulation happens in f64 to keep the sum stable on
//! high-dimensional vectors, with an inner f32 chunk accumulator that the
//! compiler can vectorize.

use crate::error::{Result, SearchError};

/// Inner chunk width for the accumulation loop.
const CHUNK: usize = 8;

/// Sum of squared per-dimension differences between `query` and `stored`.
///
/// Returns [`SearchError::DimensionMismatch`] when the slices differ in
/// length; a mismatched corpus must abort the search rather than produce a
/// silently truncated distance.
#[allow(clippy::needless_range_loop)]
pub fn squared_l2(query: &[f32], stored: &[f32]) -> Result<f32> {
    if query.len() != stored.len() {
        return Err(SearchError::DimensionMismatch {
            expected: query.len(),
            actual: stored.len(),
        });
    }

    let len = query.len();
    let mut sum = 0.0f64;

    let full_chunks = len / CHUNK;
    for c in 0..full_chunks {
        let base = c * CHUNK;
        let mut chunk_acc = 0.0f32;
        for j in 0..CHUNK {
            let diff = query[base + j] - stored[base + j];
            chunk_acc += diff * diff;
        }
        sum += chunk_acc as f64;
    }

    for i in (full_chunks * CHUNK)..len {
        let diff = (query[i] - stored[i]) as f64;
        sum += diff * diff;
    }

    Ok(sum as f32)
}
