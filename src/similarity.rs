//! Similarity primitives for embedding vectors
//!
//! Pure functions, no state. Everything downstream (fusion diagnostics,
//! anchor refinement, clustering) builds on these.

use crate::error::{Result, StrataError};

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude inputs rather than
/// panicking; a data-level gap must never abort a batch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Arithmetic mean per dimension of a set of vectors.
///
/// Vectors shorter than the first are treated as zero-padded; this only
/// matters for malformed input, well-formed archives embed at one dimension.
pub fn centroid(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    if vectors.is_empty() {
        return Err(StrataError::InvalidArgument(
            "Cannot compute centroid of an empty vector set".to_string(),
        ));
    }

    let dim = vectors[0].len();
    let mut sums = vec![0.0f32; dim];

    for vector in vectors {
        for (i, value) in vector.iter().take(dim).enumerate() {
            sums[i] += value;
        }
    }

    let count = vectors.len() as f32;
    for value in &mut sums {
        *value /= count;
    }

    Ok(sums)
}

/// Maximum cosine similarity between `vector` and any member of `set`.
///
/// Empty set yields 0.0.
pub fn max_similarity(vector: &[f32], set: &[Vec<f32>]) -> f32 {
    set.iter()
        .map(|other| cosine_similarity(vector, other))
        .fold(0.0f32, f32::max)
}

/// Average cosine similarity between `vector` and the members of `set`.
///
/// Empty set yields 0.0.
pub fn avg_similarity(vector: &[f32], set: &[Vec<f32>]) -> f32 {
    if set.is_empty() {
        return 0.0;
    }

    let total: f32 = set
        .iter()
        .map(|other| cosine_similarity(vector, other))
        .sum();

    total / set.len() as f32
}
