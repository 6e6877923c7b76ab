//! Reciprocal Rank Fusion for combining dense and sparse result lists
//!
//! RRF formula: score(id) = sum over lists of: weight / (k + rank), with
//! 1-indexed ranks. The smoothing constant k damps rank-1 dominance and
//! keeps scores well-defined for very large candidate sets.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be positive")]
    InvalidWeights,
}

/// Default RRF smoothing constant
pub const DEFAULT_RRF_K: f32 = 60.0;
/// Default weight for the dense (embedding) list
pub const DEFAULT_DENSE_WEIGHT: f32 = 0.6;
/// Default weight for the sparse (keyword) list
pub const DEFAULT_SPARSE_WEIGHT: f32 = 0.4;

/// Configuration for the fusion algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,

    /// Weight for dense results
    pub dense_weight: f32,

    /// Weight for sparse results
    pub sparse_weight: f32,
}

impl FusionConfig {
    pub fn new(rrf_k: f32, dense_weight: f32, sparse_weight: f32) -> Result<Self, FusionError> {
        if dense_weight <= 0.0 || sparse_weight <= 0.0 {
            return Err(FusionError::InvalidWeights);
        }

        Ok(Self {
            rrf_k,
            dense_weight,
            sparse_weight,
        })
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            dense_weight: DEFAULT_DENSE_WEIGHT,
            sparse_weight: DEFAULT_SPARSE_WEIGHT,
        }
    }
}

/// An item in 1-indexed ranked form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub score: f32,
    /// 1-indexed rank within the source list
    pub rank: usize,
}

/// One fused item with per-source diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: String,

    /// Combined RRF score; the ordering key
    pub fused_score: f32,

    /// Raw score and 1-indexed rank in the dense list, if present there
    pub dense_score: Option<f32>,
    pub dense_rank: Option<usize>,

    /// Raw score and 1-indexed rank in the sparse list, if present there
    pub sparse_score: Option<f32>,
    pub sparse_rank: Option<usize>,
}

/// Overlap statistics between the two input lists, for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapStats {
    pub dense_only: usize,
    pub sparse_only: usize,
    pub intersection: usize,
}

/// Convert a raw best-first `(id, score)` list into 1-indexed ranked form
pub fn to_ranked(raw: &[(String, f32)]) -> Vec<RankedResult> {
    raw.iter()
        .enumerate()
        .map(|(i, (id, score))| RankedResult {
            id: id.clone(),
            score: *score,
            rank: i + 1,
        })
        .collect()
}

/// Fuse two best-first ranked lists into one deduplicated descending list.
///
/// An item in both lists gets both weighted terms; an item in one list gets
/// only that term. Ties after fusion keep first-seen order (dense list
/// first, then sparse). Empty inputs are valid and fuse to an empty list.
pub fn fuse(
    dense: &[(String, f32)],
    sparse: &[(String, f32)],
    config: &FusionConfig,
) -> Vec<FusedResult> {
    let mut by_id: AHashMap<String, usize> = AHashMap::new();
    let mut fused: Vec<FusedResult> = Vec::new();

    for (rank0, (id, score)) in dense.iter().enumerate() {
        let rank = rank0 + 1;
        let contribution = config.dense_weight / (config.rrf_k + rank as f32);

        match by_id.get(id) {
            // Duplicate ids within one list keep their first (best) rank
            Some(_) => continue,
            None => {
                by_id.insert(id.clone(), fused.len());
                fused.push(FusedResult {
                    id: id.clone(),
                    fused_score: contribution,
                    dense_score: Some(*score),
                    dense_rank: Some(rank),
                    sparse_score: None,
                    sparse_rank: None,
                });
            }
        }
    }

    for (rank0, (id, score)) in sparse.iter().enumerate() {
        let rank = rank0 + 1;
        let contribution = config.sparse_weight / (config.rrf_k + rank as f32);

        match by_id.get(id) {
            Some(&idx) => {
                let entry = &mut fused[idx];
                if entry.sparse_rank.is_none() {
                    entry.fused_score += contribution;
                    entry.sparse_score = Some(*score);
                    entry.sparse_rank = Some(rank);
                }
            }
            None => {
                by_id.insert(id.clone(), fused.len());
                fused.push(FusedResult {
                    id: id.clone(),
                    fused_score: contribution,
                    dense_score: None,
                    dense_rank: None,
                    sparse_score: Some(*score),
                    sparse_rank: Some(rank),
                });
            }
        }
    }

    // Stable sort preserves first-seen order for equal scores
    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    fused
}

/// Count ids unique to each list and common to both
pub fn overlap_stats(dense: &[(String, f32)], sparse: &[(String, f32)]) -> OverlapStats {
    let dense_ids: std::collections::HashSet<&str> =
        dense.iter().map(|(id, _)| id.as_str()).collect();
    let sparse_ids: std::collections::HashSet<&str> =
        sparse.iter().map(|(id, _)| id.as_str()).collect();

    let intersection = dense_ids.intersection(&sparse_ids).count();

    OverlapStats {
        dense_only: dense_ids.len() - intersection,
        sparse_only: sparse_ids.len() - intersection,
        intersection,
    }
}

/// Min-max normalize fused scores into [0, 1] in place.
///
/// When every score is equal (including a single result) all scores become
/// 1.0, avoiding a divide by zero.
pub fn normalize_scores(results: &mut [FusedResult]) {
    if results.is_empty() {
        return;
    }

    let min = results
        .iter()
        .map(|r| r.fused_score)
        .fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|r| r.fused_score)
        .fold(f32::NEG_INFINITY, f32::max);

    let range = max - min;
    for result in results {
        result.fused_score = if range == 0.0 {
            1.0
        } else {
            (result.fused_score - min) / range
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[(&str, f32)]) -> Vec<(String, f32)> {
        items.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    #[test]
    fn test_fusion_exact_scores() {
        // Dense: A, B, C; sparse: B, A, D; k=60, weights 0.6/0.4
        let dense = list(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
        let sparse = list(&[("B", 0.95), ("A", 0.5), ("D", 0.4)]);

        let fused = fuse(&dense, &sparse, &FusionConfig::default());

        let a = fused.iter().find(|r| r.id == "A").unwrap();
        let b = fused.iter().find(|r| r.id == "B").unwrap();

        let expected_a = 0.6 / (60.0 + 1.0) + 0.4 / (60.0 + 2.0);
        let expected_b = 0.6 / (60.0 + 2.0) + 0.4 / (60.0 + 1.0);

        assert!((a.fused_score - expected_a).abs() < 1e-6);
        assert!((b.fused_score - expected_b).abs() < 1e-6);

        // A's rank-weighted contribution is larger (dense carries more weight)
        assert!(a.fused_score > b.fused_score);
        assert_eq!(fused[0].id, "A");
    }

    #[test]
    fn test_fusion_completeness() {
        let dense = list(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
        let sparse = list(&[("B", 0.95), ("A", 0.5), ("D", 0.4)]);

        let fused = fuse(&dense, &sparse, &FusionConfig::default());

        let ids: Vec<&str> = fused.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(fused.len(), 4);
        for id in ["A", "B", "C", "D"] {
            assert_eq!(ids.iter().filter(|x| **x == id).count(), 1);
        }
    }

    #[test]
    fn test_fusion_deterministic() {
        let dense = list(&[("A", 0.9), ("B", 0.8)]);
        let sparse = list(&[("C", 0.7), ("A", 0.6)]);
        let config = FusionConfig::default();

        let first = fuse(&dense, &sparse, &config);
        let second = fuse(&dense, &sparse, &config);

        let ids_a: Vec<_> = first.iter().map(|r| (&r.id, r.fused_score)).collect();
        let ids_b: Vec<_> = second.iter().map(|r| (&r.id, r.fused_score)).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_fusion_monotonicity() {
        // Top of both lists must beat anything ranked lower in both
        let dense = list(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
        let sparse = list(&[("A", 0.95), ("B", 0.5), ("C", 0.4)]);

        let fused = fuse(&dense, &sparse, &FusionConfig::default());
        assert_eq!(fused[0].id, "A");
        assert!(fused[0].fused_score >= fused[1].fused_score);
        assert!(fused[1].fused_score >= fused[2].fused_score);
    }

    #[test]
    fn test_fusion_empty_inputs() {
        let empty: Vec<(String, f32)> = Vec::new();
        let dense = list(&[("A", 0.9)]);

        assert!(fuse(&empty, &empty, &FusionConfig::default()).is_empty());

        let one_sided = fuse(&dense, &empty, &FusionConfig::default());
        assert_eq!(one_sided.len(), 1);
        assert!(one_sided[0].sparse_rank.is_none());
    }

    #[test]
    fn test_fusion_diagnostics() {
        let dense = list(&[("A", 0.9)]);
        let sparse = list(&[("A", 0.5), ("B", 0.4)]);

        let fused = fuse(&dense, &sparse, &FusionConfig::default());
        let a = fused.iter().find(|r| r.id == "A").unwrap();

        assert_eq!(a.dense_rank, Some(1));
        assert_eq!(a.sparse_rank, Some(1));
        assert_eq!(a.dense_score, Some(0.9));
        assert_eq!(a.sparse_score, Some(0.5));
    }

    #[test]
    fn test_invalid_weights() {
        assert!(FusionConfig::new(60.0, 0.0, 0.4).is_err());
        assert!(FusionConfig::new(60.0, 0.6, -0.1).is_err());
        assert!(FusionConfig::new(60.0, 0.6, 0.4).is_ok());
    }

    #[test]
    fn test_to_ranked_one_indexed() {
        let ranked = to_ranked(&list(&[("A", 0.9), ("B", 0.8)]));
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_overlap_stats() {
        let dense = list(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
        let sparse = list(&[("B", 0.95), ("D", 0.4)]);

        let stats = overlap_stats(&dense, &sparse);
        assert_eq!(
            stats,
            OverlapStats {
                dense_only: 2,
                sparse_only: 1,
                intersection: 1
            }
        );
    }

    #[test]
    fn test_normalize_scores() {
        let dense = list(&[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
        let sparse = list(&[("A", 0.5)]);

        let mut fused = fuse(&dense, &sparse, &FusionConfig::default());
        normalize_scores(&mut fused);

        assert!((fused[0].fused_score - 1.0).abs() < 1e-6);
        assert!((fused.last().unwrap().fused_score).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_all_equal() {
        let dense = list(&[("A", 0.9)]);
        let empty: Vec<(String, f32)> = Vec::new();

        let mut fused = fuse(&dense, &empty, &FusionConfig::default());
        normalize_scores(&mut fused);
        assert_eq!(fused[0].fused_score, 1.0);
    }
}
