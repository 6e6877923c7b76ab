//! Anchor-based result refinement
//!
//! Anchors are reference embeddings: positive anchors pull similar results
//! up ("more like this"), negative anchors push similar results down or out
//! ("less like this"). Refinement adjusts an already-ranked result list
//! without re-running retrieval.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{sort_by_score, SearchResult};
use crate::similarity::{avg_similarity, centroid, cosine_similarity, max_similarity};

/// Default boost weight for positive-anchor similarity
pub const DEFAULT_POSITIVE_WEIGHT: f32 = 0.3;
/// Default penalty weight for negative-anchor similarity
pub const DEFAULT_NEGATIVE_WEIGHT: f32 = 0.2;
/// Results at or above this similarity to any negative anchor are dropped
pub const DEFAULT_NEGATIVE_FILTER_THRESHOLD: f32 = 0.85;
/// Refinement never returns fewer results than this when enough existed
pub const DEFAULT_MIN_RESULTS: usize = 3;
/// Max similarity gap for the "between two anchors" query
pub const DEFAULT_BALANCE_THRESHOLD: f32 = 0.2;

/// A reference embedding with identity and label. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticAnchor {
    /// Anchor id
    pub id: Uuid,

    /// Human-readable label
    pub label: String,

    /// Reference embedding
    pub embedding: Vec<f32>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl SemanticAnchor {
    pub fn new(label: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            embedding,
            created_at: Utc::now(),
        }
    }
}

/// The positive and negative anchors attached to a refinement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorSet {
    pub positive: Vec<SemanticAnchor>,
    pub negative: Vec<SemanticAnchor>,
}

impl AnchorSet {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    /// Union of two anchor sets, deduplicated by anchor id.
    /// Anchors from `a` keep their declaration order and come first.
    pub fn merge(a: &AnchorSet, b: &AnchorSet) -> AnchorSet {
        let mut merged = a.clone();

        for anchor in &b.positive {
            if !merged.positive.iter().any(|p| p.id == anchor.id) {
                merged.positive.push(anchor.clone());
            }
        }
        for anchor in &b.negative {
            if !merged.negative.iter().any(|n| n.id == anchor.id) {
                merged.negative.push(anchor.clone());
            }
        }

        merged
    }
}

/// Tunable refinement policy. The defaults are policy choices, not derived
/// constants; callers override them through configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub positive_weight: f32,
    pub negative_weight: f32,
    pub negative_filter_threshold: f32,
    pub min_results: usize,
    pub balance_threshold: f32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            positive_weight: DEFAULT_POSITIVE_WEIGHT,
            negative_weight: DEFAULT_NEGATIVE_WEIGHT,
            negative_filter_threshold: DEFAULT_NEGATIVE_FILTER_THRESHOLD,
            min_results: DEFAULT_MIN_RESULTS,
            balance_threshold: DEFAULT_BALANCE_THRESHOLD,
        }
    }
}

/// Counters describing what refinement did to the candidate set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinementStats {
    pub input_count: usize,
    pub output_count: usize,
    pub removed_by_negative: usize,
    pub restored_for_floor: usize,
    pub boosted: usize,
    pub missing_embedding: usize,
}

/// Refinement outcome: the surviving ordered results, a per-anchor grouping,
/// and audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refinement {
    pub results: Vec<SearchResult>,
    /// Surviving results grouped by nearest positive anchor id
    pub by_anchor: HashMap<Uuid, Vec<SearchResult>>,
    pub stats: RefinementStats,
}

/// Adjust and filter a ranked result list using an anchor set.
///
/// Per candidate, in order: a result with no embedding passes through
/// unscored (data gaps degrade, they never abort the batch); a result whose
/// max similarity to any negative anchor meets the filter threshold is
/// dropped and counted; otherwise the score is adjusted by
/// `avg_pos * positive_weight - avg_neg * negative_weight`. If filtering
/// would leave fewer than `min_results`, the highest-scoring dropped results
/// are restored until the floor is met. Survivors are re-sorted descending
/// and grouped by nearest positive anchor.
pub fn refine(
    results: Vec<SearchResult>,
    embeddings_by_id: &HashMap<String, Vec<f32>>,
    anchors: &AnchorSet,
    config: &AnchorConfig,
) -> Refinement {
    let mut stats = RefinementStats {
        input_count: results.len(),
        ..Default::default()
    };

    let negative_embeddings: Vec<Vec<f32>> =
        anchors.negative.iter().map(|a| a.embedding.clone()).collect();
    let positive_embeddings: Vec<Vec<f32>> =
        anchors.positive.iter().map(|a| a.embedding.clone()).collect();

    let mut kept: Vec<SearchResult> = Vec::new();
    let mut dropped: Vec<SearchResult> = Vec::new();

    for mut result in results {
        let Some(embedding) = embeddings_by_id.get(&result.id) else {
            stats.missing_embedding += 1;
            kept.push(result);
            continue;
        };

        if !negative_embeddings.is_empty() {
            let max_negative = max_similarity(embedding, &negative_embeddings);
            if max_negative >= config.negative_filter_threshold {
                stats.removed_by_negative += 1;
                dropped.push(result);
                continue;
            }
        }

        let mut boost = 0.0;
        if !positive_embeddings.is_empty() {
            boost += avg_similarity(embedding, &positive_embeddings) * config.positive_weight;
        }
        if !negative_embeddings.is_empty() {
            boost -= avg_similarity(embedding, &negative_embeddings) * config.negative_weight;
        }

        if boost != 0.0 {
            stats.boosted += 1;
            let prior = result.breakdown.anchor_boost.unwrap_or(0.0);
            result.breakdown.anchor_boost = Some(prior + boost);
            let adjusted = result.score + boost;
            result.set_final_score(adjusted);
        }

        kept.push(result);
    }

    // Safety floor: never shrink below min_results when enough candidates
    // existed before filtering.
    let floor = config.min_results.min(stats.input_count);
    if kept.len() < floor {
        dropped.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let needed = floor - kept.len();
        for result in dropped.into_iter().take(needed) {
            stats.restored_for_floor += 1;
            kept.push(result);
        }
    }

    sort_by_score(&mut kept);
    stats.output_count = kept.len();

    let by_anchor = group_by_nearest_positive(&kept, anchors, embeddings_by_id);

    Refinement {
        results: kept,
        by_anchor,
        stats,
    }
}

/// Group results by their nearest positive anchor (cosine similarity, ties
/// broken by first-declared anchor). Empty when there are no positive
/// anchors; results without embeddings are not grouped.
pub fn group_by_nearest_positive(
    results: &[SearchResult],
    anchors: &AnchorSet,
    embeddings_by_id: &HashMap<String, Vec<f32>>,
) -> HashMap<Uuid, Vec<SearchResult>> {
    let mut groups: HashMap<Uuid, Vec<SearchResult>> = HashMap::new();
    if anchors.positive.is_empty() {
        return groups;
    }

    for result in results {
        let Some(embedding) = embeddings_by_id.get(&result.id) else {
            continue;
        };

        let mut best: Option<(Uuid, f32)> = None;
        for anchor in &anchors.positive {
            let sim = cosine_similarity(embedding, &anchor.embedding);
            // Strict comparison keeps the first-declared anchor on ties
            if best.map(|(_, s)| sim > s).unwrap_or(true) {
                best = Some((anchor.id, sim));
            }
        }

        if let Some((anchor_id, _)) = best {
            groups.entry(anchor_id).or_default().push(result.clone());
        }
    }

    groups
}

/// Results whose similarities to `a` and `b` differ by at most the balance
/// threshold - the conceptual midpoint between two anchors.
pub fn between_anchors(
    results: &[SearchResult],
    embeddings_by_id: &HashMap<String, Vec<f32>>,
    a: &SemanticAnchor,
    b: &SemanticAnchor,
    balance_threshold: f32,
) -> Vec<SearchResult> {
    results
        .iter()
        .filter(|result| {
            embeddings_by_id
                .get(&result.id)
                .map(|embedding| {
                    let sim_a = cosine_similarity(embedding, &a.embedding);
                    let sim_b = cosine_similarity(embedding, &b.embedding);
                    (sim_a - sim_b).abs() <= balance_threshold
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Centroid of a set of embeddings; `InvalidArgument` on empty input
pub fn anchor_centroid(embeddings: &[Vec<f32>]) -> Result<Vec<f32>> {
    centroid(embeddings)
}
