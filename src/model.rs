//! Core result types: provenance-carrying search results and score breakdowns
//!
//! `SearchResult` is the atomic unit returned to callers regardless of which
//! backing store produced it. Conversion from a store node happens in exactly
//! one place (`SearchResult::from_node`) so dense/sparse/fused/anchor/final
//! score fields are populated consistently on every code path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::NodeRecord;

/// Which physical store a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Imported archive content (conversations, documents)
    Archive,
    /// Derived book content (summaries built by the pipeline)
    Derived,
}

/// Position in the multi-resolution content pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Base chunk (level 0)
    Base,
    /// Mid-level summary (level 1)
    Summary,
    /// Top-level synthesis (level 2)
    Apex,
}

impl Level {
    pub fn as_u8(self) -> u8 {
        match self {
            Level::Base => 0,
            Level::Summary => 1,
            Level::Apex => 2,
        }
    }
}

/// Hierarchy filter applied to search responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelFilter {
    #[default]
    All,
    Base,
    Summary,
    Apex,
}

impl LevelFilter {
    /// Whether a result at `level` passes this filter
    pub fn matches(self, level: Level) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Base => level == Level::Base,
            LevelFilter::Summary => level == Level::Summary,
            LevelFilter::Apex => level == Level::Apex,
        }
    }
}

/// Per-signal score diagnostics for one result
///
/// `final_score` is always present and is the sole ordering key; every other
/// field is diagnostic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Raw dense (embedding) similarity score, when the dense list had this id
    pub dense_score: Option<f32>,

    /// 1-indexed rank within the dense list
    pub dense_rank: Option<usize>,

    /// Raw sparse (keyword) score, when the sparse list had this id
    pub sparse_score: Option<f32>,

    /// 1-indexed rank within the sparse list
    pub sparse_rank: Option<usize>,

    /// RRF-fused score across both lists
    pub fused_score: f32,

    /// Net adjustment applied by anchor refinement
    pub anchor_boost: Option<f32>,

    /// The score results are ordered by
    pub final_score: f32,
}

/// Full chain of origin metadata attached to a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    /// Which store the result came from
    pub origin: Origin,

    /// Source platform tag (e.g. "chatgpt", "notes", "watch-history")
    pub source_platform: Option<String>,

    /// Original external id assigned by the source platform
    pub external_id: Option<String>,

    /// Root id of the thread/conversation this content belongs to
    pub thread_root_id: Option<String>,

    /// Title of that thread, when known
    pub thread_title: Option<String>,

    /// Parent node id, one level up the hierarchy
    pub parent_id: Option<String>,

    /// Derived-book context (chapter/section path), derived content only
    pub book_context: Option<String>,

    /// When the source content was created
    pub source_created_at: Option<DateTime<Utc>>,

    /// Author identifier
    pub author: Option<String>,

    /// Author role ("user", "assistant", "system", ...)
    pub author_role: Option<String>,

    /// Canonical URI back to the content
    pub uri: Option<String>,
}

/// Quality flags evaluated when the result was built or gated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityIndicators {
    /// Quality score precomputed by the ingestion pipeline; the gate reads
    /// this, it never recomputes quality
    pub quality_score: f32,

    /// Meets the configured minimum word count
    pub meets_word_count: bool,

    /// Meets the configured minimum quality score
    pub meets_quality: bool,

    /// Structurally complete (not a truncated fragment)
    pub is_complete: bool,

    /// Survived the quality gate
    pub passed_gate: bool,
}

/// LLM-produced enrichment, attached lazily and never computed by this core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub rating: Option<f32>,
    pub categories: Vec<String>,
    pub key_terms: Vec<String>,
}

/// A search hit with relevance score, score breakdown, and full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Unique node id
    pub id: String,

    /// Which store the result came from
    pub origin: Origin,

    /// Result text
    pub text: String,

    /// Word count of the text
    pub word_count: usize,

    /// Hierarchy level
    pub level: Level,

    /// Final relevance score; always equal to `breakdown.final_score`
    pub score: f32,

    /// Per-signal score diagnostics
    pub breakdown: ScoreBreakdown,

    /// Origin metadata
    pub provenance: Provenance,

    /// Quality flags
    pub quality: QualityIndicators,

    /// Lazily attached enrichment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,

    /// Embedding vector, only populated when explicitly requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl SearchResult {
    /// Convert a store node into a result.
    ///
    /// This is the single conversion point: every path that produces results
    /// (hybrid search, session re-scoring, navigation) goes through here so
    /// the breakdown is always shaped the same way.
    pub fn from_node(node: NodeRecord, breakdown: ScoreBreakdown) -> Self {
        let quality = QualityIndicators {
            quality_score: node.quality_score,
            meets_word_count: true,
            meets_quality: true,
            is_complete: node.is_complete,
            passed_gate: false,
        };

        let provenance = Provenance {
            origin: node.origin,
            source_platform: node.source_platform,
            external_id: node.external_id,
            thread_root_id: node.thread_root_id,
            thread_title: node.thread_title,
            parent_id: node.parent_id,
            book_context: match node.origin {
                Origin::Derived => node.book_context,
                Origin::Archive => None,
            },
            source_created_at: node.source_created_at,
            author: node.author,
            author_role: node.author_role,
            uri: node.uri,
        };

        Self {
            id: node.id,
            origin: node.origin,
            text: node.text,
            word_count: node.word_count,
            level: node.level,
            score: breakdown.final_score,
            breakdown,
            provenance,
            quality,
            enrichment: None,
            embedding: None,
        }
    }

    /// Update the final score, keeping `score` and the breakdown in sync
    pub fn set_final_score(&mut self, score: f32) {
        self.score = score;
        self.breakdown.final_score = score;
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.len() <= max_chars {
            self.text.clone()
        } else {
            let cut = self
                .text
                .char_indices()
                .take_while(|(i, _)| *i < max_chars)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            format!("{}...", &self.text[..cut])
        }
    }
}

/// Sort results descending by final score, stable for equal scores
pub fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// A topical grouping of session results, produced on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCluster {
    /// Cluster id
    pub id: Uuid,

    /// Human-readable label
    pub label: String,

    /// Centroid of the members' embeddings
    pub centroid: Vec<f32>,

    /// Member results
    pub members: Vec<SearchResult>,

    /// Mean member-to-centroid cosine similarity
    pub cohesion: f32,

    /// Id of the member closest to the centroid
    pub representative_id: String,
}
