//! Stateless quality gate over result lists
//!
//! Removes low-value results (too short, system-authored, below a
//! precomputed quality score) and reports a per-reason counter for every
//! drop so callers can audit why result counts shrank.

use serde::{Deserialize, Serialize};

use crate::model::SearchResult;

/// Word-count floor for the "trivially short" scrub. Distinct from (and
/// much smaller than) the caller-supplied minimum word count.
pub const TRIVIAL_WORD_FLOOR: usize = 5;

/// Options driving one gate pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityGateOptions {
    /// Exclude results below this word count
    pub min_word_count: Option<usize>,

    /// Exclude results below this precomputed quality score
    pub min_quality: Option<f32>,

    /// Scrub system-authored content (author role == "system")
    pub scrub_system: bool,

    /// Scrub trivially short content (below `TRIVIAL_WORD_FLOOR` words)
    pub scrub_trivial: bool,

    /// Keep only results from this author role
    pub author_role: Option<String>,
}

/// Per-reason drop counters for one gate pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub input_count: usize,
    pub output_count: usize,
    pub below_word_count: usize,
    pub below_quality: usize,
    pub system_authored: usize,
    pub trivial: usize,
    pub wrong_role: usize,
}

/// Apply the gate. Stateless and idempotent: gating an already-gated list
/// with the same options drops nothing further.
pub fn apply_gate(
    results: Vec<SearchResult>,
    options: &QualityGateOptions,
) -> (Vec<SearchResult>, GateStats) {
    let mut stats = GateStats {
        input_count: results.len(),
        ..Default::default()
    };

    let mut survivors = Vec::with_capacity(results.len());

    for mut result in results {
        if let Some(min_words) = options.min_word_count {
            if result.word_count < min_words {
                stats.below_word_count += 1;
                continue;
            }
        }

        if let Some(min_quality) = options.min_quality {
            if result.quality.quality_score < min_quality {
                stats.below_quality += 1;
                continue;
            }
        }

        if options.scrub_system && result.provenance.author_role.as_deref() == Some("system") {
            stats.system_authored += 1;
            continue;
        }

        if options.scrub_trivial && result.word_count < TRIVIAL_WORD_FLOOR {
            stats.trivial += 1;
            continue;
        }

        if let Some(role) = &options.author_role {
            if result.provenance.author_role.as_deref() != Some(role.as_str()) {
                stats.wrong_role += 1;
                continue;
            }
        }

        result.quality.meets_word_count = options
            .min_word_count
            .map(|min| result.word_count >= min)
            .unwrap_or(result.quality.meets_word_count);
        result.quality.meets_quality = options
            .min_quality
            .map(|min| result.quality.quality_score >= min)
            .unwrap_or(result.quality.meets_quality);
        result.quality.passed_gate = true;

        survivors.push(result);
    }

    stats.output_count = survivors.len();
    (survivors, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, Origin, Provenance, QualityIndicators, ScoreBreakdown};

    fn result(id: &str, words: usize, quality: f32, role: Option<&str>) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            origin: Origin::Archive,
            text: vec!["word"; words].join(" "),
            word_count: words,
            level: Level::Base,
            score: 0.5,
            breakdown: ScoreBreakdown {
                fused_score: 0.5,
                final_score: 0.5,
                ..Default::default()
            },
            provenance: Provenance {
                origin: Origin::Archive,
                source_platform: None,
                external_id: None,
                thread_root_id: None,
                thread_title: None,
                parent_id: None,
                book_context: None,
                source_created_at: None,
                author: None,
                author_role: role.map(|r| r.to_string()),
                uri: None,
            },
            quality: QualityIndicators {
                quality_score: quality,
                ..Default::default()
            },
            enrichment: None,
            embedding: None,
        }
    }

    #[test]
    fn test_word_count_filter() {
        let results = vec![result("a", 50, 0.9, None), result("b", 3, 0.9, None)];
        let options = QualityGateOptions {
            min_word_count: Some(10),
            ..Default::default()
        };

        let (kept, stats) = apply_gate(results, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
        assert_eq!(stats.below_word_count, 1);
        assert!(kept[0].quality.passed_gate);
        assert!(kept[0].quality.meets_word_count);
    }

    #[test]
    fn test_quality_score_filter() {
        let results = vec![result("a", 50, 0.9, None), result("b", 50, 0.2, None)];
        let options = QualityGateOptions {
            min_quality: Some(0.5),
            ..Default::default()
        };

        let (kept, stats) = apply_gate(results, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.below_quality, 1);
    }

    #[test]
    fn test_system_scrub() {
        let results = vec![
            result("a", 50, 0.9, Some("user")),
            result("b", 50, 0.9, Some("system")),
        ];
        let options = QualityGateOptions {
            scrub_system: true,
            ..Default::default()
        };

        let (kept, stats) = apply_gate(results, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
        assert_eq!(stats.system_authored, 1);
    }

    #[test]
    fn test_trivial_scrub_uses_fixed_floor() {
        let results = vec![result("a", 4, 0.9, None), result("b", 5, 0.9, None)];
        let options = QualityGateOptions {
            scrub_trivial: true,
            ..Default::default()
        };

        let (kept, stats) = apply_gate(results, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");
        assert_eq!(stats.trivial, 1);
    }

    #[test]
    fn test_role_filter() {
        let results = vec![
            result("a", 50, 0.9, Some("assistant")),
            result("b", 50, 0.9, Some("user")),
            result("c", 50, 0.9, None),
        ];
        let options = QualityGateOptions {
            author_role: Some("user".to_string()),
            ..Default::default()
        };

        let (kept, stats) = apply_gate(results, &options);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "b");
        assert_eq!(stats.wrong_role, 2);
    }

    #[test]
    fn test_gate_idempotent() {
        let results = vec![
            result("a", 50, 0.9, Some("user")),
            result("b", 3, 0.9, Some("system")),
            result("c", 50, 0.1, Some("user")),
        ];
        let options = QualityGateOptions {
            min_word_count: Some(10),
            min_quality: Some(0.5),
            scrub_system: true,
            scrub_trivial: true,
            author_role: None,
        };

        let (once, _) = apply_gate(results, &options);
        let once_ids: Vec<_> = once.iter().map(|r| r.id.clone()).collect();

        let (twice, stats) = apply_gate(once, &options);
        let twice_ids: Vec<_> = twice.iter().map(|r| r.id.clone()).collect();

        assert_eq!(once_ids, twice_ids);
        assert_eq!(stats.input_count, stats.output_count);
    }

    #[test]
    fn test_empty_options_pass_everything() {
        let results = vec![result("a", 1, 0.0, Some("system"))];
        let (kept, stats) = apply_gate(results, &QualityGateOptions::default());

        assert_eq!(kept.len(), 1);
        assert_eq!(stats.output_count, 1);
        assert!(kept[0].quality.passed_gate);
    }
}
