//! Agentic search service: the end-to-end orchestrator
//!
//! Executes a query (embed -> dual search -> fuse -> filter -> limit),
//! manages session-scoped search, applies anchor and quality refinements,
//! and navigates the content hierarchy. The service itself is stateless per
//! request; the session manager and unified store are the only shared
//! resources, both injected at construction. No globals.

mod navigation;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use uuid::Uuid;

use crate::anchor::{self, Refinement, SemanticAnchor};
use crate::config::{SearchDefaults, StrataConfig};
use crate::embedding::EmbeddingProvider;
use crate::enrichment::Enricher;
use crate::error::{Result, StrataError};
use crate::fusion::{self, OverlapStats};
use crate::model::{
    sort_by_score, ContentCluster, Enrichment, Level, LevelFilter, ScoreBreakdown, SearchResult,
};
use crate::quality::{self, GateStats, QualityGateOptions};
use crate::session::{SearchHistoryEntry, SessionManager};
use crate::similarity::{centroid, cosine_similarity};
use crate::store::{NodeRecord, ScoredNode, StoreTarget, UnifiedStore};

/// Which retrieval signals a search uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Dense,
    Sparse,
}

/// Per-call search options. Unset fields fall back to the configured
/// defaults through `resolve_options`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum results to return
    pub limit: Option<usize>,

    /// Drop results scoring below this (final-score scale; only applied
    /// when set, fused RRF scores are not comparable to cosine thresholds)
    pub min_score: Option<f32>,

    /// Retrieval signals to use
    pub mode: SearchMode,

    /// Which store(s) to search
    pub target: StoreTarget,

    /// Hierarchy filter
    pub level: LevelFilter,

    /// Result ids to exclude
    pub exclude_ids: Vec<String>,

    /// Attach embedding vectors to returned results
    pub include_embeddings: bool,

    /// Dependency timeout override, in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Search options with every default applied
#[derive(Debug, Clone)]
struct ResolvedSearchOptions {
    limit: usize,
    min_score: Option<f32>,
    mode: SearchMode,
    target: StoreTarget,
    level: LevelFilter,
    exclude_ids: HashSet<String>,
    include_embeddings: bool,
    timeout: Duration,
    candidate_limit: usize,
}

/// Pure merge of per-call options over configured defaults
fn resolve_options(options: &SearchOptions, defaults: &SearchDefaults) -> ResolvedSearchOptions {
    let limit = options.limit.unwrap_or(defaults.limit);
    ResolvedSearchOptions {
        limit,
        min_score: options.min_score,
        mode: options.mode,
        target: options.target,
        level: options.level,
        exclude_ids: options.exclude_ids.iter().cloned().collect(),
        include_embeddings: options.include_embeddings,
        timeout: Duration::from_millis(options.timeout_ms.unwrap_or(defaults.timeout_ms)),
        candidate_limit: limit * defaults.candidate_multiplier,
    }
}

/// Per-call statistics returned with every search response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub dense_candidates: usize,
    pub sparse_candidates: usize,
    pub fused_count: usize,
    pub overlap: Option<OverlapStats>,
    pub embed_ms: u64,
    pub search_ms: u64,
    pub total_ms: u64,
}

/// A well-formed search response: results plus the stats explaining them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub stats: SearchStats,
    pub has_more: bool,
}

/// Options for `refine_results`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefineOptions {
    /// Re-score by similarity to this query before anchor processing
    pub query: Option<String>,

    /// Drop results scoring below this after anchor processing
    pub min_score: Option<f32>,

    /// Drop results below this word count
    pub min_word_count: Option<usize>,

    /// Truncate the refined set
    pub limit: Option<usize>,
}

/// Outcome of `refine_results`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineResponse {
    pub results: Vec<SearchResult>,
    pub stats: crate::anchor::RefinementStats,
}

/// Options for `discover_clusters`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub min_cluster_size: usize,
    pub max_clusters: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            max_clusters: 10,
        }
    }
}

/// One retrieval signal's outcome within a search call
enum SideOutcome {
    /// Not requested by the search mode
    Skipped,
    /// Failed or timed out; the call degrades to the other side
    Failed(String),
    Hits(Vec<ScoredNode>),
}

/// The orchestrator. Safe to share across callers; holds no request state.
pub struct SearchService {
    store: Arc<UnifiedStore>,
    sessions: Arc<SessionManager>,
    embedder: Arc<dyn EmbeddingProvider>,
    enricher: Option<Arc<dyn Enricher>>,
    config: StrataConfig,
}

impl SearchService {
    pub fn new(
        store: Arc<UnifiedStore>,
        sessions: Arc<SessionManager>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: StrataConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            embedder,
            enricher: None,
            config,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<UnifiedStore> {
        &self.store
    }

    /// Execute one query end-to-end: embed, run dense and sparse retrieval
    /// concurrently, fuse, convert, filter, truncate.
    ///
    /// A side that fails or times out degrades to empty; the call only
    /// fails with `DependencyUnavailable` when every requested side failed.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(StrataError::InvalidArgument(
                "Query text cannot be empty".to_string(),
            ));
        }

        let resolved = resolve_options(options, &self.config.search);
        let total_start = Instant::now();

        // Embed the query unless sparse-only
        let embed_start = Instant::now();
        let vector = if resolved.mode == SearchMode::Sparse {
            None
        } else {
            match timeout(resolved.timeout, self.embedder.embed(query)).await {
                Ok(Ok(vector)) => Some(Ok(vector)),
                Ok(Err(e)) => Some(Err(format!("embedding failed: {e}"))),
                Err(_) => Some(Err("embedding timed out".to_string())),
            }
        };
        let embed_ms = embed_start.elapsed().as_millis() as u64;

        let search_start = Instant::now();
        let (dense_outcome, sparse_outcome) = tokio::join!(
            self.dense_side(&vector, &resolved),
            self.sparse_side(query, &resolved),
        );
        let search_ms = search_start.elapsed().as_millis() as u64;

        let requested_sides = match resolved.mode {
            SearchMode::Hybrid => 2,
            _ => 1,
        };

        let mut failures: Vec<String> = Vec::new();
        let dense_hits = match dense_outcome {
            SideOutcome::Hits(hits) => hits,
            SideOutcome::Skipped => Vec::new(),
            SideOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "Dense side degraded to empty");
                failures.push(reason);
                Vec::new()
            }
        };
        let sparse_hits = match sparse_outcome {
            SideOutcome::Hits(hits) => hits,
            SideOutcome::Skipped => Vec::new(),
            SideOutcome::Failed(reason) => {
                tracing::warn!(reason = %reason, "Sparse side degraded to empty");
                failures.push(reason);
                Vec::new()
            }
        };

        if failures.len() == requested_sides {
            return Err(StrataError::DependencyUnavailable {
                context: failures.join("; "),
            });
        }

        let response = self.assemble_response(
            dense_hits,
            sparse_hits,
            &resolved,
            embed_ms,
            search_ms,
            total_start,
        );

        let response = match resolved.include_embeddings {
            true => self.attach_embeddings(response).await?,
            false => response,
        };

        tracing::debug!(
            results = response.results.len(),
            fused = response.stats.fused_count,
            total_ms = response.stats.total_ms,
            "Search completed"
        );

        Ok(response)
    }

    async fn dense_side(
        &self,
        vector: &Option<std::result::Result<Vec<f32>, String>>,
        resolved: &ResolvedSearchOptions,
    ) -> SideOutcome {
        let vector = match vector {
            None => return SideOutcome::Skipped,
            Some(Err(reason)) => return SideOutcome::Failed(reason.clone()),
            Some(Ok(vector)) => vector,
        };

        match timeout(
            resolved.timeout,
            self.store
                .search_by_embedding(vector, resolved.candidate_limit, resolved.target),
        )
        .await
        {
            Ok(Ok(hits)) => SideOutcome::Hits(hits),
            Ok(Err(e)) => SideOutcome::Failed(format!("dense search failed: {e}")),
            Err(_) => SideOutcome::Failed("dense search timed out".to_string()),
        }
    }

    async fn sparse_side(&self, query: &str, resolved: &ResolvedSearchOptions) -> SideOutcome {
        if resolved.mode == SearchMode::Dense {
            return SideOutcome::Skipped;
        }

        match timeout(
            resolved.timeout,
            self.store
                .search_by_keyword(query, resolved.candidate_limit, resolved.target),
        )
        .await
        {
            Ok(Ok(hits)) => SideOutcome::Hits(hits),
            Ok(Err(e)) => SideOutcome::Failed(format!("sparse search failed: {e}")),
            Err(_) => SideOutcome::Failed("sparse search timed out".to_string()),
        }
    }

    /// Fuse the two candidate lists and convert into the response shape
    fn assemble_response(
        &self,
        mut dense_hits: Vec<ScoredNode>,
        mut sparse_hits: Vec<ScoredNode>,
        resolved: &ResolvedSearchOptions,
        embed_ms: u64,
        search_ms: u64,
        total_start: Instant,
    ) -> SearchResponse {
        // Cross-origin merges arrive unranked; each signal list is ranked
        // here by raw score before fusion
        let by_score = |a: &ScoredNode, b: &ScoredNode| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        };
        dense_hits.sort_by(by_score);
        sparse_hits.sort_by(by_score);

        let mut nodes: HashMap<String, NodeRecord> = HashMap::new();
        let dense_pairs: Vec<(String, f32)> = dense_hits
            .into_iter()
            .map(|hit| {
                let pair = (hit.node.id.clone(), hit.score);
                nodes.entry(hit.node.id.clone()).or_insert(hit.node);
                pair
            })
            .collect();
        let sparse_pairs: Vec<(String, f32)> = sparse_hits
            .into_iter()
            .map(|hit| {
                let pair = (hit.node.id.clone(), hit.score);
                nodes.entry(hit.node.id.clone()).or_insert(hit.node);
                pair
            })
            .collect();

        let overlap = fusion::overlap_stats(&dense_pairs, &sparse_pairs);
        let fused = fusion::fuse(&dense_pairs, &sparse_pairs, &self.config.fusion);
        let fused_count = fused.len();

        let mut results: Vec<SearchResult> = fused
            .into_iter()
            .filter_map(|item| {
                let node = nodes.remove(&item.id)?;
                let breakdown = ScoreBreakdown {
                    dense_score: item.dense_score,
                    dense_rank: item.dense_rank,
                    sparse_score: item.sparse_score,
                    sparse_rank: item.sparse_rank,
                    fused_score: item.fused_score,
                    anchor_boost: None,
                    final_score: item.fused_score,
                };
                Some(SearchResult::from_node(node, breakdown))
            })
            .filter(|result| resolved.level.matches(result.level))
            .filter(|result| !resolved.exclude_ids.contains(&result.id))
            .filter(|result| {
                resolved
                    .min_score
                    .map(|min| result.score >= min)
                    .unwrap_or(true)
            })
            .collect();

        let has_more = results.len() > resolved.limit;
        results.truncate(resolved.limit);

        SearchResponse {
            results,
            stats: SearchStats {
                dense_candidates: dense_pairs.len(),
                sparse_candidates: sparse_pairs.len(),
                fused_count,
                overlap: Some(overlap),
                embed_ms,
                search_ms,
                total_ms: total_start.elapsed().as_millis() as u64,
            },
            has_more,
        }
    }

    async fn attach_embeddings(&self, mut response: SearchResponse) -> Result<SearchResponse> {
        let ids: Vec<String> = response.results.iter().map(|r| r.id.clone()).collect();
        let embeddings = self
            .store
            .get_embeddings(&ids)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        for result in &mut response.results {
            result.embedding = embeddings.get(&result.id).cloned();
        }
        Ok(response)
    }

    /// Search within a session: the session's exclusions are merged in, the
    /// results become the session's current set, and a history entry is
    /// appended after the call completes.
    pub async fn search_in_session(
        &self,
        session_id: Uuid,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let mut merged = options.clone();
        merged
            .exclude_ids
            .extend(session.excluded_ids.iter().cloned());

        let response = self.search(query, &merged).await?;

        self.sessions
            .replace_results(session_id, response.results.clone())
            .await?;
        self.sessions
            .add_history_entry(
                session_id,
                SearchHistoryEntry::new(
                    query,
                    serde_json::to_value(options).unwrap_or_default(),
                    response.results.len(),
                ),
            )
            .await?;

        Ok(response)
    }

    /// Drill down: re-score the session's existing result set against a new
    /// query. Costs O(existing results); the backing stores are not
    /// re-queried. Results with no stored embedding keep their old score.
    pub async fn search_within_results(
        &self,
        session_id: Uuid,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let resolved = resolve_options(options, &self.config.search);
        let threshold = options
            .min_score
            .unwrap_or(self.config.search.relevance_threshold);
        let total_start = Instant::now();

        let embed_start = Instant::now();
        let vector = timeout(resolved.timeout, self.embedder.embed(query))
            .await
            .map_err(|_| StrataError::DependencyUnavailable {
                context: "embedding timed out".to_string(),
            })?
            .map_err(|e| StrataError::DependencyUnavailable {
                context: format!("embedding failed: {e}"),
            })?;
        let embed_ms = embed_start.elapsed().as_millis() as u64;

        let ids: Vec<String> = session.results.iter().map(|r| r.id.clone()).collect();
        let embeddings = self
            .store
            .get_embeddings(&ids)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        let input_count = session.results.len();
        let mut results: Vec<SearchResult> = session
            .results
            .into_iter()
            .filter_map(|mut result| match embeddings.get(&result.id) {
                Some(embedding) => {
                    let score = cosine_similarity(&vector, embedding);
                    if score < threshold {
                        return None;
                    }
                    result.breakdown.dense_score = Some(score);
                    result.set_final_score(score);
                    Some(result)
                }
                // Data gap: keep the result unmodified rather than losing it
                None => Some(result),
            })
            .collect();

        sort_by_score(&mut results);
        let has_more = results.len() > resolved.limit;
        results.truncate(resolved.limit);

        self.sessions
            .replace_results(session_id, results.clone())
            .await?;
        self.sessions
            .add_history_entry(
                session_id,
                SearchHistoryEntry::new(
                    query,
                    serde_json::to_value(options).unwrap_or_default(),
                    results.len(),
                )
                .with_refinement("within-results"),
            )
            .await?;

        Ok(SearchResponse {
            stats: SearchStats {
                dense_candidates: input_count,
                sparse_candidates: 0,
                fused_count: results.len(),
                overlap: None,
                embed_ms,
                search_ms: 0,
                total_ms: total_start.elapsed().as_millis() as u64,
            },
            results,
            has_more,
        })
    }

    /// Refine the session's current results. When present, the steps run
    /// in a fixed order: query re-score, anchor boosting and filtering,
    /// minimum-score filter, minimum-word-count filter, sort, truncate.
    pub async fn refine_results(
        &self,
        session_id: Uuid,
        options: &RefineOptions,
    ) -> Result<RefineResponse> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let ids: Vec<String> = session.results.iter().map(|r| r.id.clone()).collect();
        let embeddings = self
            .store
            .get_embeddings(&ids)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        let anchors = session.anchor_set();
        let mut results = session.results;

        if let Some(query) = &options.query {
            let vector = timeout(
                Duration::from_millis(self.config.search.timeout_ms),
                self.embedder.embed(query),
            )
            .await
            .map_err(|_| StrataError::DependencyUnavailable {
                context: "embedding timed out".to_string(),
            })?
            .map_err(|e| StrataError::DependencyUnavailable {
                context: format!("embedding failed: {e}"),
            })?;

            for result in &mut results {
                if let Some(embedding) = embeddings.get(&result.id) {
                    let score = cosine_similarity(&vector, embedding);
                    result.breakdown.dense_score = Some(score);
                    result.set_final_score(score);
                }
            }
        }

        let refinement = anchor::refine(results, &embeddings, &anchors, &self.config.anchors);
        let stats = refinement.stats.clone();
        let mut results = refinement.results;

        if let Some(min_score) = options.min_score {
            results.retain(|r| r.score >= min_score);
        }
        if let Some(min_words) = options.min_word_count {
            results.retain(|r| r.word_count >= min_words);
        }

        sort_by_score(&mut results);
        if let Some(limit) = options.limit {
            results.truncate(limit);
        }

        self.sessions
            .replace_results(session_id, results.clone())
            .await?;
        self.sessions
            .add_history_entry(
                session_id,
                SearchHistoryEntry::new(
                    options.query.clone().unwrap_or_default(),
                    serde_json::to_value(options).unwrap_or_default(),
                    results.len(),
                )
                .with_refinement("refine"),
            )
            .await?;

        Ok(RefineResponse { results, stats })
    }

    /// Register an existing result's embedding as a positive session anchor
    pub async fn add_positive_anchor(
        &self,
        session_id: Uuid,
        result_id: &str,
        name: Option<String>,
    ) -> Result<SemanticAnchor> {
        let anchor = self.build_anchor(session_id, result_id, name).await?;
        self.sessions
            .add_positive_anchor(session_id, anchor.clone())
            .await?;
        Ok(anchor)
    }

    /// Register an existing result's embedding as a negative session anchor
    pub async fn add_negative_anchor(
        &self,
        session_id: Uuid,
        result_id: &str,
        name: Option<String>,
    ) -> Result<SemanticAnchor> {
        let anchor = self.build_anchor(session_id, result_id, name).await?;
        self.sessions
            .add_negative_anchor(session_id, anchor.clone())
            .await?;
        Ok(anchor)
    }

    async fn build_anchor(
        &self,
        session_id: Uuid,
        result_id: &str,
        name: Option<String>,
    ) -> Result<SemanticAnchor> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let embedding = self
            .store
            .get_embedding(result_id)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?
            .ok_or_else(|| StrataError::MissingEmbedding {
                id: result_id.to_string(),
            })?;

        let label = name.unwrap_or_else(|| {
            session
                .results
                .iter()
                .find(|r| r.id == result_id)
                .map(|r| r.preview(60))
                .unwrap_or_else(|| result_id.to_string())
        });

        Ok(SemanticAnchor::new(label, embedding))
    }

    /// Re-score and filter the whole current session result set using every
    /// anchor attached to the session, persisting the outcome.
    pub async fn apply_anchors(&self, session_id: Uuid) -> Result<Refinement> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let ids: Vec<String> = session.results.iter().map(|r| r.id.clone()).collect();
        let embeddings = self
            .store
            .get_embeddings(&ids)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        let anchors = session.anchor_set();
        let refinement =
            anchor::refine(session.results, &embeddings, &anchors, &self.config.anchors);

        self.sessions
            .replace_results(session_id, refinement.results.clone())
            .await?;
        self.sessions
            .add_history_entry(
                session_id,
                SearchHistoryEntry::new(
                    "",
                    serde_json::json!({
                        "positive_anchors": anchors.positive.len(),
                        "negative_anchors": anchors.negative.len(),
                    }),
                    refinement.results.len(),
                )
                .with_refinement("anchors"),
            )
            .await?;

        Ok(refinement)
    }

    /// Exclude result ids from future responses in this session
    pub async fn exclude_results(&self, session_id: Uuid, ids: &[String]) -> Result<usize> {
        self.sessions.exclude_results(session_id, ids).await
    }

    /// Apply the quality gate to the session's current results and persist
    /// the survivors. `None` options use the configured gate defaults.
    pub async fn scrub_results(
        &self,
        session_id: Uuid,
        options: Option<QualityGateOptions>,
    ) -> Result<(Vec<SearchResult>, GateStats)> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let options = options.unwrap_or_else(|| self.config.quality.clone());
        let (survivors, stats) = quality::apply_gate(session.results, &options);

        self.sessions
            .replace_results(session_id, survivors.clone())
            .await?;
        self.sessions
            .add_history_entry(
                session_id,
                SearchHistoryEntry::new(
                    "",
                    serde_json::to_value(&options).unwrap_or_default(),
                    survivors.len(),
                )
                .with_refinement("scrub"),
            )
            .await?;

        Ok((survivors, stats))
    }

    /// Group the session's current results into topical clusters.
    ///
    /// Baseline strategy: group by hierarchy level, with each group's
    /// centroid computed from its members' embeddings. Cohesion is the mean
    /// member-to-centroid similarity.
    pub async fn discover_clusters(
        &self,
        session_id: Uuid,
        options: &ClusterOptions,
    ) -> Result<Vec<ContentCluster>> {
        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let ids: Vec<String> = session.results.iter().map(|r| r.id.clone()).collect();
        let embeddings = self
            .store
            .get_embeddings(&ids)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        let mut by_level: HashMap<Level, Vec<SearchResult>> = HashMap::new();
        for result in session.results {
            by_level.entry(result.level).or_default().push(result);
        }

        let mut clusters = Vec::new();
        for (level, members) in by_level {
            if members.len() < options.min_cluster_size {
                continue;
            }

            let member_embeddings: Vec<Vec<f32>> = members
                .iter()
                .filter_map(|m| embeddings.get(&m.id).cloned())
                .collect();
            if member_embeddings.is_empty() {
                continue;
            }

            let center = centroid(&member_embeddings)?;

            let mut cohesion_sum = 0.0;
            let mut representative: Option<(&SearchResult, f32)> = None;
            let mut scored_members = 0usize;

            for member in &members {
                if let Some(embedding) = embeddings.get(&member.id) {
                    let sim = cosine_similarity(embedding, &center);
                    cohesion_sum += sim;
                    scored_members += 1;
                    if representative.map(|(_, best)| sim > best).unwrap_or(true) {
                        representative = Some((member, sim));
                    }
                }
            }

            let label = match level {
                Level::Base => "base-chunks",
                Level::Summary => "summaries",
                Level::Apex => "apex",
            };

            clusters.push(ContentCluster {
                id: Uuid::new_v4(),
                label: label.to_string(),
                centroid: center,
                cohesion: cohesion_sum / scored_members as f32,
                representative_id: representative
                    .map(|(member, _)| member.id.clone())
                    .unwrap_or_default(),
                members,
            });
        }

        clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()));
        clusters.truncate(options.max_clusters);
        Ok(clusters)
    }

    /// Attach LLM enrichment to one session result. Only runs when the
    /// caller asks; the default search path never touches the enricher.
    pub async fn enrich_result(&self, session_id: Uuid, result_id: &str) -> Result<Enrichment> {
        let enricher = self.enricher.as_ref().ok_or_else(|| {
            StrataError::Config("No enrichment provider configured".to_string())
        })?;

        let session = self.sessions.get_session(session_id).await.ok_or_else(|| {
            StrataError::SessionNotFound {
                id: session_id.to_string(),
            }
        })?;

        let result = session
            .results
            .iter()
            .find(|r| r.id == result_id)
            .ok_or_else(|| {
                StrataError::InvalidArgument(format!("Result {result_id} not in session"))
            })?;

        let enrichment = enricher
            .enrich(&result.text)
            .await
            .map_err(|e| StrataError::Other(anyhow::anyhow!(e)))?;

        self.sessions
            .attach_enrichment(session_id, result_id, enrichment.clone())
            .await?;

        Ok(enrichment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_options_applies_defaults() {
        let defaults = SearchDefaults::default();
        let resolved = resolve_options(&SearchOptions::default(), &defaults);

        assert_eq!(resolved.limit, defaults.limit);
        assert_eq!(resolved.candidate_limit, defaults.limit * defaults.candidate_multiplier);
        assert_eq!(resolved.timeout, Duration::from_millis(defaults.timeout_ms));
        assert_eq!(resolved.mode, SearchMode::Hybrid);
        assert!(resolved.min_score.is_none());
    }

    #[test]
    fn test_resolve_options_caller_overrides_win() {
        let defaults = SearchDefaults::default();
        let options = SearchOptions {
            limit: Some(5),
            timeout_ms: Some(100),
            min_score: Some(0.5),
            mode: SearchMode::Dense,
            ..Default::default()
        };

        let resolved = resolve_options(&options, &defaults);
        assert_eq!(resolved.limit, 5);
        assert_eq!(resolved.candidate_limit, 5 * defaults.candidate_multiplier);
        assert_eq!(resolved.timeout, Duration::from_millis(100));
        assert_eq!(resolved.min_score, Some(0.5));
        assert_eq!(resolved.mode, SearchMode::Dense);
    }
}
