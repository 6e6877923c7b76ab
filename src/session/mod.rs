//! Search session management
//!
//! The `SessionManager` is the single authority for all mutable per-session
//! state: accumulated results, search history, anchors, exclusions, pins.
//! Other components never hold references into session internals; they read
//! snapshots and request mutations through the manager's API.
//!
//! Concurrency discipline: each session lives behind its own lock inside an
//! outer map, so mutations on the same session id are serialized while
//! operations on distinct ids never block each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::anchor::{AnchorSet, SemanticAnchor};
use crate::error::{Result, StrataError};
use crate::model::SearchResult;

/// Default cap on concurrently held sessions
pub const DEFAULT_MAX_SESSIONS: usize = 100;
/// Default session time-to-live since last update, in seconds
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Session eviction policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Maximum number of sessions held at once
    pub max_sessions: usize,

    /// Time-to-live since last update, in seconds
    pub ttl_secs: i64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

/// One search executed within a session. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    /// Entry id
    pub id: Uuid,

    /// Query text as issued
    pub query: String,

    /// Snapshot of the options used
    pub options: serde_json::Value,

    /// Number of results the call produced
    pub result_count: usize,

    /// When the call completed
    pub timestamp: DateTime<Utc>,

    /// Refinement descriptor for non-query operations ("anchors", "scrub", ...)
    pub refinement: Option<String>,
}

impl SearchHistoryEntry {
    pub fn new(query: impl Into<String>, options: serde_json::Value, result_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            options,
            result_count,
            timestamp: Utc::now(),
            refinement: None,
        }
    }

    pub fn with_refinement(mut self, refinement: impl Into<String>) -> Self {
        self.refinement = Some(refinement.into());
        self
    }
}

/// Server-side state for one caller's in-progress interactive search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSession {
    /// Unique session identifier
    pub id: Uuid,

    /// Optional human-readable name
    pub name: Option<String>,

    /// Current ordered result list
    pub results: Vec<SearchResult>,

    /// Ordered search history
    pub history: Vec<SearchHistoryEntry>,

    /// Positive ("more like this") anchors
    pub positive_anchors: Vec<SemanticAnchor>,

    /// Negative ("less like this") anchors
    pub negative_anchors: Vec<SemanticAnchor>,

    /// Result ids excluded from future responses
    pub excluded_ids: HashSet<String>,

    /// Result ids pinned by the caller. A pinned id is never excluded.
    pub pinned_ids: HashSet<String>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Last mutation time; drives TTL eviction
    pub updated_at: DateTime<Utc>,

    /// Number of searches run in this session
    pub search_count: u64,

    /// Text of the most recent query
    pub last_query: Option<String>,

    /// Free-form caller notes
    pub notes: Option<String>,
}

impl SearchSession {
    fn new(name: Option<String>, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            results: Vec::new(),
            history: Vec::new(),
            positive_anchors: Vec::new(),
            negative_anchors: Vec::new(),
            excluded_ids: HashSet::new(),
            pinned_ids: HashSet::new(),
            created_at: now,
            updated_at: now,
            search_count: 0,
            last_query: None,
            notes,
        }
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned_ids.contains(id)
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded_ids.contains(id)
    }

    /// All anchors currently attached, as a refinement-ready set
    pub fn anchor_set(&self) -> AnchorSet {
        AnchorSet {
            positive: self.positive_anchors.clone(),
            negative: self.negative_anchors.clone(),
        }
    }
}

/// Aggregate statistics across all sessions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    /// Sessions updated within the TTL window
    pub active_sessions: usize,
    pub total_searches: u64,
    pub total_results: usize,
}

/// Owner of all session lifecycle and mutation
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<RwLock<SearchSession>>>>,
    limits: SessionLimits,
}

impl SessionManager {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SessionLimits::default())
    }

    /// Create a new session. Runs eviction first so the cap holds.
    pub async fn create_session(
        &self,
        name: Option<String>,
        notes: Option<String>,
    ) -> SearchSession {
        self.evict_stale().await;

        let session = SearchSession::new(name, notes);
        let snapshot = session.clone();

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, Arc::new(RwLock::new(session)));
        drop(sessions);

        self.enforce_capacity().await;
        snapshot
    }

    /// Snapshot of a session. Unknown ids are absence, not an error.
    pub async fn get_session(&self, id: Uuid) -> Option<SearchSession> {
        let handle = self.sessions.read().await.get(&id).cloned()?;
        let session = handle.read().await;
        Some(session.clone())
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StrataError::SessionNotFound { id: id.to_string() })
    }

    pub async fn list_sessions(&self) -> Vec<SearchSession> {
        let handles: Vec<Arc<RwLock<SearchSession>>> =
            self.sessions.read().await.values().cloned().collect();

        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(handle.read().await.clone());
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    /// Remove every session, returning how many were removed
    pub async fn clear_all_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    /// Apply a mutation under the session's write lock.
    ///
    /// The outer map lock is released before the per-session lock is taken,
    /// so a slow mutation on one session never blocks another session.
    async fn mutate<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut SearchSession) -> T,
    ) -> Result<T> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StrataError::SessionNotFound { id: id.to_string() })?;

        let mut session = handle.write().await;
        let outcome = apply(&mut session);
        session.updated_at = Utc::now();
        Ok(outcome)
    }

    /// Append results to the session's current list, skipping ids already held
    pub async fn add_results(&self, id: Uuid, results: Vec<SearchResult>) -> Result<usize> {
        self.mutate(id, |session| {
            let existing: HashSet<String> =
                session.results.iter().map(|r| r.id.clone()).collect();
            let mut added = 0;
            for result in results {
                if !existing.contains(&result.id) {
                    session.results.push(result);
                    added += 1;
                }
            }
            added
        })
        .await
    }

    /// Replace the session's current result list atomically
    pub async fn replace_results(&self, id: Uuid, results: Vec<SearchResult>) -> Result<()> {
        self.mutate(id, |session| {
            session.results = results;
        })
        .await
    }

    pub async fn clear_results(&self, id: Uuid) -> Result<()> {
        self.mutate(id, |session| session.results.clear()).await
    }

    /// Append a history entry and update search metadata. Entries land in
    /// the order their originating calls completed.
    pub async fn add_history_entry(&self, id: Uuid, entry: SearchHistoryEntry) -> Result<()> {
        self.mutate(id, |session| {
            session.search_count += 1;
            session.last_query = Some(entry.query.clone());
            session.history.push(entry);
        })
        .await
    }

    pub async fn get_history(&self, id: Uuid) -> Result<Vec<SearchHistoryEntry>> {
        self.mutate(id, |session| session.history.clone()).await
    }

    /// Attach a positive anchor. Adding an id already present is a no-op.
    pub async fn add_positive_anchor(&self, id: Uuid, anchor: SemanticAnchor) -> Result<()> {
        self.mutate(id, |session| {
            if !session.positive_anchors.iter().any(|a| a.id == anchor.id) {
                session.positive_anchors.push(anchor);
            }
        })
        .await
    }

    /// Attach a negative anchor. Adding an id already present is a no-op.
    pub async fn add_negative_anchor(&self, id: Uuid, anchor: SemanticAnchor) -> Result<()> {
        self.mutate(id, |session| {
            if !session.negative_anchors.iter().any(|a| a.id == anchor.id) {
                session.negative_anchors.push(anchor);
            }
        })
        .await
    }

    /// Remove an anchor from either list; returns whether one was removed
    pub async fn remove_anchor(&self, id: Uuid, anchor_id: Uuid) -> Result<bool> {
        self.mutate(id, |session| {
            let before =
                session.positive_anchors.len() + session.negative_anchors.len();
            session.positive_anchors.retain(|a| a.id != anchor_id);
            session.negative_anchors.retain(|a| a.id != anchor_id);
            before > session.positive_anchors.len() + session.negative_anchors.len()
        })
        .await
    }

    pub async fn clear_anchors(&self, id: Uuid) -> Result<()> {
        self.mutate(id, |session| {
            session.positive_anchors.clear();
            session.negative_anchors.clear();
        })
        .await
    }

    /// Exclude result ids from future responses. Pinned ids are skipped:
    /// excluding a pinned id is a no-op, not an error.
    pub async fn exclude_results(&self, id: Uuid, result_ids: &[String]) -> Result<usize> {
        let ids: Vec<String> = result_ids.to_vec();
        self.mutate(id, move |session| {
            let mut excluded = 0;
            for result_id in ids {
                if session.pinned_ids.contains(&result_id) {
                    continue;
                }
                if session.excluded_ids.insert(result_id) {
                    excluded += 1;
                }
            }
            excluded
        })
        .await
    }

    pub async fn unexclude_results(&self, id: Uuid, result_ids: &[String]) -> Result<()> {
        let ids: Vec<String> = result_ids.to_vec();
        self.mutate(id, move |session| {
            for result_id in &ids {
                session.excluded_ids.remove(result_id);
            }
        })
        .await
    }

    /// Pin result ids. Pinning clears any exclusion on the same id, keeping
    /// the pinned/excluded sets disjoint.
    pub async fn pin_results(&self, id: Uuid, result_ids: &[String]) -> Result<()> {
        let ids: Vec<String> = result_ids.to_vec();
        self.mutate(id, move |session| {
            for result_id in ids {
                session.excluded_ids.remove(&result_id);
                session.pinned_ids.insert(result_id);
            }
        })
        .await
    }

    pub async fn unpin_results(&self, id: Uuid, result_ids: &[String]) -> Result<()> {
        let ids: Vec<String> = result_ids.to_vec();
        self.mutate(id, move |session| {
            for result_id in &ids {
                session.pinned_ids.remove(result_id);
            }
        })
        .await
    }

    /// Attach enrichment to one held result. Unknown result ids are a no-op;
    /// the result may already have been refined away.
    pub async fn attach_enrichment(
        &self,
        id: Uuid,
        result_id: &str,
        enrichment: crate::model::Enrichment,
    ) -> Result<()> {
        let result_id = result_id.to_string();
        self.mutate(id, move |session| {
            if let Some(result) = session.results.iter_mut().find(|r| r.id == result_id) {
                result.enrichment = Some(enrichment);
            }
        })
        .await
    }

    pub async fn rename_session(&self, id: Uuid, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.mutate(id, move |session| {
            session.name = Some(name);
        })
        .await
    }

    pub async fn set_notes(&self, id: Uuid, notes: impl Into<String>) -> Result<()> {
        let notes = notes.into();
        self.mutate(id, move |session| {
            session.notes = Some(notes);
        })
        .await
    }

    /// Aggregate statistics across all sessions
    pub async fn get_stats(&self) -> SessionStats {
        let handles: Vec<Arc<RwLock<SearchSession>>> =
            self.sessions.read().await.values().cloned().collect();

        let ttl = Duration::seconds(self.limits.ttl_secs);
        let now = Utc::now();
        let mut stats = SessionStats::default();

        for handle in handles {
            let session = handle.read().await;
            stats.total_sessions += 1;
            if now - session.updated_at <= ttl {
                stats.active_sessions += 1;
            }
            stats.total_searches += session.search_count;
            stats.total_results += session.results.len();
        }

        stats
    }

    /// Drop sessions whose TTL has elapsed. A session with a writer in
    /// flight holds its write lock, so `try_write` failing means it is being
    /// mutated right now and must not be evicted on this pass.
    async fn evict_stale(&self) {
        let ttl = Duration::seconds(self.limits.ttl_secs);
        let now = Utc::now();

        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();

        for (id, handle) in sessions.iter() {
            if let Ok(session) = handle.try_write() {
                if now - session.updated_at > ttl {
                    expired.push(*id);
                }
            }
        }

        for id in expired {
            tracing::debug!(session_id = %id, "Evicting expired session");
            sessions.remove(&id);
        }
    }

    /// Evict least-recently-updated sessions until the cap holds
    async fn enforce_capacity(&self) {
        let mut sessions = self.sessions.write().await;
        if sessions.len() <= self.limits.max_sessions {
            return;
        }

        let mut candidates: Vec<(Uuid, DateTime<Utc>)> = Vec::new();
        for (id, handle) in sessions.iter() {
            if let Ok(session) = handle.try_write() {
                candidates.push((*id, session.updated_at));
            }
        }
        candidates.sort_by_key(|(_, updated_at)| *updated_at);

        let excess = sessions.len().saturating_sub(self.limits.max_sessions);
        for (id, _) in candidates.into_iter().take(excess) {
            tracing::debug!(session_id = %id, "Evicting session over capacity");
            sessions.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let manager = SessionManager::with_defaults();
        let session = manager
            .create_session(Some("probe".to_string()), None)
            .await;

        let fetched = manager.get_session(session.id).await.unwrap();
        assert_eq!(fetched.name.as_deref(), Some("probe"));
        assert!(fetched.results.is_empty());
        assert_eq!(fetched.search_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_get_is_absence_but_mutation_is_error() {
        let manager = SessionManager::with_defaults();
        let unknown = Uuid::new_v4();

        assert!(manager.get_session(unknown).await.is_none());

        let err = manager.clear_results(unknown).await.unwrap_err();
        assert!(matches!(err, StrataError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_pin_clears_exclusion() {
        let manager = SessionManager::with_defaults();
        let session = manager.create_session(None, None).await;

        manager
            .exclude_results(session.id, &["r1".to_string()])
            .await
            .unwrap();
        manager
            .pin_results(session.id, &["r1".to_string()])
            .await
            .unwrap();

        let state = manager.get_session(session.id).await.unwrap();
        assert!(state.is_pinned("r1"));
        assert!(!state.is_excluded("r1"));
    }

    #[tokio::test]
    async fn test_exclude_pinned_is_noop() {
        let manager = SessionManager::with_defaults();
        let session = manager.create_session(None, None).await;

        manager
            .pin_results(session.id, &["r1".to_string()])
            .await
            .unwrap();
        let excluded = manager
            .exclude_results(session.id, &["r1".to_string()])
            .await
            .unwrap();

        assert_eq!(excluded, 0);
        let state = manager.get_session(session.id).await.unwrap();
        assert!(state.is_pinned("r1"));
        assert!(!state.is_excluded("r1"));
    }

    #[tokio::test]
    async fn test_anchor_add_idempotent() {
        let manager = SessionManager::with_defaults();
        let session = manager.create_session(None, None).await;

        let anchor = SemanticAnchor::new("topic", vec![1.0, 0.0]);
        manager
            .add_positive_anchor(session.id, anchor.clone())
            .await
            .unwrap();
        manager
            .add_positive_anchor(session.id, anchor.clone())
            .await
            .unwrap();

        let state = manager.get_session(session.id).await.unwrap();
        assert_eq!(state.positive_anchors.len(), 1);

        assert!(manager.remove_anchor(session.id, anchor.id).await.unwrap());
        assert!(!manager.remove_anchor(session.id, anchor.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_history_updates_metadata() {
        let manager = SessionManager::with_defaults();
        let session = manager.create_session(None, None).await;

        let entry = SearchHistoryEntry::new("rust lifetimes", serde_json::json!({}), 7);
        manager.add_history_entry(session.id, entry).await.unwrap();

        let state = manager.get_session(session.id).await.unwrap();
        assert_eq!(state.search_count, 1);
        assert_eq!(state.last_query.as_deref(), Some("rust lifetimes"));
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].result_count, 7);
    }

    #[tokio::test]
    async fn test_capacity_eviction_drops_oldest() {
        let manager = SessionManager::new(SessionLimits {
            max_sessions: 2,
            ttl_secs: 3600,
        });

        let first = manager.create_session(Some("first".to_string()), None).await;
        let _second = manager.create_session(Some("second".to_string()), None).await;
        // Touch the first so the second becomes the eviction candidate
        manager.rename_session(first.id, "first-renamed").await.unwrap();
        let _third = manager.create_session(Some("third".to_string()), None).await;

        assert_eq!(manager.list_sessions().await.len(), 2);
        assert!(manager.get_session(first.id).await.is_some());
    }

    #[tokio::test]
    async fn test_ttl_eviction() {
        let manager = SessionManager::new(SessionLimits {
            max_sessions: 10,
            ttl_secs: 0,
        });

        let stale = manager.create_session(None, None).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // Creation runs the TTL sweep
        let _fresh = manager.create_session(None, None).await;
        assert!(manager.get_session(stale.id).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_all_and_stats() {
        let manager = SessionManager::with_defaults();
        let a = manager.create_session(None, None).await;
        let _b = manager.create_session(None, None).await;

        manager
            .add_history_entry(
                a.id,
                SearchHistoryEntry::new("q", serde_json::json!({}), 3),
            )
            .await
            .unwrap();

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_searches, 1);

        assert_eq!(manager.clear_all_sessions().await, 2);
        assert_eq!(manager.get_stats().await.total_sessions, 0);
    }
}
