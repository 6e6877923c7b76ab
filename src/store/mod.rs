//! Unified store adapter over the archive and derived-book backends
//!
//! The service never special-cases which physical store a node lives in:
//! `UnifiedStore` exposes one search/query contract and tags every result
//! with its origin. A backend that is not configured behaves as a
//! well-defined empty implementation, never as an error, so the engine runs
//! correctly with only one store present.

mod memory;

pub use memory::MemoryBackend;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Level, LevelFilter, Origin};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend query failed: {0}")]
    Backend(String),

    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

/// A content node as stored, before conversion into a search result.
///
/// The `origin` discriminant distinguishes archive from derived content;
/// conversion into `SearchResult` branches on it exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique node id
    pub id: String,

    /// Which store owns the node
    pub origin: Origin,

    /// Node text
    pub text: String,

    /// Word count of the text
    pub word_count: usize,

    /// Hierarchy level
    pub level: Level,

    /// Parent node id, one level up
    pub parent_id: Option<String>,

    /// Root id of the containing thread/conversation
    pub thread_root_id: Option<String>,

    /// Title of the containing thread
    pub thread_title: Option<String>,

    /// Source platform tag
    pub source_platform: Option<String>,

    /// Original id assigned by the source platform
    pub external_id: Option<String>,

    /// Author identifier
    pub author: Option<String>,

    /// Author role ("user", "assistant", "system", ...)
    pub author_role: Option<String>,

    /// When the source content was created
    pub source_created_at: Option<DateTime<Utc>>,

    /// Canonical URI back to the content
    pub uri: Option<String>,

    /// Derived-book context (chapter/section path)
    pub book_context: Option<String>,

    /// Quality score precomputed by the ingestion pipeline
    pub quality_score: f32,

    /// Whether the node is structurally complete
    pub is_complete: bool,
}

/// A node with the raw score its backend assigned it
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: NodeRecord,
    pub score: f32,
}

/// Which backend(s) an operation addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTarget {
    Archive,
    Derived,
    #[default]
    All,
}

/// Node listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeQuery {
    /// Only nodes whose parent id equals this
    pub parent_id: Option<String>,

    /// Only nodes sharing this thread root
    pub thread_root_id: Option<String>,

    /// Hierarchy filter
    pub level: LevelFilter,

    /// Page offset
    pub offset: usize,

    /// Page size; 0 means unbounded
    pub limit: usize,
}

/// Result of a `query_nodes` call across both stores
#[derive(Debug, Clone, Default)]
pub struct NodeQueryPage {
    pub archive_nodes: Vec<NodeRecord>,
    pub derived_nodes: Vec<NodeRecord>,
    pub total: usize,
    pub has_more: bool,
}

/// One physical backend: vector search, keyword search, node access.
///
/// Implementations live outside this crate (a vector database, a full-text
/// index); `MemoryBackend` is the in-crate reference implementation.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Vector-similarity search, best first
    async fn search_by_embedding(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredNode>, StoreError>;

    /// Keyword/full-text search, best first
    async fn search_by_keyword(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredNode>, StoreError>;

    async fn get_node(&self, id: &str) -> Result<Option<NodeRecord>, StoreError>;

    async fn get_nodes(&self, ids: &[String]) -> Result<Vec<NodeRecord>, StoreError>;

    async fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>, StoreError>;

    async fn get_embeddings(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f32>>, StoreError>;

    /// Filtered node listing (no scoring)
    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeRecord>, StoreError>;

    /// Count of nodes matching the filter, ignoring paging
    async fn count_nodes(&self, query: &NodeQuery) -> Result<usize, StoreError>;
}

/// Uniform façade over the archive and derived stores
#[derive(Clone, Default)]
pub struct UnifiedStore {
    archive: Option<Arc<dyn SearchBackend>>,
    derived: Option<Arc<dyn SearchBackend>>,
}

impl UnifiedStore {
    pub fn new(
        archive: Option<Arc<dyn SearchBackend>>,
        derived: Option<Arc<dyn SearchBackend>>,
    ) -> Self {
        Self { archive, derived }
    }

    pub fn with_archive(archive: Arc<dyn SearchBackend>) -> Self {
        Self {
            archive: Some(archive),
            derived: None,
        }
    }

    fn backends_for(&self, target: StoreTarget) -> Vec<(Origin, &Arc<dyn SearchBackend>)> {
        let mut selected = Vec::new();
        if matches!(target, StoreTarget::Archive | StoreTarget::All) {
            if let Some(backend) = &self.archive {
                selected.push((Origin::Archive, backend));
            }
        }
        if matches!(target, StoreTarget::Derived | StoreTarget::All) {
            if let Some(backend) = &self.derived {
                selected.push((Origin::Derived, backend));
            }
        }
        selected
    }

    /// Dense search across the selected backends. Hits are tagged with
    /// their origin and concatenated; ranking across origins is the
    /// caller's job.
    pub async fn search_by_embedding(
        &self,
        vector: &[f32],
        limit: usize,
        target: StoreTarget,
    ) -> Result<Vec<ScoredNode>, StoreError> {
        let mut merged = Vec::new();
        for (origin, backend) in self.backends_for(target) {
            let mut hits = backend.search_by_embedding(vector, limit).await?;
            for hit in &mut hits {
                hit.node.origin = origin;
            }
            merged.append(&mut hits);
        }
        Ok(merged)
    }

    /// Sparse search across the selected backends; same merge contract as
    /// `search_by_embedding`.
    pub async fn search_by_keyword(
        &self,
        text: &str,
        limit: usize,
        target: StoreTarget,
    ) -> Result<Vec<ScoredNode>, StoreError> {
        let mut merged = Vec::new();
        for (origin, backend) in self.backends_for(target) {
            let mut hits = backend.search_by_keyword(text, limit).await?;
            for hit in &mut hits {
                hit.node.origin = origin;
            }
            merged.append(&mut hits);
        }
        Ok(merged)
    }

    /// Fetch a node from whichever store holds it (archive probed first)
    pub async fn get_node(&self, id: &str) -> Result<Option<NodeRecord>, StoreError> {
        for (origin, backend) in self.backends_for(StoreTarget::All) {
            if let Some(mut node) = backend.get_node(id).await? {
                node.origin = origin;
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Fetch many nodes; ids not found in either store are skipped
    pub async fn get_nodes(&self, ids: &[String]) -> Result<Vec<NodeRecord>, StoreError> {
        let mut found = Vec::new();
        let mut remaining: Vec<String> = ids.to_vec();

        for (origin, backend) in self.backends_for(StoreTarget::All) {
            if remaining.is_empty() {
                break;
            }
            let mut nodes = backend.get_nodes(&remaining).await?;
            for node in &mut nodes {
                node.origin = origin;
            }
            remaining.retain(|id| !nodes.iter().any(|n| &n.id == id));
            found.append(&mut nodes);
        }

        Ok(found)
    }

    pub async fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>, StoreError> {
        for (_, backend) in self.backends_for(StoreTarget::All) {
            if let Some(embedding) = backend.get_embedding(id).await? {
                return Ok(Some(embedding));
            }
        }
        Ok(None)
    }

    pub async fn get_embeddings(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f32>>, StoreError> {
        let mut merged = HashMap::new();
        for (_, backend) in self.backends_for(StoreTarget::All) {
            let embeddings = backend.get_embeddings(ids).await?;
            for (id, embedding) in embeddings {
                merged.entry(id).or_insert(embedding);
            }
        }
        Ok(merged)
    }

    /// Which store holds the given node id, if any
    pub async fn node_source(&self, id: &str) -> Result<Option<Origin>, StoreError> {
        for (origin, backend) in self.backends_for(StoreTarget::All) {
            if backend.get_node(id).await?.is_some() {
                return Ok(Some(origin));
            }
        }
        Ok(None)
    }

    /// Filtered node listing with paging, split per store
    pub async fn query_nodes(
        &self,
        query: &NodeQuery,
        target: StoreTarget,
    ) -> Result<NodeQueryPage, StoreError> {
        let mut page = NodeQueryPage::default();
        let mut returned = 0usize;

        for (origin, backend) in self.backends_for(target) {
            let mut nodes = backend.query_nodes(query).await?;
            for node in &mut nodes {
                node.origin = origin;
            }
            page.total += backend.count_nodes(query).await?;
            returned += nodes.len();
            match origin {
                Origin::Archive => page.archive_nodes = nodes,
                Origin::Derived => page.derived_nodes = nodes,
            }
        }

        page.has_more = query.offset + returned < page.total;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Behaviour of a store with no configured backends: every operation is
    // a well-defined empty result, never an error.
    #[tokio::test]
    async fn test_unconfigured_store_is_empty() {
        let store = UnifiedStore::default();

        let dense = store
            .search_by_embedding(&[1.0, 0.0], 10, StoreTarget::All)
            .await
            .unwrap();
        assert!(dense.is_empty());

        let sparse = store
            .search_by_keyword("anything", 10, StoreTarget::All)
            .await
            .unwrap();
        assert!(sparse.is_empty());

        assert!(store.get_node("x").await.unwrap().is_none());
        assert!(store.get_embedding("x").await.unwrap().is_none());
        assert!(store.node_source("x").await.unwrap().is_none());

        let page = store
            .query_nodes(&NodeQuery::default(), StoreTarget::All)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
    }
}
