//! In-memory reference backend
//!
//! Brute-force cosine scan for dense search and token-overlap scoring for
//! keyword search. Small archives and test fixtures use this directly; real
//! deployments plug in external index backends behind the same trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::similarity::cosine_similarity;
use crate::store::{NodeQuery, NodeRecord, ScoredNode, SearchBackend, StoreError};

#[derive(Default)]
pub struct MemoryBackend {
    nodes: RwLock<HashMap<String, NodeRecord>>,
    embeddings: RwLock<HashMap<String, Vec<f32>>>,
    /// Insertion order, for stable listing
    order: RwLock<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node, optionally with its embedding
    pub async fn insert(&self, node: NodeRecord, embedding: Option<Vec<f32>>) {
        let id = node.id.clone();

        let mut nodes = self.nodes.write().await;
        if nodes.insert(id.clone(), node).is_none() {
            self.order.write().await.push(id.clone());
        }
        drop(nodes);

        if let Some(embedding) = embedding {
            self.embeddings.write().await.insert(id, embedding);
        }
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    fn matches(node: &NodeRecord, query: &NodeQuery) -> bool {
        if let Some(parent_id) = &query.parent_id {
            if node.parent_id.as_deref() != Some(parent_id.as_str()) {
                return false;
            }
        }
        if let Some(thread_root_id) = &query.thread_root_id {
            if node.thread_root_id.as_deref() != Some(thread_root_id.as_str()) {
                return false;
            }
        }
        query.level.matches(node.level)
    }

    fn tokenize(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(|token| token.to_lowercase())
            .collect()
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn search_by_embedding(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredNode>, StoreError> {
        let embeddings = self.embeddings.read().await;
        let nodes = self.nodes.read().await;

        let mut scored: Vec<ScoredNode> = embeddings
            .iter()
            .filter_map(|(id, embedding)| {
                nodes.get(id).map(|node| ScoredNode {
                    node: node.clone(),
                    score: cosine_similarity(vector, embedding),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn search_by_keyword(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredNode>, StoreError> {
        let query_tokens = Self::tokenize(text);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let nodes = self.nodes.read().await;
        let mut scored: Vec<ScoredNode> = nodes
            .values()
            .filter_map(|node| {
                let node_tokens = Self::tokenize(&node.text);
                let overlap = query_tokens.intersection(&node_tokens).count();
                if overlap == 0 {
                    return None;
                }
                Some(ScoredNode {
                    node: node.clone(),
                    score: overlap as f32 / query_tokens.len() as f32,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get_node(&self, id: &str) -> Result<Option<NodeRecord>, StoreError> {
        Ok(self.nodes.read().await.get(id).cloned())
    }

    async fn get_nodes(&self, ids: &[String]) -> Result<Vec<NodeRecord>, StoreError> {
        let nodes = self.nodes.read().await;
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    async fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>, StoreError> {
        Ok(self.embeddings.read().await.get(id).cloned())
    }

    async fn get_embeddings(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f32>>, StoreError> {
        let embeddings = self.embeddings.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| embeddings.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    async fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeRecord>, StoreError> {
        let nodes = self.nodes.read().await;
        let order = self.order.read().await;

        let matching = order
            .iter()
            .filter_map(|id| nodes.get(id))
            .filter(|node| Self::matches(node, query))
            .skip(query.offset);

        let selected: Vec<NodeRecord> = if query.limit == 0 {
            matching.cloned().collect()
        } else {
            matching.take(query.limit).cloned().collect()
        };

        Ok(selected)
    }

    async fn count_nodes(&self, query: &NodeQuery) -> Result<usize, StoreError> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .values()
            .filter(|node| Self::matches(node, query))
            .count())
    }
}
