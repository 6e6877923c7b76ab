//! Hierarchy navigation: parent, children, thread, apex
//!
//! Navigation results carry full provenance but no retrieval score; their
//! breakdown is all-default with a final score of zero.

use std::collections::HashSet;

use crate::error::{Result, StrataError};
use crate::model::{ScoreBreakdown, SearchResult};
use crate::store::{NodeQuery, NodeRecord, StoreTarget};

use super::SearchService;

fn unscored(node: NodeRecord) -> SearchResult {
    SearchResult::from_node(node, ScoreBreakdown::default())
}

/// Sort nodes by source creation time ascending; undated nodes sort last
fn by_source_time(nodes: &mut [NodeRecord]) {
    nodes.sort_by(|a, b| match (&a.source_created_at, &b.source_created_at) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

impl SearchService {
    async fn require_node(&self, id: &str) -> Result<NodeRecord> {
        self.store
            .get_node(id)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?
            .ok_or_else(|| StrataError::InvalidArgument(format!("Unknown node id: {id}")))
    }

    /// The node one level up from a result, when one exists.
    ///
    /// A node with no parent, or whose parent link points at a node that no
    /// longer resolves, yields `None`; a dangling link is a data gap, not an
    /// error.
    pub async fn parent_context(&self, result_id: &str) -> Result<Option<SearchResult>> {
        let node = self.require_node(result_id).await?;

        let parent_id = match node.parent_id {
            Some(parent_id) => parent_id,
            None => return Ok(None),
        };

        let parent = self
            .store
            .get_node(&parent_id)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        Ok(parent.map(unscored))
    }

    /// All nodes one level below a result, in source order
    pub async fn children(&self, result_id: &str) -> Result<Vec<SearchResult>> {
        self.require_node(result_id).await?;

        let query = NodeQuery {
            parent_id: Some(result_id.to_string()),
            ..Default::default()
        };
        let page = self
            .store
            .query_nodes(&query, StoreTarget::All)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        let mut nodes = page.archive_nodes;
        nodes.extend(page.derived_nodes);
        by_source_time(&mut nodes);

        Ok(nodes.into_iter().map(unscored).collect())
    }

    /// The full thread a result belongs to, oldest first.
    ///
    /// A node with no thread root is its own thread of one.
    pub async fn thread(&self, result_id: &str) -> Result<Vec<SearchResult>> {
        let node = self.require_node(result_id).await?;

        let root_id = match node.thread_root_id.clone() {
            Some(root_id) => root_id,
            None => return Ok(vec![unscored(node)]),
        };

        let query = NodeQuery {
            thread_root_id: Some(root_id),
            ..Default::default()
        };
        let page = self
            .store
            .query_nodes(&query, StoreTarget::All)
            .await
            .map_err(|e| StrataError::Store(e.to_string()))?;

        let mut nodes = page.archive_nodes;
        nodes.extend(page.derived_nodes);
        if !nodes.iter().any(|n| n.id == node.id) {
            nodes.push(node);
        }
        by_source_time(&mut nodes);

        Ok(nodes.into_iter().map(unscored).collect())
    }

    /// Walk parent links to the top of the hierarchy.
    ///
    /// The walk stops at a node with no parent, a dangling parent link, or a
    /// cycle; in every case the highest node reached is returned.
    pub async fn apex(&self, result_id: &str) -> Result<SearchResult> {
        let mut current = self.require_node(result_id).await?;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(current.id.clone());

        while let Some(parent_id) = current.parent_id.clone() {
            if !visited.insert(parent_id.clone()) {
                tracing::warn!(node_id = %parent_id, "Cycle in parent chain");
                break;
            }
            match self
                .store
                .get_node(&parent_id)
                .await
                .map_err(|e| StrataError::Store(e.to_string()))?
            {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(unscored(current))
    }
}
