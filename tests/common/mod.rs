//! Shared fixtures for the integration suites: a deterministic embedder and
//! a small two-store corpus with a real hierarchy.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use strata::config::StrataConfig;
use strata::embedding::{EmbeddingError, EmbeddingProvider};
use strata::model::{Level, Origin};
use strata::service::SearchService;
use strata::session::SessionManager;
use strata::store::{MemoryBackend, NodeRecord, UnifiedStore};

pub const EMBED_DIM: usize = 16;

/// Deterministic bag-of-tokens embedder: each token lands in a byte-sum
/// bucket, so texts sharing words get similar vectors. Identical text embeds
/// to the identical vector every call.
pub struct StubEmbedder;

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = token
            .to_lowercase()
            .bytes()
            .map(|b| b as usize)
            .sum::<usize>()
            % EMBED_DIM;
        vector[bucket] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }
}

/// Embedder that always fails, for degraded-dependency tests
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("model offline".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::GenerationError("model offline".to_string()))
    }

    fn dimension(&self) -> usize {
        EMBED_DIM
    }
}

pub struct NodeSpec {
    pub id: &'static str,
    pub text: &'static str,
    pub level: Level,
    pub parent: Option<&'static str>,
    pub thread: Option<&'static str>,
    pub role: Option<&'static str>,
    pub quality: f32,
    pub minute: u32,
    pub embedded: bool,
}

impl NodeSpec {
    fn build(&self, origin: Origin) -> NodeRecord {
        NodeRecord {
            id: self.id.to_string(),
            origin,
            text: self.text.to_string(),
            word_count: self.text.split_whitespace().count(),
            level: self.level,
            parent_id: self.parent.map(|p| p.to_string()),
            thread_root_id: self.thread.map(|t| t.to_string()),
            thread_title: self.thread.map(|_| "Memory management".to_string()),
            source_platform: Some("chatgpt".to_string()),
            external_id: None,
            author: None,
            author_role: self.role.map(|r| r.to_string()),
            source_created_at: Some(
                Utc.with_ymd_and_hms(2024, 3, 1, 12, self.minute, 0).unwrap(),
            ),
            uri: Some(format!("strata://{}", self.id)),
            book_context: match origin {
                Origin::Derived => Some("ch1/ownership".to_string()),
                Origin::Archive => None,
            },
            quality_score: self.quality,
            is_complete: true,
        }
    }
}

pub const ARCHIVE_NODES: &[NodeSpec] = &[
    NodeSpec {
        id: "apex-1",
        text: "overview of rust memory management ownership and borrowing",
        level: Level::Apex,
        parent: None,
        thread: None,
        role: None,
        quality: 0.9,
        minute: 0,
        embedded: true,
    },
    NodeSpec {
        id: "sum-1",
        text: "summary of rust borrow checker discussions",
        level: Level::Summary,
        parent: Some("apex-1"),
        thread: None,
        role: None,
        quality: 0.8,
        minute: 1,
        embedded: true,
    },
    NodeSpec {
        id: "chunk-1",
        text: "the rust borrow checker enforces ownership rules at compile time",
        level: Level::Base,
        parent: Some("sum-1"),
        thread: Some("thread-1"),
        role: Some("user"),
        quality: 0.7,
        minute: 2,
        embedded: true,
    },
    NodeSpec {
        id: "chunk-2",
        text: "lifetimes in rust extend the borrow checker across function boundaries",
        level: Level::Base,
        parent: Some("sum-1"),
        thread: Some("thread-1"),
        role: Some("assistant"),
        quality: 0.6,
        minute: 3,
        embedded: true,
    },
    NodeSpec {
        id: "chunk-3",
        text: "garbage collection in java uses generational heaps instead",
        level: Level::Base,
        parent: Some("sum-1"),
        thread: Some("thread-1"),
        role: Some("assistant"),
        quality: 0.6,
        minute: 4,
        embedded: true,
    },
    NodeSpec {
        id: "chunk-low",
        text: "ok thanks",
        level: Level::Base,
        parent: Some("sum-1"),
        thread: Some("thread-1"),
        role: Some("user"),
        quality: 0.1,
        minute: 5,
        embedded: true,
    },
    NodeSpec {
        id: "no-embed",
        text: "this node was ingested before the embedding pipeline ran",
        level: Level::Base,
        parent: Some("sum-1"),
        thread: Some("thread-1"),
        role: Some("user"),
        quality: 0.5,
        minute: 6,
        embedded: false,
    },
];

pub const DERIVED_NODES: &[NodeSpec] = &[NodeSpec {
    id: "book-1",
    text: "rust ownership model explained with worked borrow examples",
    level: Level::Summary,
    parent: None,
    thread: None,
    role: None,
    quality: 0.9,
    minute: 10,
    embedded: true,
}];

pub async fn seeded_store() -> Arc<UnifiedStore> {
    let archive = MemoryBackend::new();
    for spec in ARCHIVE_NODES {
        let embedding = spec.embedded.then(|| embed_text(spec.text));
        archive.insert(spec.build(Origin::Archive), embedding).await;
    }

    let derived = MemoryBackend::new();
    for spec in DERIVED_NODES {
        let embedding = spec.embedded.then(|| embed_text(spec.text));
        derived.insert(spec.build(Origin::Derived), embedding).await;
    }

    Arc::new(UnifiedStore::new(
        Some(Arc::new(archive)),
        Some(Arc::new(derived)),
    ))
}

pub async fn service() -> SearchService {
    service_with_embedder(Arc::new(StubEmbedder)).await
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub async fn service_with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> SearchService {
    init_tracing();
    let store = seeded_store().await;
    let sessions = Arc::new(SessionManager::with_defaults());
    SearchService::new(store, sessions, embedder, StrataConfig::default())
}
