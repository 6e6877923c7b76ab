//! LLM-backed enrichment boundary
//!
//! Enrichment (titles, summaries, ratings) is generated by an external
//! collaborator and attached to results lazily - only when a caller asks,
//! never on the default search path.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Enrichment;

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Provider call failed: {0}")]
    Provider(String),

    #[error("Provider returned malformed output: {0}")]
    Malformed(String),
}

/// External enrichment provider
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn generate_title(&self, text: &str) -> Result<String, EnrichmentError>;

    async fn generate_summary(&self, text: &str) -> Result<String, EnrichmentError>;

    async fn generate_rating(&self, text: &str) -> Result<f32, EnrichmentError>;

    async fn suggest_categories(&self, text: &str) -> Result<Vec<String>, EnrichmentError>;

    async fn extract_key_terms(&self, text: &str) -> Result<Vec<String>, EnrichmentError>;

    /// Convenience: run the full enrichment suite over one text
    async fn enrich(&self, text: &str) -> Result<Enrichment, EnrichmentError> {
        Ok(Enrichment {
            title: Some(self.generate_title(text).await?),
            summary: Some(self.generate_summary(text).await?),
            rating: Some(self.generate_rating(text).await?),
            categories: self.suggest_categories(text).await?,
            key_terms: self.extract_key_terms(text).await?,
        })
    }
}
