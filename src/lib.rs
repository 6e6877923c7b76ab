//! Strata - Hybrid Retrieval & Iterative Refinement Engine
//!
//! Answers natural-language queries over a multi-resolution content archive
//! (base chunks, level-1 summaries, apex synthesis) by fusing dense and
//! sparse retrieval with Reciprocal Rank Fusion, then letting callers narrow
//! results interactively with semantic anchors, quality gates, and
//! hierarchy navigation - all without re-running the search from scratch.

pub mod anchor;
pub mod config;
pub mod embedding;
pub mod enrichment;
pub mod error;
pub mod fusion;
pub mod model;
pub mod quality;
pub mod service;
pub mod session;
pub mod similarity;
pub mod store;

pub use error::{Result, StrataError};
