pub mod http_lookup;
pub mod llm_extractor;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ContentType, ProductData};

pub use http_lookup::HttpProductLookup;
pub use llm_extractor::{LlmDeepExtractor, parse_extraction_reply};

/// Input for a deep extraction call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepExtractionRequest {
    pub title: String,
    /// One `[index] text` line per paragraph, indices matching block ordinals
    pub numbered_paragraphs: String,
    /// Names the pattern stages already found, so the extractor can focus on the rest
    pub pre_detected_summary: String,
}

/// One product mention reported by a deep extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMention {
    pub name: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    /// Suggested marketplace query; candidates get theirs rebuilt during merge
    pub search_query: Option<String>,
    /// Paragraph ordinal as reported; may be missing or out of range
    pub paragraph: Option<usize>,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepExtractionResult {
    pub candidates: Vec<ExtractedMention>,
    pub content_type: ContentType,
    pub comparison_detected: bool,
}

/// Semantic product extraction backed by an external service
#[async_trait]
pub trait DeepExtractor: Send + Sync {
    async fn extract(&self, request: &DeepExtractionRequest) -> Result<DeepExtractionResult>;
}

/// Failure modes of a marketplace lookup.
///
/// Only `Auth` is fatal for a run; everything else skips one candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Marketplace authentication failed: {0}")]
    Auth(String),

    #[error("Product not found")]
    NotFound,

    #[error("Marketplace request timed out")]
    Timeout,

    #[error("Marketplace error: {0}")]
    Upstream(String),
}

impl LookupError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LookupError::Auth(_))
    }
}

/// Authoritative product records keyed by marketplace identifier or free text
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn lookup_by_identifier(&self, identifier: &str) -> Result<Option<ProductData>, LookupError>;

    async fn search(&self, query: &str) -> Result<Option<ProductData>, LookupError>;
}
