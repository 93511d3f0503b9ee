//! Typed request/response structs for the engine boundary.
//!
//! Validation happens here, in the constructors, so the core never sees
//! a malformed id or a zero `top_k`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::Segment;
use crate::error::{QuarryError, Result};

/// Default number of hits retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Default output-token bound handed to the generation provider.
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 200;

/// Validate a collection id.
///
/// Ids name storage directories, so they are restricted to
/// `[A-Za-z0-9._-]` and may not be `.` or `..`.
pub fn validate_collection_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(QuarryError::invalid_argument(
            "collection id must not be empty",
        ));
    }
    if id == "." || id == ".." {
        return Err(QuarryError::invalid_argument(format!(
            "invalid collection id: {id}"
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(QuarryError::invalid_argument(format!(
            "invalid character {bad:?} in collection id: {id}"
        )));
    }
    Ok(())
}

/// Source material for one ingest call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSource {
    /// Plain text; chunks get synthetic spans.
    Text(String),
    /// Time-stamped segments; chunks get best-effort real spans.
    Segments(Vec<Segment>),
}

/// Request to build (or rebuild) a collection from source material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub collection_id: String,
    pub source: IngestSource,
}

impl IngestRequest {
    pub fn new<S: Into<String>>(collection_id: S, source: IngestSource) -> Result<Self> {
        let collection_id = collection_id.into();
        validate_collection_id(&collection_id)?;
        Ok(IngestRequest {
            collection_id,
            source,
        })
    }
}

/// What a successful ingest produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub collection_id: String,
    pub chunk_count: usize,
    pub dimension: usize,
    pub path: String,
}

/// One retrieval result, joined with its chunk metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk_text: String,
    pub start: f64,
    pub end: f64,
    pub distance: f32,
}

/// Request for raw nearest-neighbor retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Explicit collection id; `None` resolves to the latest collection.
    pub collection_id: Option<String>,
    pub query: String,
    pub top_k: usize,
}

impl SearchRequest {
    pub fn new<S: Into<String>>(query: S, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(QuarryError::invalid_argument(
                "top_k must be greater than zero",
            ));
        }
        Ok(SearchRequest {
            collection_id: None,
            query: query.into(),
            top_k,
        })
    }

    pub fn with_collection<S: Into<String>>(mut self, collection_id: S) -> Result<Self> {
        let collection_id = collection_id.into();
        validate_collection_id(&collection_id)?;
        self.collection_id = Some(collection_id);
        Ok(self)
    }
}

/// Ranked hits for one search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The collection actually searched (resolved when the request left
    /// it implicit).
    pub collection_id: String,
    pub hits: Vec<RetrievalHit>,
}

/// Request for a generated answer grounded in retrieved context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub collection_id: Option<String>,
    pub question: String,
    pub top_k: usize,
    pub max_output_tokens: usize,
}

impl AnswerRequest {
    pub fn new<S: Into<String>>(question: S) -> Self {
        AnswerRequest {
            collection_id: None,
            question: question.into(),
            top_k: DEFAULT_TOP_K,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_collection<S: Into<String>>(mut self, collection_id: S) -> Result<Self> {
        let collection_id = collection_id.into();
        validate_collection_id(&collection_id)?;
        self.collection_id = Some(collection_id);
        Ok(self)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(QuarryError::invalid_argument(
                "top_k must be greater than zero",
            ));
        }
        self.top_k = top_k;
        Ok(self)
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// A citation for one retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub start: f64,
    pub end: f64,
    /// Chunk text truncated to a short preview.
    pub preview: String,
}

/// The answer pipeline's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub collection_id: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// One collection as seen by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collection_id: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub built_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_id_charset() {
        assert!(validate_collection_id("video_2024-01.v2").is_ok());
        assert!(validate_collection_id("").is_err());
        assert!(validate_collection_id("a/b").is_err());
        assert!(validate_collection_id("a b").is_err());
        assert!(validate_collection_id("..").is_err());
        assert!(validate_collection_id(".").is_err());
    }

    #[test]
    fn test_search_request_rejects_zero_top_k() {
        assert!(SearchRequest::new("query", 0).is_err());
        assert!(SearchRequest::new("query", 3).is_ok());
    }

    #[test]
    fn test_answer_request_defaults() {
        let request = AnswerRequest::new("what happened?");
        assert_eq!(request.top_k, DEFAULT_TOP_K);
        assert_eq!(request.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
        assert!(request.collection_id.is_none());
    }

    #[test]
    fn test_request_rejects_bad_collection_id() {
        assert!(
            SearchRequest::new("query", 1)
                .unwrap()
                .with_collection("../escape")
                .is_err()
        );
    }
}
