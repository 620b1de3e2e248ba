//! Knowledge base abstraction.
//!
//! A `KnowledgeBase` answers semantic queries with scored documents. Attune
//! runs two of them side by side, one for shared domain material and one
//! for per-user facts, and merges the results at the retriever layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::KnowledgeError;

/// A retrievable piece of content with optional relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    /// Arbitrary key-value metadata, e.g. `user_id` or `source`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Relevance in `[0.0, 1.0]`. `None` when the backend does not score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            score: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

fn default_top_k() -> usize {
    5
}

/// A semantic query against a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Metadata equality filter. A document matches when every pair here
    /// is present in its metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: default_top_k(),
            filter: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A store of retrievable documents.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Return the documents most relevant to the query, best first.
    async fn retrieve(
        &self,
        query: RetrievalQuery,
    ) -> std::result::Result<Vec<Document>, KnowledgeError>;

    /// Index new documents. Returns how many were added.
    async fn add_documents(
        &self,
        documents: Vec<Document>,
    ) -> std::result::Result<usize, KnowledgeError>;

    /// Number of indexed documents.
    async fn count(&self) -> std::result::Result<usize, KnowledgeError>;

    /// Remove all documents.
    async fn clear(&self) -> std::result::Result<(), KnowledgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builder() {
        let doc = Document::new("CBT basics")
            .with_metadata("source", "handbook")
            .with_score(0.9);
        assert_eq!(doc.metadata["source"], "handbook");
        assert_eq!(doc.score, Some(0.9));
    }

    #[test]
    fn query_filter_accumulates() {
        let query = RetrievalQuery::new("sleep")
            .with_filter("user_id", "u1")
            .with_filter("kind", "note");
        let filter = query.filter.unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter["user_id"], "u1");
    }

    #[test]
    fn query_defaults_top_k() {
        let query: RetrievalQuery = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(query.top_k, 5);
    }
}
