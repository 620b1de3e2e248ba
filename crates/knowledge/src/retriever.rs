//! Dual-source knowledge retrieval.
//!
//! Queries the shared domain knowledge base and the per-user knowledge
//! base side by side, filters by relevance score, and renders a combined
//! text block for prompt assembly. Sources degrade independently: one
//! that errors or times out contributes nothing instead of failing the
//! turn.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use attune_config::RetrievalConfig;
use attune_core::{Document, KnowledgeBase, Result, RetrievalQuery};

/// Combined results from both knowledge sources.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedKnowledge {
    pub domain_docs: Vec<Document>,
    pub user_docs: Vec<Document>,
    /// Prompt-ready rendering of both result sets. Empty when nothing
    /// relevant was found.
    pub combined_text: String,
}

impl RetrievedKnowledge {
    pub fn is_empty(&self) -> bool {
        self.domain_docs.is_empty() && self.user_docs.is_empty()
    }
}

/// Document counts per source.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KnowledgeStats {
    pub domain_documents: usize,
    pub user_documents: usize,
}

/// Retrieves from a domain and a user knowledge base in parallel.
pub struct KnowledgeRetriever {
    domain: Arc<dyn KnowledgeBase>,
    user: Arc<dyn KnowledgeBase>,
    config: RetrievalConfig,
}

impl KnowledgeRetriever {
    pub fn new(domain: Arc<dyn KnowledgeBase>, user: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            domain,
            user,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Retrieve relevant knowledge for a query.
    ///
    /// The user source is only consulted when a `user_id` is given, and
    /// its query is restricted to that user's documents. Never fails; a
    /// source that errors or times out yields an empty result set.
    pub async fn retrieve(&self, query: &str, user_id: Option<&str>) -> RetrievedKnowledge {
        let domain_query = RetrievalQuery::new(query).with_top_k(self.config.top_k);
        let user_query = user_id.map(|uid| {
            RetrievalQuery::new(query)
                .with_top_k(self.config.top_k)
                .with_filter("user_id", uid)
        });

        let (domain_docs, user_docs) = tokio::join!(
            self.query_source(self.domain.as_ref(), domain_query),
            async {
                match user_query {
                    Some(query) => self.query_source(self.user.as_ref(), query).await,
                    None => Vec::new(),
                }
            }
        );

        let combined_text = render_combined(&domain_docs, &user_docs);
        debug!(
            domain = domain_docs.len(),
            user = user_docs.len(),
            "retrieved knowledge"
        );
        RetrievedKnowledge {
            domain_docs,
            user_docs,
            combined_text,
        }
    }

    /// One source's results: timeout-bounded, score-filtered, best first.
    async fn query_source(
        &self,
        source: &dyn KnowledgeBase,
        query: RetrievalQuery,
    ) -> Vec<Document> {
        let top_k = query.top_k;
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut docs = match tokio::time::timeout(timeout, source.retrieve(query)).await {
            Ok(Ok(docs)) => docs,
            Ok(Err(e)) => {
                warn!(source = source.name(), error = %e, "knowledge retrieval failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    source = source.name(),
                    timeout_secs = self.config.timeout_secs,
                    "knowledge retrieval timed out"
                );
                return Vec::new();
            }
        };

        // Unscored documents always pass the threshold.
        docs.retain(|d| d.score.is_none_or(|s| s >= self.config.score_threshold));
        docs.sort_by(|a, b| {
            score_of(b)
                .partial_cmp(&score_of(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        docs.truncate(top_k);
        docs
    }

    /// Index documents into the domain knowledge base.
    pub async fn add_domain_knowledge(&self, documents: Vec<Document>) -> Result<usize> {
        Ok(self.domain.add_documents(documents).await?)
    }

    /// Index one piece of user knowledge, stamped with the owning user's
    /// id so retrieval can filter by user. Caller metadata is kept; the
    /// `user_id` key is overwritten with the stamp.
    pub async fn add_user_knowledge(
        &self,
        user_id: &str,
        content: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<()> {
        let mut document = Document::new(content);
        document.metadata = metadata.unwrap_or_default();
        document
            .metadata
            .insert("user_id".to_string(), user_id.into());
        self.user.add_documents(vec![document]).await?;
        Ok(())
    }

    /// Document counts for both sources.
    pub async fn stats(&self) -> Result<KnowledgeStats> {
        let (domain_documents, user_documents) =
            tokio::join!(self.domain.count(), self.user.count());
        Ok(KnowledgeStats {
            domain_documents: domain_documents?,
            user_documents: user_documents?,
        })
    }
}

fn score_of(doc: &Document) -> f32 {
    doc.score.unwrap_or(0.0)
}

/// Render both result sets as labeled, numbered sections.
fn render_combined(domain: &[Document], user: &[Document]) -> String {
    let mut sections = Vec::new();
    if !domain.is_empty() {
        sections.push(render_section("[Domain Knowledge]", domain));
    }
    if !user.is_empty() {
        sections.push(render_section("[User-Specific Information]", user));
    }
    sections.join("\n\n")
}

fn render_section(header: &str, docs: &[Document]) -> String {
    let mut out = String::from(header);
    for (i, doc) in docs.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, doc.content));
    }
    out
}
