//! In-memory knowledge base.
//!
//! Term-overlap relevance over a flat document list. Intended for tests
//! and small deployments; a real vector index implements the same trait.

use async_trait::async_trait;
use tokio::sync::RwLock;

use attune_core::{Document, KnowledgeBase, KnowledgeError, RetrievalQuery};

/// A [`KnowledgeBase`] backed by a `Vec` and term-overlap scoring.
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fraction of query terms present in the content, in `[0, 1]`.
fn relevance(query: &str, content: &str) -> f32 {
    let query = query.to_lowercase();
    let content = content.to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms.iter().filter(|t| content.contains(*t)).count();
    hits as f32 / terms.len() as f32
}

fn matches_filter(
    doc: &Document,
    filter: Option<&serde_json::Map<String, serde_json::Value>>,
) -> bool {
    match filter {
        None => true,
        Some(filter) => filter
            .iter()
            .all(|(key, value)| doc.metadata.get(key) == Some(value)),
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn retrieve(
        &self,
        query: RetrievalQuery,
    ) -> std::result::Result<Vec<Document>, KnowledgeError> {
        let documents = self.documents.read().await;
        let mut scored: Vec<Document> = documents
            .iter()
            .filter(|doc| matches_filter(doc, query.filter.as_ref()))
            .map(|doc| {
                let mut doc = doc.clone();
                doc.score = Some(relevance(&query.text, &doc.content));
                doc
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(query.top_k);
        Ok(scored)
    }

    async fn add_documents(
        &self,
        documents: Vec<Document>,
    ) -> std::result::Result<usize, KnowledgeError> {
        let mut store = self.documents.write().await;
        let added = documents.len();
        store.extend(documents);
        Ok(added)
    }

    async fn count(&self) -> std::result::Result<usize, KnowledgeError> {
        Ok(self.documents.read().await.len())
    }

    async fn clear(&self) -> std::result::Result<(), KnowledgeError> {
        self.documents.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scores_by_term_overlap() {
        let kb = InMemoryKnowledgeBase::new();
        kb.add_documents(vec![
            Document::new("coping with workplace stress"),
            Document::new("gardening for beginners"),
        ])
        .await
        .unwrap();

        let docs = kb
            .retrieve(RetrievalQuery::new("workplace stress"))
            .await
            .unwrap();
        assert_eq!(docs[0].content, "coping with workplace stress");
        assert_eq!(docs[0].score, Some(1.0));
        assert_eq!(docs[1].score, Some(0.0));
    }

    #[tokio::test]
    async fn filter_restricts_by_metadata() {
        let kb = InMemoryKnowledgeBase::new();
        kb.add_documents(vec![
            Document::new("note a").with_metadata("user_id", "u1"),
            Document::new("note b").with_metadata("user_id", "u2"),
        ])
        .await
        .unwrap();

        let docs = kb
            .retrieve(RetrievalQuery::new("note").with_filter("user_id", "u1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "note a");
    }

    #[tokio::test]
    async fn top_k_caps_results() {
        let kb = InMemoryKnowledgeBase::new();
        let docs: Vec<Document> = (0..8).map(|i| Document::new(format!("entry {i}"))).collect();
        kb.add_documents(docs).await.unwrap();

        let found = kb
            .retrieve(RetrievalQuery::new("entry").with_top_k(2))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn clear_empties_the_index() {
        let kb = InMemoryKnowledgeBase::new();
        kb.add_documents(vec![Document::new("a")]).await.unwrap();
        assert_eq!(kb.count().await.unwrap(), 1);
        kb.clear().await.unwrap();
        assert_eq!(kb.count().await.unwrap(), 0);
    }

    #[test]
    fn relevance_is_a_fraction_of_terms() {
        assert_eq!(relevance("sleep anxiety", "anxiety journal"), 0.5);
        assert_eq!(relevance("sleep", "deep sleep hygiene"), 1.0);
        assert_eq!(relevance("", "anything"), 0.0);
    }
}
