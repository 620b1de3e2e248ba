//! # Attune Knowledge
//!
//! Dual-source knowledge retrieval: a shared domain knowledge base and a
//! per-user one, queried in parallel and merged into a prompt-ready text
//! block. Failing or slow sources degrade to empty results instead of
//! failing the conversational turn.

pub mod in_memory;
pub mod retriever;

pub use in_memory::InMemoryKnowledgeBase;
pub use retriever::{KnowledgeRetriever, KnowledgeStats, RetrievedKnowledge};
