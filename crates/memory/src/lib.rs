//! # Attune Memory
//!
//! Tiered user memory: raw session transcripts, a distilled profile, and
//! long-term emotion and topic trends, behind pluggable persistence.
//!
//! [`MemoryManager`] is the entry point. It serializes all writes per user,
//! summarizes sessions when they end, and distills a [`MemoryContext`] for
//! prompt assembly.

pub mod in_memory;
pub mod json_store;
pub mod manager;
pub mod topics;

pub use in_memory::InMemoryStore;
pub use json_store::JsonFileStore;
pub use manager::{EmotionTrend, MemoryContext, MemoryManager, ScoredSession};
pub use topics::{KeywordTopicExtractor, TopicExtractor};
