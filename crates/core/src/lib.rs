//! Domain types and trait contracts for the Attune conversational memory
//! runtime.
//!
//! Every external collaborator (language model, knowledge base, record store)
//! is a trait defined here and implemented in the crates above. The types in
//! [`record`] are the persisted shape of a user's memory and serialize as
//! snake_case JSON.

pub mod error;
pub mod message;
pub mod llm;
pub mod knowledge;
pub mod record;
pub mod storage;

pub use error::{Error, KnowledgeError, MemoryError, ModelError, Result};
pub use message::{ChatMessage, Role};
pub use llm::{ChatRequest, ChatResponse, LanguageModel, TokenCounter, Usage};
pub use knowledge::{Document, KnowledgeBase, RetrievalQuery};
pub use record::{
    EmotionMap, EmotionRecord, EmotionSnapshot, InterventionRecord, LifeEvent, LongTermTrends,
    ProfileFields, SessionMemory, TopicRecord, Turn, UserMemory, UserProfile,
};
pub use storage::MemoryStore;
