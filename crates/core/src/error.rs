//! Error types for the Attune domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Attune operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Knowledge errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Language model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the memory tier: user records, sessions, persistence.
///
/// `UserNotFound` and `UserExists` are control-flow errors callers branch on.
/// `CorruptRecord` means a persisted record exists but cannot be read; the
/// file is left untouched on disk so an operator can inspect it instead of
/// the user's history being silently reset.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Corrupt record for user {user_id}: {reason}")]
    CorruptRecord { user_id: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors from knowledge-base collaborators.
///
/// Handled at the retriever boundary: retrieval degrades to empty results
/// rather than failing the conversational turn.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),
}

/// Errors from language-model collaborators (generation and summarization).
///
/// A single kind: every failure mode, timeouts included, reports as
/// `Generation`. Retry policy belongs to the caller, not here.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Generation failed: {0}")]
    Generation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_record_displays_user_and_reason() {
        let err = Error::Memory(MemoryError::CorruptRecord {
            user_id: "u42".into(),
            reason: "unexpected end of JSON".into(),
        });
        assert!(err.to_string().contains("u42"));
        assert!(err.to_string().contains("unexpected end of JSON"));
    }

    #[test]
    fn user_errors_display_id() {
        let missing = Error::Memory(MemoryError::UserNotFound("alice".into()));
        assert!(missing.to_string().contains("alice"));

        let duplicate = Error::Memory(MemoryError::UserExists("bob".into()));
        assert!(duplicate.to_string().contains("bob"));
    }

    #[test]
    fn model_error_displays_reason() {
        let err = Error::Model(ModelError::Generation("timed out after 15s".into()));
        assert!(err.to_string().contains("timed out after 15s"));
    }
}
