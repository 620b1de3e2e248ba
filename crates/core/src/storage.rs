//! Memory persistence abstraction.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::record::UserMemory;

/// A backend that persists whole `UserMemory` records keyed by user id.
///
/// `load` returns `Ok(None)` for a user that has never been saved. A record
/// that exists but cannot be decoded surfaces as
/// [`MemoryError::CorruptRecord`] so callers can tell absence from damage.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn load(&self, user_id: &str) -> std::result::Result<Option<UserMemory>, MemoryError>;

    async fn save(&self, memory: &UserMemory) -> std::result::Result<(), MemoryError>;

    async fn exists(&self, user_id: &str) -> std::result::Result<bool, MemoryError>;

    /// Remove a user's record. Returns whether anything was deleted.
    async fn delete(&self, user_id: &str) -> std::result::Result<bool, MemoryError>;
}
