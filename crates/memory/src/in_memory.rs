//! In-memory storage backend.
//!
//! Keeps records in a process-local map. Nothing survives restart, which
//! makes it the backend for tests and ephemeral deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use attune_core::{MemoryError, MemoryStore, UserMemory};

/// A [`MemoryStore`] backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, UserMemory>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn load(&self, user_id: &str) -> Result<Option<UserMemory>, MemoryError> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn save(&self, memory: &UserMemory) -> Result<(), MemoryError> {
        self.records
            .write()
            .await
            .insert(memory.user_id.clone(), memory.clone());
        Ok(())
    }

    async fn exists(&self, user_id: &str) -> Result<bool, MemoryError> {
        Ok(self.records.read().await.contains_key(user_id))
    }

    async fn delete(&self, user_id: &str) -> Result<bool, MemoryError> {
        Ok(self.records.write().await.remove(user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::ProfileFields;

    #[tokio::test]
    async fn save_load_delete_cycle() {
        let store = InMemoryStore::new();
        assert!(store.load("u1").await.unwrap().is_none());

        let memory = UserMemory::new("u1", ProfileFields::default());
        store.save(&memory).await.unwrap();
        assert!(store.exists("u1").await.unwrap());
        assert_eq!(store.load("u1").await.unwrap().unwrap().user_id, "u1");

        assert!(store.delete("u1").await.unwrap());
        assert!(!store.delete("u1").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn save_overwrites_existing_record() {
        let store = InMemoryStore::new();
        let mut memory = UserMemory::new("u1", ProfileFields::default());
        store.save(&memory).await.unwrap();

        memory.profile.age = Some(27);
        store.save(&memory).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.profile.age, Some(27));
    }
}
