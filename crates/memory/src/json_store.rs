//! JSON file storage backend.
//!
//! One pretty-printed JSON file per user, `<user_id>.json`, under a
//! configurable directory. Saves go through a temp file and rename, so a
//! crash mid-save leaves the previous record intact. A file that no longer
//! parses surfaces as [`MemoryError::CorruptRecord`] and is left untouched
//! on disk for inspection.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

use attune_config::MemoryConfig;
use attune_core::{MemoryError, MemoryStore, UserMemory};

/// File-backed [`MemoryStore`].
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the configured storage directory.
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(&config.storage_dir)
    }

    /// Map a user id to its file, rejecting ids that could escape the
    /// storage directory.
    fn user_path(&self, user_id: &str) -> Result<PathBuf, MemoryError> {
        if user_id.is_empty() || user_id == "." || user_id == ".." || user_id.contains(['/', '\\'])
        {
            return Err(MemoryError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    /// All user ids with a record on disk, sorted.
    pub fn list_users(&self) -> Result<Vec<String>, MemoryError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::Storage(e.to_string())),
        };

        let mut users = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MemoryError::Storage(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(user_id) = name.strip_suffix(".json") {
                users.push(user_id.to_string());
            }
        }
        users.sort();
        Ok(users)
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn load(&self, user_id: &str) -> Result<Option<UserMemory>, MemoryError> {
        let path = self.user_path(user_id)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MemoryError::Storage(e.to_string())),
        };
        match serde_json::from_str(&raw) {
            Ok(memory) => Ok(Some(memory)),
            Err(e) => {
                warn!(user_id, path = %path.display(), error = %e, "memory file is corrupt");
                Err(MemoryError::CorruptRecord {
                    user_id: user_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn save(&self, memory: &UserMemory) -> Result<(), MemoryError> {
        let path = self.user_path(&memory.user_id)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| MemoryError::Storage(e.to_string()))?;
        let json = serde_json::to_string_pretty(memory)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;

        // Temp file plus rename so a crash mid-save never truncates the record.
        let tmp = self.dir.join(format!(".{}.json.tmp", memory.user_id));
        let mut file =
            std::fs::File::create(&tmp).map_err(|e| MemoryError::Storage(e.to_string()))?;
        file.write_all(json.as_bytes())
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        file.sync_all()
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| MemoryError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, user_id: &str) -> Result<bool, MemoryError> {
        Ok(self.user_path(user_id)?.exists())
    }

    async fn delete(&self, user_id: &str) -> Result<bool, MemoryError> {
        let path = self.user_path(user_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MemoryError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attune_core::ProfileFields;

    fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn round_trips_a_record() {
        let (_dir, store) = store();
        let memory = UserMemory::new("alice", ProfileFields::default());
        store.save(&memory).await.unwrap();

        let loaded = store.load("alice").await.unwrap().unwrap();
        assert_eq!(loaded, memory);
    }

    #[tokio::test]
    async fn missing_user_loads_as_none() {
        let (_dir, store) = store();
        assert!(store.load("nobody").await.unwrap().is_none());
        assert!(!store.exists("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_and_stays_on_disk() {
        let (dir, store) = store();
        let path = dir.path().join("bob.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = store.load("bob").await.unwrap_err();
        assert!(matches!(err, MemoryError::CorruptRecord { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn save_replaces_previous_record() {
        let (_dir, store) = store();
        let mut memory = UserMemory::new("alice", ProfileFields::default());
        store.save(&memory).await.unwrap();

        memory.profile.age = Some(40);
        store.save(&memory).await.unwrap();

        let loaded = store.load("alice").await.unwrap().unwrap();
        assert_eq!(loaded.profile.age, Some(40));
    }

    #[tokio::test]
    async fn delete_reports_what_it_removed() {
        let (_dir, store) = store();
        assert!(!store.delete("alice").await.unwrap());

        store
            .save(&UserMemory::new("alice", ProfileFields::default()))
            .await
            .unwrap();
        assert!(store.delete("alice").await.unwrap());
        assert!(store.load("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_path_like_user_ids() {
        let (_dir, store) = store();
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.load(bad).await.unwrap_err(),
                MemoryError::InvalidUserId(_)
            ));
        }
    }

    #[tokio::test]
    async fn lists_users_sorted() {
        let (_dir, store) = store();
        for id in ["carol", "alice", "bob"] {
            store
                .save(&UserMemory::new(id, ProfileFields::default()))
                .await
                .unwrap();
        }
        assert_eq!(store.list_users().unwrap(), vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn lists_nothing_before_first_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("never-created"));
        assert!(store.list_users().unwrap().is_empty());
    }

    #[tokio::test]
    async fn from_config_uses_the_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemoryConfig {
            storage_dir: dir.path().join("records"),
            ..MemoryConfig::default()
        };
        let store = JsonFileStore::from_config(&config);

        store
            .save(&UserMemory::new("alice", ProfileFields::default()))
            .await
            .unwrap();
        assert!(dir.path().join("records").join("alice.json").exists());
    }
}
