use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::file_repository::{FileRepository, RepositoryError};
use super::settings_repository::SettingsRepository;
use crate::models::{FileRecord, NewFile, Settings};

/// Process-local store backed by hash maps. Used when no database URL is
/// configured and in tests.
pub struct MemoryStore {
    files: Arc<RwLock<HashMap<i64, FileRecord>>>,
    settings: Arc<RwLock<HashMap<i64, Settings>>>,
    next_file_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(HashMap::new())),
            next_file_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl FileRepository for MemoryStore {
    async fn create_file(&self, new_file: NewFile) -> Result<FileRecord, RepositoryError> {
        let id = self.next_file_id.fetch_add(1, Ordering::SeqCst);
        let record = FileRecord::from_new(id, new_file, Utc::now());

        let mut map = self.files.write().await;
        map.insert(id, record.clone());
        Ok(record)
    }

    async fn get_file(&self, id: i64) -> Result<Option<FileRecord>, RepositoryError> {
        let map = self.files.read().await;
        Ok(map.get(&id).cloned())
    }

    async fn list_files(&self, owner_id: i64) -> Result<Vec<FileRecord>, RepositoryError> {
        let map = self.files.read().await;
        let mut files: Vec<FileRecord> = map.values().filter(|f| f.owner_id == owner_id).cloned().collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(files)
    }

    async fn update_file(&self, mut record: FileRecord, expected_version: i64) -> Result<FileRecord, RepositoryError> {
        let mut map = self.files.write().await;
        let stored = map.get_mut(&record.id).ok_or(RepositoryError::NotFound(record.id))?;

        if stored.version != expected_version {
            return Err(RepositoryError::Conflict {
                id: record.id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        record.version = expected_version + 1;
        record.created_at = stored.created_at;
        record.updated_at = Utc::now();
        *stored = record.clone();
        Ok(record)
    }

    async fn delete_file(&self, id: i64) -> Result<(), RepositoryError> {
        let mut map = self.files.write().await;
        map.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound(id))
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn get_settings(&self, owner_id: i64) -> Result<Option<Settings>, RepositoryError> {
        let map = self.settings.read().await;
        Ok(map.get(&owner_id).cloned())
    }

    async fn save_settings(&self, settings: Settings) -> Result<Settings, RepositoryError> {
        let mut map = self.settings.write().await;
        map.insert(settings.owner_id, settings.clone());
        Ok(settings)
    }
}
