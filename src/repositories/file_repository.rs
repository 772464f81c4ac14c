use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FileRecord, NewFile};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("File {0} not found")]
    NotFound(i64),
    #[error("File {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { id: i64, expected: i64, actual: i64 },
    #[error("Database error: {0}")]
    Database(String),
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

/// Storage of file records. Every update is a compare-and-set on
/// `FileRecord::version`.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn create_file(&self, new_file: NewFile) -> Result<FileRecord, RepositoryError>;

    async fn get_file(&self, id: i64) -> Result<Option<FileRecord>, RepositoryError>;

    async fn list_files(&self, owner_id: i64) -> Result<Vec<FileRecord>, RepositoryError>;

    /// Persists `record` if the stored version still equals
    /// `expected_version`. The returned record carries the new version and
    /// `updated_at`.
    async fn update_file(&self, record: FileRecord, expected_version: i64) -> Result<FileRecord, RepositoryError>;

    async fn delete_file(&self, id: i64) -> Result<(), RepositoryError>;

    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
