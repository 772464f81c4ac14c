use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::models::FileRecord;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive upload failed: {0}")]
    UploadFailed(String),
}

/// Cloud destination for approved documents.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Stores the approved file and returns the archive's id for it.
    async fn upload(&self, record: &FileRecord, folder_id: Option<&str>) -> Result<String, ArchiveError>;
}

/// Stand-in for the drive integration: nothing leaves the process.
#[derive(Debug, Default, Clone)]
pub struct MockArchive;

#[async_trait]
impl ArchiveClient for MockArchive {
    async fn upload(&self, record: &FileRecord, folder_id: Option<&str>) -> Result<String, ArchiveError> {
        let archive_id = format!("drive_{}", Utc::now().timestamp_millis());
        info!(
            "Archived file {} ({}) as {} in folder {}",
            record.id,
            record.original_name,
            archive_id,
            folder_id.unwrap_or("root")
        );
        Ok(archive_id)
    }
}
