use std::sync::Arc;
use tracing::{info, warn};

use super::archive::ArchiveClient;
use super::settings::SettingsService;
use crate::models::FileRecord;
use crate::repositories::{FileRepository, RepositoryError, Store};

/// Marks files approved and hands them to the archive.
///
/// Approval does not look at `status`: a file can be approved in any state.
#[derive(Clone)]
pub struct ApprovalService {
    store: Arc<dyn Store>,
    settings: SettingsService,
    archive: Arc<dyn ArchiveClient>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn Store>, settings: SettingsService, archive: Arc<dyn ArchiveClient>) -> Self {
        Self { store, settings, archive }
    }

    pub async fn approve(&self, owner_id: i64, file_id: i64) -> Result<FileRecord, RepositoryError> {
        let record = self
            .store
            .get_file(file_id)
            .await?
            .filter(|r| r.owner_id == owner_id)
            .ok_or(RepositoryError::NotFound(file_id))?;

        let mut record = if record.is_approved {
            record
        } else {
            let expected = record.version;
            let mut approved = record;
            approved.is_approved = true;
            let saved = self.store.update_file(approved, expected).await?;
            info!("File {} approved by owner {}", saved.id, owner_id);
            saved
        };

        let settings = self.settings.get(owner_id).await?;
        if !settings.enable_archive || record.archive_id.is_some() {
            return Ok(record);
        }

        match self.archive.upload(&record, settings.archive_folder_id.as_deref()).await {
            Ok(archive_id) => {
                let expected = record.version;
                record.archive_id = Some(archive_id);
                self.store.update_file(record, expected).await
            }
            Err(e) => {
                warn!("File {} approved but not archived: {}", record.id, e);
                Ok(record)
            }
        }
    }
}
