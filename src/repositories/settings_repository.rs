use async_trait::async_trait;

use super::file_repository::RepositoryError;
use crate::models::Settings;

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_settings(&self, owner_id: i64) -> Result<Option<Settings>, RepositoryError>;

    /// Inserts or replaces the settings row for `settings.owner_id`.
    async fn save_settings(&self, settings: Settings) -> Result<Settings, RepositoryError>;
}
