use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationErrors};

use crate::models::{Settings, SettingsUpdate};
use crate::repositories::{RepositoryError, SettingsRepository, Store};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Reads and updates per-owner settings, creating defaults on first use.
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn Store>,
    default_webhook_url: String,
}

impl SettingsService {
    pub fn new(store: Arc<dyn Store>, default_webhook_url: impl Into<String>) -> Self {
        Self { store, default_webhook_url: default_webhook_url.into() }
    }

    pub async fn get(&self, owner_id: i64) -> Result<Settings, RepositoryError> {
        if let Some(settings) = self.store.get_settings(owner_id).await? {
            return Ok(settings);
        }

        info!("Creating default settings for owner {}", owner_id);
        self.store.save_settings(Settings::defaults_for(owner_id, &self.default_webhook_url)).await
    }

    pub async fn update(&self, owner_id: i64, update: SettingsUpdate) -> Result<Settings, SettingsError> {
        update.validate()?;

        let mut settings = self.get(owner_id).await?;
        settings.apply(update);
        Ok(self.store.save_settings(settings).await?)
    }
}
