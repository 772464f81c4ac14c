use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PROCESSING_TIMEOUT_MINUTES: u32 = 5;
pub const DEFAULT_POLLING_INTERVAL_SECONDS: u32 = 2;

/// Per-owner processing preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub owner_id: i64,
    pub webhook_url: String,
    /// Minutes. Shown to the reviewer; the transport enforces its own limit.
    pub processing_timeout: u32,
    /// Seconds between status polls.
    pub polling_interval: u32,
    pub auto_approve: bool,
    pub enable_webhook: bool,
    pub enable_archive: bool,
    pub archive_folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    pub fn defaults_for(owner_id: i64, webhook_url: &str) -> Self {
        let now = Utc::now();
        Self {
            owner_id,
            webhook_url: webhook_url.to_string(),
            processing_timeout: DEFAULT_PROCESSING_TIMEOUT_MINUTES,
            polling_interval: DEFAULT_POLLING_INTERVAL_SECONDS,
            auto_approve: false,
            enable_webhook: true,
            enable_archive: true,
            archive_folder_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: SettingsUpdate) {
        if let Some(url) = update.webhook_url {
            self.webhook_url = url;
        }
        if let Some(timeout) = update.processing_timeout {
            self.processing_timeout = timeout;
        }
        if let Some(interval) = update.polling_interval {
            self.polling_interval = interval;
        }
        if let Some(auto_approve) = update.auto_approve {
            self.auto_approve = auto_approve;
        }
        if let Some(enable_webhook) = update.enable_webhook {
            self.enable_webhook = enable_webhook;
        }
        if let Some(enable_archive) = update.enable_archive {
            self.enable_archive = enable_archive;
        }
        if let Some(folder) = update.archive_folder_id {
            self.archive_folder_id = Some(folder).filter(|f| !f.is_empty());
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[validate(url)]
    pub webhook_url: Option<String>,
    #[validate(range(min = 1, max = 30))]
    pub processing_timeout: Option<u32>,
    #[validate(range(min = 1, max = 10))]
    pub polling_interval: Option<u32>,
    pub auto_approve: Option<bool>,
    pub enable_webhook: Option<bool>,
    pub enable_archive: Option<bool>,
    #[validate(length(max = 255))]
    pub archive_folder_id: Option<String>,
}
