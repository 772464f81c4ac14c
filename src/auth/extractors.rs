use crate::auth::errors::AuthError;
use crate::config::AppConfig;
use crate::repositories::Store;
use crate::services::{ApprovalService, ArchiveClient, ExtractionService, SettingsService, WebhookTransport};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub const OWNER_HEADER: &str = "x-owner-id";

// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub settings: SettingsService,
    pub approval: ApprovalService,
    pub extraction: ExtractionService,
    pub upload_dir: PathBuf,
    pub startup_time: Instant,
}

impl AppState {
    /// Wires the services on top of `store`.
    pub fn new(config: AppConfig, store: Arc<dyn Store>, archive: Arc<dyn ArchiveClient>) -> anyhow::Result<Self> {
        let transport = WebhookTransport::new(&config.webhook)?;
        let settings = SettingsService::new(store.clone(), config.webhook.default_url.clone());
        let approval = ApprovalService::new(store.clone(), settings.clone(), archive);
        let extraction = ExtractionService::new(store.clone(), transport, settings.clone(), approval.clone());

        Ok(Self {
            upload_dir: PathBuf::from(&config.upload.dir),
            config,
            store,
            settings,
            approval,
            extraction,
            startup_time: Instant::now(),
        })
    }
}

/// The caller, identified by the `X-Owner-Id` header. Session handling
/// lives in front of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub i64);

impl FromRequestParts<AppState> for Owner {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(OWNER_HEADER).ok_or(AuthError::MissingOwnerHeader)?;

        let owner_id = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                warn!("Rejected request with owner header {:?}", value);
                AuthError::InvalidOwnerHeader
            })?;

        debug!("Request from owner {}", owner_id);
        Ok(Owner(owner_id))
    }
}
