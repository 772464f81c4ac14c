//! Drives a file record from upload to `complete` or `error`.
//!
//! Progression: `uploading` 0 → `uploading` 25 → `processing` 50 →
//! `extracting` 75 → `complete` 100 or `error` 100. Every step is persisted
//! before the next one starts so that pollers see progress grow. Failures at
//! any step end the record in `error` with a small diagnostic table in place
//! of extracted data; nothing is retried.

use axum::body::Bytes;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::approval::ApprovalService;
use super::normalizer::normalize;
use super::settings::SettingsService;
use super::transport::{TransportError, WebhookRequest, WebhookTransport};
use crate::models::{FileRecord, FileStatus, NewFile, Table, TransitionError};
use crate::repositories::{FileRepository, RepositoryError, Store};

/// Attempts per transition when a concurrent writer bumped the version.
const MAX_TRANSITION_ATTEMPTS: usize = 5;

const TRANSPORT_SUGGESTION: &str = "Check your n8n workflow or try a smaller file";

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),
    #[error("File {0} kept changing while being updated")]
    Contention(i64),
}

/// Why an extraction attempt ended in `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Http,
    Network,
    Internal,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Timeout => "Timeout",
            FailureKind::Http => "HTTP Error",
            FailureKind::Network => "Network Error",
            FailureKind::Internal => "Internal Error",
        }
    }
}

/// A validated upload whose bytes are already stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub file_id: i64,
    pub owner_id: i64,
    pub original_name: String,
    pub mime_type: String,
    pub webhook_url: String,
    pub bytes: Bytes,
}

/// Diagnostic shown when the webhook answered but nothing usable came back.
pub fn processing_failed_table() -> Table {
    Table::from(vec![
        vec!["Status", "Message"],
        vec!["Error", "Document processing failed"],
        vec!["Suggestion", "Please try uploading again or check document format"],
    ])
}

/// Diagnostic for a failed webhook call.
pub fn failure_table(kind: FailureKind, message: &str, filename: &str, webhook_url: &str) -> Table {
    Table::from(vec![
        vec!["Status", "Message"],
        vec!["Error Type", kind.label()],
        vec!["Error", message],
        vec!["Filename", filename],
        vec!["Webhook URL", webhook_url],
        vec!["Suggestion", TRANSPORT_SUGGESTION],
    ])
}

fn describe_duration(secs: u64) -> String {
    match secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

fn transport_failure(err: &TransportError) -> (FailureKind, String) {
    match err {
        TransportError::Timeout { secs } => (
            FailureKind::Timeout,
            format!(
                "Processing timed out ({}) - your n8n workflow may be taking too long",
                describe_duration(*secs)
            ),
        ),
        TransportError::Network(message) => (FailureKind::Network, message.clone()),
    }
}

fn http_failure(status: StatusCode, body: &str) -> (FailureKind, String) {
    if status.as_u16() == 524 {
        return (
            FailureKind::Http,
            "Webhook gateway timed out (HTTP 524) - your n8n workflow may be taking too long".to_string(),
        );
    }

    let detail: String = body.trim().chars().take(200).collect();
    let detail = if detail.is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_string()
    } else {
        detail
    };
    (FailureKind::Http, format!("Webhook returned HTTP {}: {}", status.as_u16(), detail))
}

#[derive(Clone)]
pub struct ExtractionService {
    store: Arc<dyn Store>,
    transport: WebhookTransport,
    settings: SettingsService,
    approval: ApprovalService,
}

impl ExtractionService {
    pub fn new(
        store: Arc<dyn Store>,
        transport: WebhookTransport,
        settings: SettingsService,
        approval: ApprovalService,
    ) -> Self {
        Self { store, transport, settings, approval }
    }

    /// Creates the `uploading` record and, when the owner has the webhook
    /// enabled, starts extraction in the background. Returns without waiting
    /// for extraction.
    pub async fn submit(&self, owner_id: i64, upload: Upload) -> Result<FileRecord, RepositoryError> {
        let settings = self.settings.get(owner_id).await?;

        let record = self
            .store
            .create_file(NewFile {
                owner_id,
                original_name: upload.original_name.clone(),
                stored_name: upload.stored_name,
                mime_type: upload.mime_type.clone(),
                size: upload.bytes.len() as i64,
                webhook_url: Some(settings.webhook_url.clone()),
            })
            .await?;

        info!("Created file {} for {} (owner {})", record.id, record.original_name, owner_id);

        if settings.enable_webhook {
            self.spawn(ExtractionJob {
                file_id: record.id,
                owner_id,
                original_name: upload.original_name,
                mime_type: upload.mime_type,
                webhook_url: settings.webhook_url,
                bytes: upload.bytes,
            });
        } else {
            info!("Webhook disabled for owner {}, file {} stays in uploading", owner_id, record.id);
        }

        Ok(record)
    }

    pub fn spawn(&self, job: ExtractionJob) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let file_id = job.file_id;
            if let Err(e) = service.run(job).await {
                error!("File {} could not be resolved: {}", file_id, e);
            }
        })
    }

    /// Runs the whole pipeline for one record. Any failure is turned into an
    /// `error` record; `Err` is returned only when even that cannot be saved.
    pub async fn run(&self, job: ExtractionJob) -> Result<FileRecord, LifecycleError> {
        match self.drive(&job).await {
            Ok(record) => Ok(record),
            Err(e) => {
                error!("Extraction of file {} aborted: {}", job.file_id, e);
                let diagnostic = failure_table(
                    FailureKind::Internal,
                    &e.to_string(),
                    &job.original_name,
                    &job.webhook_url,
                );
                self.transition(job.file_id, move |r| r.fail(diagnostic.clone())).await
            }
        }
    }

    async fn drive(&self, job: &ExtractionJob) -> Result<FileRecord, LifecycleError> {
        let id = job.file_id;

        self.transition(id, |r| r.advance(FileStatus::Uploading, 25)).await?;
        self.transition(id, |r| r.advance(FileStatus::Processing, 50)).await?;

        let request = WebhookRequest {
            url: job.webhook_url.clone(),
            file_id: id,
            original_name: job.original_name.clone(),
            mime_type: job.mime_type.clone(),
            bytes: job.bytes.clone(),
        };

        let record = match self.transport.send(&request).await {
            Ok(response) => {
                self.transition(id, |r| r.advance(FileStatus::Extracting, 75)).await?;

                if response.is_success() {
                    match normalize(&response.body) {
                        Ok(table) => {
                            let table = table.rectangularize();
                            info!(
                                "Extracted {} rows x {} columns for {}",
                                table.len(),
                                table.width(),
                                job.original_name
                            );
                            self.transition(id, move |r| r.complete(table.clone())).await?
                        }
                        Err(e) => {
                            warn!("No usable table for {}: {}", job.original_name, e);
                            self.transition(id, |r| r.fail(processing_failed_table())).await?
                        }
                    }
                } else {
                    let (kind, message) = http_failure(response.status, &response.body);
                    warn!("Webhook failed for {}: {}", job.original_name, message);
                    let diagnostic = failure_table(kind, &message, &job.original_name, &job.webhook_url);
                    self.transition(id, move |r| r.fail(diagnostic.clone())).await?
                }
            }
            Err(e) => {
                let (kind, message) = transport_failure(&e);
                warn!("Webhook call failed for {}: {}", job.original_name, message);
                let diagnostic = failure_table(kind, &message, &job.original_name, &job.webhook_url);
                self.transition(id, move |r| r.fail(diagnostic.clone())).await?
            }
        };

        if record.status == FileStatus::Complete {
            return Ok(self.auto_approve(record).await);
        }
        Ok(record)
    }

    async fn auto_approve(&self, record: FileRecord) -> FileRecord {
        match self.settings.get(record.owner_id).await {
            Ok(settings) if settings.auto_approve => {
                match self.approval.approve(record.owner_id, record.id).await {
                    Ok(approved) => {
                        info!("File {} auto-approved", approved.id);
                        approved
                    }
                    Err(e) => {
                        warn!("Auto-approval of file {} failed: {}", record.id, e);
                        record
                    }
                }
            }
            Ok(_) => record,
            Err(e) => {
                warn!("Could not load settings for owner {}: {}", record.owner_id, e);
                record
            }
        }
    }

    /// Read-modify-write of one record, re-read and re-applied when another
    /// writer got in between.
    async fn transition<F>(&self, id: i64, apply: F) -> Result<FileRecord, LifecycleError>
    where
        F: Fn(&mut FileRecord) -> Result<(), TransitionError> + Send + Sync,
    {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let mut record = self.store.get_file(id).await?.ok_or(RepositoryError::NotFound(id))?;
            let expected = record.version;
            apply(&mut record)?;

            match self.store.update_file(record, expected).await {
                Ok(saved) => {
                    debug!("File {} is now {} ({}%)", id, saved.status, saved.progress);
                    return Ok(saved);
                }
                Err(RepositoryError::Conflict { .. }) => {
                    debug!("Version conflict on file {} (attempt {})", id, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LifecycleError::Contention(id))
    }
}
