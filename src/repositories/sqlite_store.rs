use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use super::file_repository::{FileRepository, RepositoryError};
use super::settings_repository::SettingsRepository;
use crate::database::Database;
use crate::models::{FileRecord, FileStatus, NewFile, Settings, Table};

const FILE_COLUMNS: &str = "id, owner_id, original_name, stored_name, mime_type, size, status, progress, \
     webhook_url, table_data, edited_table_data, is_approved, archive_id, version, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "owner_id, webhook_url, processing_timeout, polling_interval, auto_approve, \
     enable_webhook, enable_archive, archive_folder_id, created_at, updated_at";

/// SQLite-backed store. Tables are kept as JSON text.
#[derive(Clone)]
pub struct SqliteStore {
    database: Database,
}

impl SqliteStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

fn encode_table(table: &Option<Table>) -> Result<Option<String>, RepositoryError> {
    table.as_ref().map(serde_json::to_string).transpose().map_err(Into::into)
}

fn decode_table(text: Option<String>) -> Result<Option<Table>, RepositoryError> {
    text.as_deref().map(serde_json::from_str).transpose().map_err(Into::into)
}

fn file_from_row(row: &SqliteRow) -> Result<FileRecord, RepositoryError> {
    let status: String = row.try_get("status")?;
    let progress: i64 = row.try_get("progress")?;

    Ok(FileRecord {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        original_name: row.try_get("original_name")?,
        stored_name: row.try_get("stored_name")?,
        mime_type: row.try_get("mime_type")?,
        size: row.try_get("size")?,
        status: status.parse::<FileStatus>().map_err(RepositoryError::Corrupt)?,
        progress: u8::try_from(progress.clamp(0, 100)).unwrap_or(100),
        webhook_url: row.try_get("webhook_url")?,
        table_data: decode_table(row.try_get("table_data")?)?,
        edited_table_data: decode_table(row.try_get("edited_table_data")?)?,
        is_approved: row.try_get("is_approved")?,
        archive_id: row.try_get("archive_id")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn settings_from_row(row: &SqliteRow) -> Result<Settings, RepositoryError> {
    let timeout: i64 = row.try_get("processing_timeout")?;
    let interval: i64 = row.try_get("polling_interval")?;

    Ok(Settings {
        owner_id: row.try_get("owner_id")?,
        webhook_url: row.try_get("webhook_url")?,
        processing_timeout: u32::try_from(timeout).map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
        polling_interval: u32::try_from(interval).map_err(|e| RepositoryError::Corrupt(e.to_string()))?,
        auto_approve: row.try_get("auto_approve")?,
        enable_webhook: row.try_get("enable_webhook")?,
        enable_archive: row.try_get("enable_archive")?,
        archive_folder_id: row.try_get("archive_folder_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl FileRepository for SqliteStore {
    async fn create_file(&self, new_file: NewFile) -> Result<FileRecord, RepositoryError> {
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO files (owner_id, original_name, stored_name, mime_type, size, status, progress,
                               webhook_url, is_approved, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, false, 1, ?8, ?8)
            RETURNING id
            "#,
        )
        .bind(new_file.owner_id)
        .bind(&new_file.original_name)
        .bind(&new_file.stored_name)
        .bind(&new_file.mime_type)
        .bind(new_file.size)
        .bind(FileStatus::Uploading.as_str())
        .bind(&new_file.webhook_url)
        .bind(now)
        .fetch_one(self.database.pool())
        .await?;

        let id: i64 = row.try_get("id")?;
        Ok(FileRecord::from_new(id, new_file, now))
    }

    async fn get_file(&self, id: i64) -> Result<Option<FileRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS))
            .bind(id)
            .fetch_optional(self.database.pool())
            .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    async fn list_files(&self, owner_id: i64) -> Result<Vec<FileRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM files WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC",
            FILE_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(self.database.pool())
        .await?;

        rows.iter().map(file_from_row).collect()
    }

    async fn update_file(&self, record: FileRecord, expected_version: i64) -> Result<FileRecord, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET status = ?1, progress = ?2, webhook_url = ?3, table_data = ?4, edited_table_data = ?5,
                is_approved = ?6, archive_id = ?7, version = version + 1, updated_at = ?8
            WHERE id = ?9 AND version = ?10
            "#,
        )
        .bind(record.status.as_str())
        .bind(i64::from(record.progress))
        .bind(&record.webhook_url)
        .bind(encode_table(&record.table_data)?)
        .bind(encode_table(&record.edited_table_data)?)
        .bind(record.is_approved)
        .bind(&record.archive_id)
        .bind(Utc::now())
        .bind(record.id)
        .bind(expected_version)
        .execute(self.database.pool())
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM files WHERE id = ?1")
                .bind(record.id)
                .fetch_optional(self.database.pool())
                .await?;

            return Err(match actual {
                Some(actual) => RepositoryError::Conflict { id: record.id, expected: expected_version, actual },
                None => RepositoryError::NotFound(record.id),
            });
        }

        self.get_file(record.id).await?.ok_or(RepositoryError::NotFound(record.id))
    }

    async fn delete_file(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id)
            .execute(self.database.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        self.database.health_check().await.map_err(|e| RepositoryError::Database(e.to_string()))
    }
}

#[async_trait]
impl SettingsRepository for SqliteStore {
    async fn get_settings(&self, owner_id: i64) -> Result<Option<Settings>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM settings WHERE owner_id = ?1", SETTINGS_COLUMNS))
            .bind(owner_id)
            .fetch_optional(self.database.pool())
            .await?;

        row.as_ref().map(settings_from_row).transpose()
    }

    async fn save_settings(&self, settings: Settings) -> Result<Settings, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO settings (owner_id, webhook_url, processing_timeout, polling_interval, auto_approve,
                                  enable_webhook, enable_archive, archive_folder_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(owner_id) DO UPDATE SET
                webhook_url = excluded.webhook_url,
                processing_timeout = excluded.processing_timeout,
                polling_interval = excluded.polling_interval,
                auto_approve = excluded.auto_approve,
                enable_webhook = excluded.enable_webhook,
                enable_archive = excluded.enable_archive,
                archive_folder_id = excluded.archive_folder_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.owner_id)
        .bind(&settings.webhook_url)
        .bind(i64::from(settings.processing_timeout))
        .bind(i64::from(settings.polling_interval))
        .bind(settings.auto_approve)
        .bind(settings.enable_webhook)
        .bind(settings.enable_archive)
        .bind(&settings.archive_folder_id)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(self.database.pool())
        .await?;

        Ok(settings)
    }
}
