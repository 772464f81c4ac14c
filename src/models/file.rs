use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploading,
    Processing,
    Extracting,
    Complete,
    Error,
}

impl FileStatus {
    /// Position in the expected progression. Both terminal states share the
    /// last rank.
    fn rank(self) -> u8 {
        match self {
            FileStatus::Uploading => 0,
            FileStatus::Processing => 1,
            FileStatus::Extracting => 2,
            FileStatus::Complete | FileStatus::Error => 3,
        }
    }

    pub fn default_progress(self) -> u8 {
        match self {
            FileStatus::Uploading => 0,
            FileStatus::Processing => 50,
            FileStatus::Extracting => 75,
            FileStatus::Complete | FileStatus::Error => 100,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Complete | FileStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Processing => "processing",
            FileStatus::Extracting => "extracting",
            FileStatus::Complete => "complete",
            FileStatus::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(FileStatus::Uploading),
            "processing" => Ok(FileStatus::Processing),
            "extracting" => Ok(FileStatus::Extracting),
            "complete" => Ok(FileStatus::Complete),
            "error" => Ok(FileStatus::Error),
            other => Err(format!("Unknown file status: {}", other)),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("File is already {0}")]
    AlreadyTerminal(FileStatus),
    #[error("Cannot move from {from} back to {to}")]
    Backward { from: FileStatus, to: FileStatus },
    #[error("Progress cannot drop from {from} to {to}")]
    ProgressRegression { from: u8, to: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub owner_id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size: i64,
    pub status: FileStatus,
    pub progress: u8,
    pub webhook_url: Option<String>,
    pub table_data: Option<Table>,
    pub edited_table_data: Option<Table>,
    pub is_approved: bool,
    pub archive_id: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create a record; the store assigns id, version and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub owner_id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size: i64,
    pub webhook_url: Option<String>,
}

impl FileRecord {
    /// Builds the initial `uploading`/0 record for a new upload.
    pub fn from_new(id: i64, new_file: NewFile, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id: new_file.owner_id,
            original_name: new_file.original_name,
            stored_name: new_file.stored_name,
            mime_type: new_file.mime_type,
            size: new_file.size,
            status: FileStatus::Uploading,
            progress: 0,
            webhook_url: new_file.webhook_url,
            table_data: None,
            edited_table_data: None,
            is_approved: false,
            archive_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the record forward. `Error` is reachable from any in-flight
    /// status; nothing leaves a terminal status and progress never drops.
    pub fn advance(&mut self, status: FileStatus, progress: u8) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal(self.status));
        }
        if status != FileStatus::Error && status.rank() < self.status.rank() {
            return Err(TransitionError::Backward { from: self.status, to: status });
        }
        if progress < self.progress {
            return Err(TransitionError::ProgressRegression { from: self.progress, to: progress });
        }

        self.status = status;
        self.progress = progress.min(100);
        Ok(())
    }

    /// Reaches `complete`. A reviewer table written while extraction was
    /// running stays in place; only status and progress move.
    pub fn complete(&mut self, table: Table) -> Result<(), TransitionError> {
        self.advance(FileStatus::Complete, 100)?;
        self.set_extracted_table(table);
        Ok(())
    }

    pub fn fail(&mut self, diagnostic: Table) -> Result<(), TransitionError> {
        self.advance(FileStatus::Error, 100)?;
        self.set_extracted_table(diagnostic);
        Ok(())
    }

    fn set_extracted_table(&mut self, table: Table) {
        if self.edited_table_data.is_none() {
            self.table_data = Some(table);
        }
    }

    /// Reviewer edits replace the authoritative table and its edited mirror
    /// together.
    pub fn apply_edit(&mut self, table: Table) {
        self.edited_table_data = Some(table.clone());
        self.table_data = Some(table);
    }

    pub fn was_edited(&self) -> bool {
        self.edited_table_data.is_some()
    }

    /// Name used for downloads: the original file name without extension.
    pub fn stem(&self) -> &str {
        self.original_name
            .split('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
    }
}
