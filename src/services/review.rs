use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{FileRecord, FileStatus, Table, TableError};
use crate::repositories::{FileRepository, RepositoryError, Store};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("File {0} not found")]
    NotFound(i64),
    #[error("File is {0}, only complete files can be reviewed")]
    NotReviewable(FileStatus),
    #[error("File has no extracted table")]
    NoTable,
    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
    #[error("File was changed by someone else (expected version {expected}, found {actual})")]
    Conflict { expected: i64, actual: i64 },
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ReviewError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => ReviewError::NotFound(id),
            RepositoryError::Conflict { expected, actual, .. } => ReviewError::Conflict { expected, actual },
            other => ReviewError::Repository(other),
        }
    }
}

async fn load_owned(store: &dyn Store, owner_id: i64, file_id: i64) -> Result<FileRecord, ReviewError> {
    store
        .get_file(file_id)
        .await?
        .filter(|r| r.owner_id == owner_id)
        .ok_or(ReviewError::NotFound(file_id))
}

/// Replaces a record's table wholesale. With `expected_version` the write
/// is rejected when the record moved on; without it the last writer wins.
pub async fn replace_table(
    store: &dyn Store,
    owner_id: i64,
    file_id: i64,
    table: Table,
    expected_version: Option<i64>,
) -> Result<FileRecord, ReviewError> {
    table.validate()?;

    let record = load_owned(store, owner_id, file_id).await?;
    if let Some(expected) = expected_version {
        if expected != record.version {
            return Err(ReviewError::Conflict { expected, actual: record.version });
        }
    }

    let expected = record.version;
    let mut updated = record;
    updated.apply_edit(table);
    let saved = store.update_file(updated, expected).await?;
    info!("Table of file {} replaced ({} rows)", saved.id, saved.table_data.as_ref().map_or(0, Table::len));
    Ok(saved)
}

/// One reviewer's editing pass over a completed file.
///
/// Every edit is written through immediately, guarded by the version the
/// session last saw. Coordinates of changed cells are kept for highlighting
/// and follow inserted rows and columns.
pub struct ReviewSession {
    store: Arc<dyn Store>,
    record: FileRecord,
    table: Table,
    dirty: BTreeSet<(usize, usize)>,
}

impl ReviewSession {
    pub async fn open(store: Arc<dyn Store>, owner_id: i64, file_id: i64) -> Result<Self, ReviewError> {
        let record = load_owned(store.as_ref(), owner_id, file_id).await?;
        if record.status != FileStatus::Complete {
            return Err(ReviewError::NotReviewable(record.status));
        }
        let table = record.table_data.clone().ok_or(ReviewError::NoTable)?;

        Ok(Self { store, record, table, dirty: BTreeSet::new() })
    }

    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn dirty_cells(&self) -> Vec<(usize, usize)> {
        self.dirty.iter().copied().collect()
    }

    pub fn is_dirty(&self, row: usize, col: usize) -> bool {
        self.dirty.contains(&(row, col))
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Writing the value a cell already holds changes nothing, not even
    /// the dirty set.
    pub async fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<bool, ReviewError> {
        let mut table = self.table().clone();
        if !table.set_cell(row, col, value.into())? {
            return Ok(false);
        }

        self.persist(table).await?;
        self.dirty.insert((row, col));
        Ok(true)
    }

    pub async fn insert_row(&mut self, at: usize) -> Result<(), ReviewError> {
        let mut table = self.table().clone();
        table.insert_row(at)?;
        let width = table.width();

        self.persist(table).await?;
        self.dirty = self
            .dirty
            .iter()
            .map(|&(r, c)| if r >= at { (r + 1, c) } else { (r, c) })
            .chain((0..width).map(|c| (at, c)))
            .collect();
        Ok(())
    }

    pub async fn insert_column(&mut self, at: usize) -> Result<(), ReviewError> {
        let mut table = self.table().clone();
        table.insert_column(at, format!("Column {}", at + 1))?;
        let height = table.len();

        self.persist(table).await?;
        self.dirty = self
            .dirty
            .iter()
            .map(|&(r, c)| if c >= at { (r, c + 1) } else { (r, c) })
            .chain((0..height).map(|r| (r, at)))
            .collect();
        Ok(())
    }

    async fn persist(&mut self, table: Table) -> Result<(), ReviewError> {
        let expected = self.record.version;
        let mut updated = self.record.clone();
        updated.apply_edit(table.clone());

        self.record = self.store.update_file(updated, expected).await?;
        self.table = table;
        debug!("Saved edit to file {} (version {})", self.record.id, self.record.version);
        Ok(())
    }
}
