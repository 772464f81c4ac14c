use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::NewFile;

static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Create an isolated in-memory SQLite database for testing
pub async fn create_test_database() -> Result<Pool<Sqlite>> {
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_name = format!("file:docgrid_test_db_{}?mode=memory&cache=shared", counter);

    let pool = SqlitePoolOptions::new()
        .max_connections(1) // SQLite in-memory works best with single connection
        .connect(&db_name)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// A `NewFile` for a small PDF owned by `owner_id`.
pub fn sample_new_file(owner_id: i64, original_name: &str) -> NewFile {
    NewFile {
        owner_id,
        original_name: original_name.to_string(),
        stored_name: format!("{}-{}", owner_id, original_name),
        mime_type: "application/pdf".to_string(),
        size: 1024,
        webhook_url: Some("https://hooks.example.com/webhook/test".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_isolated_databases() {
        let db1 = create_test_database().await.unwrap();
        let db2 = create_test_database().await.unwrap();

        sqlx::query(
            "INSERT INTO files (owner_id, original_name, stored_name, mime_type, size) \
             VALUES (1, 'a.pdf', 'a', 'application/pdf', 1)",
        )
        .execute(&db1)
        .await
        .unwrap();

        let count1: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files").fetch_one(&db1).await.unwrap();
        let count2: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files").fetch_one(&db2).await.unwrap();

        assert_eq!(count1, 1);
        assert_eq!(count2, 0);
    }
}
