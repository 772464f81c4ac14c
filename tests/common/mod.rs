#![allow(dead_code)]

use axum::Router;
use axum_test::TestServer;
use docgrid_rs::{
    api,
    auth::extractors::AppState,
    config::{AppConfig, DatabaseConfig, ServerConfig, UploadConfig, WebhookConfig},
    repositories::{MemoryStore, Store},
    services::MockArchive,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const OWNER: &str = "1";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    // Held so the upload directory outlives the server.
    pub upload_dir: TempDir,
}

pub fn test_config(webhook_url: &str, timeout_secs: u64, upload_dir: &TempDir) -> AppConfig {
    AppConfig {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 0 },
        database: DatabaseConfig { url: None, max_connections: 1 },
        webhook: WebhookConfig {
            default_url: webhook_url.to_string(),
            timeout_secs,
            user_agent: "docgrid-rs-test".to_string(),
        },
        upload: UploadConfig { dir: upload_dir.path().to_string_lossy().to_string() },
    }
}

pub async fn create_test_app_with_store(webhook_url: &str, timeout_secs: u64, store: Arc<dyn Store>) -> TestApp {
    let upload_dir = TempDir::new().expect("Failed to create temp directory");
    let config = test_config(webhook_url, timeout_secs, &upload_dir);
    let state = AppState::new(config, store, Arc::new(MockArchive)).expect("Failed to build app state");

    let router = api::create_router().await.expect("Failed to create router");
    let app = Router::new().nest("/api", router).with_state(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp { server, state, upload_dir }
}

pub async fn create_test_app(webhook_url: &str, timeout_secs: u64) -> TestApp {
    create_test_app_with_store(webhook_url, timeout_secs, Arc::new(MemoryStore::new())).await
}

pub async fn upload(app: &TestApp, filename: &str, bytes: &'static [u8]) -> Value {
    let response = app
        .server
        .post("/api/files/upload")
        .add_query_param("filename", filename)
        .add_header("x-owner-id", OWNER)
        .content_type("application/pdf")
        .bytes(bytes.into())
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

/// Polls the file until it reaches `complete` or `error`.
pub async fn wait_for_terminal(app: &TestApp, id: i64) -> Value {
    for _ in 0..200 {
        let record = app
            .server
            .get(&format!("/api/files/{}", id))
            .add_header("x-owner-id", OWNER)
            .await
            .json::<Value>();

        if record["status"] == "complete" || record["status"] == "error" {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    panic!("File {} never finished processing", id);
}
