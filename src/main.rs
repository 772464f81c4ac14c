use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use docgrid_rs::{
    api,
    auth::extractors::AppState,
    repositories::{FileRepository, MemoryStore, SqliteStore, Store},
    services::MockArchive,
    AppConfig, Database,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docgrid_rs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::new()?;
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    info!("Starting docgrid-rs server on {}", bind_address);

    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => match Database::new(url, config.database.max_connections).await {
            Ok(database) => {
                info!("Database connected successfully");
                Arc::new(SqliteStore::new(database))
            }
            Err(e) => {
                error!("Failed to connect to database: {}", e);
                return Err(e);
            }
        },
        None => {
            warn!("DATABASE_URL not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.upload.dir).await?;
    info!("Storing uploads in {}", config.upload.dir);
    info!(
        "Default webhook {} (timeout {}s)",
        config.webhook.default_url, config.webhook.timeout_secs
    );

    let app_state = AppState::new(config, store, Arc::new(MockArchive))?;

    // Build application router
    let app = create_app(app_state).await?;

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!("Server listening on http://{}", bind_address);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}

async fn create_app(app_state: AppState) -> Result<Router> {
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api", api::create_router().await?)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Ok(app)
}

async fn root_handler() -> &'static str {
    "docgrid-rs: document table extraction service"
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.store.health_check().await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "Database connection failed"),
    }
}
