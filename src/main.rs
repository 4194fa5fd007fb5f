//! Notification Feed Backend
//!
//! Mirrors a multi-writer notification store into an ordered, observable feed
//! and lets clients acknowledge notifications without ever patching the feed locally.

mod api;
mod config;
mod db;
mod errors;
mod feed;
mod models;
mod store;

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use errors::{AppError, AppErrorWithRevision};
use feed::FeedSubscription;
use store::{NotificationStore, SqliteStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub feed: Arc<FeedSubscription>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging
    init_tracing(&config.log_level);

    tracing::info!("Starting notification feed backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Collection: {}", config.collection);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize the store
    let pool = db::init_database(&config.db_path).await?;
    let sqlite_store = Arc::new(SqliteStore::new(pool));
    let revision_id = sqlite_store.repository().get_revision_id().await?;
    tracing::info!("Store opened at revision {}", revision_id);
    let store: Arc<dyn NotificationStore> = sqlite_store;

    // Subscribe the feed
    let feed = Arc::new(
        FeedSubscription::activate(
            store.clone(),
            config.collection.clone(),
            config.write_timeout,
        )
        .await?,
    );

    let state = AppState {
        store,
        feed: feed.clone(),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    run_server(listener, app, feed, shutdown_signal()).await?;

    Ok(())
}

fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Serve until `shutdown` resolves, then drain open connections.
///
/// The feed is released as soon as shutdown begins: open feed streams only
/// end once the feed stops, and the drain waits for them.
pub async fn run_server(
    listener: tokio::net::TcpListener,
    app: Router,
    feed: Arc<FeedSubscription>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let on_shutdown = feed.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            on_shutdown.release();
        })
        .await;

    feed.release();
    served
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/notifications", get(api::get_feed))
        .route("/notifications/unread-count", get(api::get_unread_count))
        .route("/notifications/stream", get(api::stream_feed))
        .route("/notifications/read-all", post(api::mark_all_read))
        .route("/notifications/{id}/read", post(api::mark_read))
        .route("/store", patch(api::patch_store));

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint. Unhealthy once the feed subscription has stopped.
async fn health_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.feed.is_active() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Feed subscription inactive")
    }
}

async fn not_found() -> AppErrorWithRevision {
    AppErrorWithRevision {
        error: AppError::NotFound("Route not found".to_string()),
        revision_id: 0,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
