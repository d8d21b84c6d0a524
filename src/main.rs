// Event-handler entry point for the product photo alignment workflow

use product_align::{
    core::Config, orchestration::BatchProcessor, services::LocalStore, utils::Metrics,
    StorageEvent,
};

use anyhow::Result;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    processor: Arc<BatchProcessor<LocalStore>>,
    metrics: Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().expect("Failed to load configuration"));

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "product_align={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== PRODUCT PHOTO ALIGNMENT ===");
    info!(
        "Config: storage_root={} threshold_window={} closing_radius={}",
        config.storage.root.display(),
        config.detection.threshold_window,
        config.detection.closing_radius
    );

    let metrics = Metrics::new();
    let store = Arc::new(LocalStore::new(config.storage.root.clone()));
    let processor = Arc::new(BatchProcessor::new(
        config.clone(),
        store,
        metrics.clone(),
    ));
    let state = AppState { processor, metrics };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create router with the event intake and monitoring endpoints
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_snapshot))
        .route("/events", post(handle_events))
        .layer(cors)
        .with_state(state);

    let addr = config.bind_address();
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "product-align",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// File-arrival notification intake.
///
/// The whole pipeline (download, detect, align, archive, upload) is
/// CPU- and IO-bound synchronous work, so it runs on the blocking pool.
async fn handle_events(
    State(state): State<AppState>,
    Json(event): Json<StorageEvent>,
) -> impl IntoResponse {
    let processor = state.processor.clone();
    match tokio::task::spawn_blocking(move || processor.handle_event(&event)).await {
        Ok(summary) => (StatusCode::OK, Json(serde_json::json!(summary))).into_response(),
        Err(err) => {
            error!(%err, "event handling task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "event handling failed" })),
            )
                .into_response()
        }
    }
}
