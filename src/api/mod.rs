//! HTTP surface: the search form, a JSON API and the report download.
//!
//! ## Endpoints
//!
//! - `GET /` - Search form with the default filters
//! - `POST /analyze` - Form submission; renders the report page
//! - `POST /api/analyze` - JSON filters in, report and summary out
//! - `GET /api/report` - Download the last persisted report
//! - `GET /api/health` - Liveness plus missing credentials

mod page;
pub mod routes;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::ReportPipeline;

pub use routes::{run_analysis, AnalysisError, AnalysisOutcome, AppState};

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/analyze", post(routes::analyze_form))
        .route("/api/analyze", post(routes::analyze_json))
        .route("/api/report", get(routes::download_report))
        .route("/api/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.host:config.port` and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: Config, pipeline: Arc<dyn ReportPipeline>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, pipeline));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server runtime failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
