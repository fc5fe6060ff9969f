//! HTTP surface.
//!
//! `AppState` is immutable and shared by `Arc`; each chat request gets its
//! own task and event channel.

pub mod chat;
pub mod competitors;
pub mod errors;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::ChatPipeline;
use crate::tools::{SearchProvider, TOOL_SCHEMA_VERSION};

pub use errors::ApiError;

pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub web_search: Arc<dyn SearchProvider>,
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState, cors_permissive: bool) -> Router {
    let router = Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/competitors", post(competitors::competitors))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "toolSchemaVersion": TOOL_SCHEMA_VERSION,
    }))
}

/// Serve until ctrl-c.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
