//! HTTP surface: webhook callbacks, job enqueueing and health.

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::jobs::JobQueue;
use crate::users::UserStore;

pub mod error;
pub mod jobs;
pub mod signature;
pub mod stream_updates;

pub use error::ApiError;

/// Shared handles available to every handler
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub queue: JobQueue,
    /// Secret Twitch signs notifications with
    pub webhook_secret: Arc<str>,
    /// Bearer token for the job endpoints; `None` rejects every caller
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, queue: JobQueue, webhook_secret: &str) -> Self {
        Self {
            users,
            queue,
            webhook_secret: Arc::from(webhook_secret),
            api_token: None,
        }
    }

    pub fn with_api_token(mut self, token: Option<&str>) -> Self {
        self.api_token = token.filter(|token| !token.is_empty()).map(Arc::from);
        self
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/users/:id/twitch_stream_updates",
            get(stream_updates::verify_subscription).post(stream_updates::receive_notification),
        )
        .route(
            "/jobs/twitch_webhook_registrations",
            post(jobs::enqueue_registration),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
