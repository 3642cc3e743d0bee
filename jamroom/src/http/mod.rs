//! HTTP surface: the `/ws` room protocol endpoint plus health probes

pub mod error;
pub mod health;
pub mod websocket;

use axum::{routing::get, Router};
use jamroom_core::service::IdentityVerifier;
use jamroom_sync::Coordinator;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::AppError;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Largest inbound WebSocket frame, in bytes
    pub max_message_size: usize,
}

/// Build the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .merge(health::create_health_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
