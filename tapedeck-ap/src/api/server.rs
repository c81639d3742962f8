//! HTTP server setup and routing
//!
//! Sets up the Axum router with control endpoints and SSE.

use crate::error::{Error, Result};
use crate::playback::PlaybackCoordinator;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tapedeck_common::Directory;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub coordinator: Arc<PlaybackCoordinator>,
    /// Same directory the coordinator reads
    pub directory: Arc<dyn Directory>,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Playback control
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/resume", post(super::handlers::resume))
        .route("/playback/next", post(super::handlers::next))
        .route("/playback/previous", post(super::handlers::previous))
        .route("/playback/state", get(super::handlers::get_playback_state))

        // Directory read-through
        .route("/playlists/:playlist_id", get(super::handlers::get_playlist))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Serve the API on `addr` until `shutdown` resolves
pub async fn run(
    addr: SocketAddr,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
