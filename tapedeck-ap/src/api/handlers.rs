//! HTTP request handlers
//!
//! Control endpoints return once the command has been handled (or
//! superseded by a newer one of the same kind).

use crate::api::server::AppContext;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tapedeck_common::{PlaylistId, SongId};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }

    fn error(code: StatusCode, message: String) -> (StatusCode, Json<Self>) {
        (
            code,
            Json(Self {
                status: format!("error: {}", message),
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    song_id: SongId,
    playlist_id: PlaylistId,
}

#[derive(Debug, Serialize)]
pub struct PlaybackStateResponse {
    song_id: Option<SongId>,
    playlist_id: Option<PlaylistId>,
    is_playing: bool,
    position_secs: u64,
    duration_secs: u64,
    position_ms: u64,
    duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    playlist_id: PlaylistId,
    song_ids: Vec<SongId>,
}

type ErrorResponse = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "tapedeck-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("TAPEDECK_GIT_HASH").to_string(),
        build_timestamp: env!("TAPEDECK_BUILT_AT").to_string(),
        build_profile: env!("TAPEDECK_BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /playback/play - Play a song from a playlist
///
/// Unknown songs are rejected here with 404 rather than reaching the
/// coordinator, which would only log them.
pub async fn play(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<StatusResponse>, ErrorResponse> {
    if let Err(e) = ctx.directory.get_song_with_id(&req.song_id) {
        warn!("Play request for unknown song {}: {}", req.song_id, e);
        return Err(StatusResponse::error(StatusCode::NOT_FOUND, e.to_string()));
    }

    info!("Play request: song {} in playlist {}", req.song_id, req.playlist_id);
    ctx.coordinator.play(req.song_id, req.playlist_id).await;
    Ok(StatusResponse::ok())
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    info!("Pause request");
    ctx.coordinator.pause().await;
    StatusResponse::ok()
}

/// POST /playback/resume
pub async fn resume(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    info!("Resume request");
    ctx.coordinator.resume().await;
    StatusResponse::ok()
}

/// POST /playback/next
pub async fn next(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    info!("Next request");
    ctx.coordinator.next().await;
    StatusResponse::ok()
}

/// POST /playback/previous
pub async fn previous(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    info!("Previous request");
    ctx.coordinator.previous().await;
    StatusResponse::ok()
}

/// GET /playback/state - Current playback snapshot
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlaybackStateResponse> {
    let snapshot = ctx.state.snapshot().await;

    Json(PlaybackStateResponse {
        position_secs: snapshot.position_secs(),
        duration_secs: snapshot.duration_secs(),
        song_id: snapshot.song_id,
        playlist_id: snapshot.playlist_id,
        is_playing: snapshot.is_playing,
        position_ms: snapshot.position_ms,
        duration_ms: snapshot.duration_ms,
    })
}

// ============================================================================
// Directory Endpoints
// ============================================================================

/// GET /playlists/:playlist_id - Ordered song ids of a playlist
pub async fn get_playlist(
    State(ctx): State<AppContext>,
    Path(playlist_id): Path<String>,
) -> Result<Json<PlaylistResponse>, ErrorResponse> {
    let playlist_id = PlaylistId::new(playlist_id);

    match ctx.directory.get_playlist_song_ids(&playlist_id) {
        Ok(song_ids) => Ok(Json(PlaylistResponse {
            playlist_id,
            song_ids,
        })),
        Err(tapedeck_common::Error::NotFound(message)) => {
            Err(StatusResponse::error(StatusCode::NOT_FOUND, message))
        }
        Err(e) => Err(StatusResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}
