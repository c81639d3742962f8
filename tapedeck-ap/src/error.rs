//! Error types for tapedeck-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use tapedeck_common::{PlaylistId, SongId};
use thiserror::Error;

/// Main error type for tapedeck-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Engine operation attempted with no loaded track
    #[error("Audio engine not initiated")]
    EngineNotInitiated,

    /// Engine rejected load/pause/resume/stop (bad URL, device error, ...)
    #[error("Audio engine operation failed: {0}")]
    EngineOperationFailed(String),

    /// Directory has no song with this id
    #[error("Song not found: {0}")]
    SongNotFound(SongId),

    /// Playlist exists but has no songs
    #[error("Playlist is empty: {0}")]
    PlaylistEmpty(PlaylistId),

    /// Directory has no playlist with this id
    #[error("Playlist not found: {0}")]
    PlaylistNotFound(PlaylistId),

    /// Command needs a current song and there is none
    #[error("No current song")]
    NoCurrentSong,

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from tapedeck-common (config and library loading)
    #[error(transparent)]
    Common(#[from] tapedeck_common::Error),
}

/// Convenience Result type using tapedeck-ap Error
pub type Result<T> = std::result::Result<T, Error>;
