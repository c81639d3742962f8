//! Event types for the Tapedeck event system

use crate::library::{PlaylistId, SongId};
use crate::time::millis_to_secs;
use serde::{Deserialize, Serialize};

/// Point-in-time copy of the coordinator's playback state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub song_id: Option<SongId>,
    pub playlist_id: Option<PlaylistId>,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl PlaybackSnapshot {
    /// Playback position in whole seconds
    pub fn position_secs(&self) -> u64 {
        millis_to_secs(self.position_ms)
    }

    /// Track duration in whole seconds
    pub fn duration_secs(&self) -> u64 {
        millis_to_secs(self.duration_ms)
    }
}

/// Tapedeck event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TapedeckEvent {
    /// Playing flag flipped
    PlaybackStateChanged {
        is_playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new track was loaded and committed as current
    CurrentSongChanged {
        song_id: SongId,
        playlist_id: PlaylistId,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback position update (about once per engine progress interval)
    PlaybackPosition {
        song_id: Option<SongId>,
        position_ms: u64,
        duration_ms: u64,
        playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The engine reported the end of a track
    TrackFinished {
        song_id: SongId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Initial state sent on SSE connection
    InitialState {
        snapshot: PlaybackSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TapedeckEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TapedeckEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            TapedeckEvent::CurrentSongChanged { .. } => "CurrentSongChanged",
            TapedeckEvent::PlaybackPosition { .. } => "PlaybackPosition",
            TapedeckEvent::TrackFinished { .. } => "TrackFinished",
            TapedeckEvent::InitialState { .. } => "InitialState",
        }
    }
}
