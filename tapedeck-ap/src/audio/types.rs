//! Engine status types

use std::sync::Arc;

/// Point-in-time snapshot of engine playback status
///
/// Each event describes the complete status, never a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEvent {
    /// A track is loaded in the engine
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    /// Set on exactly one event, when playback reaches the end of the track
    pub did_just_finish: bool,
    pub is_looping: bool,
    /// Engine-side error message, if any
    pub error: Option<String>,
}

impl StatusEvent {
    /// Status reported once a track has been unloaded
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Status of a loaded track
    pub fn loaded(is_playing: bool, position_ms: u64, duration_ms: u64) -> Self {
        Self {
            is_loaded: true,
            is_playing,
            position_ms,
            duration_ms,
            ..Default::default()
        }
    }

    /// Status of a loaded track that just reached its end
    pub fn finished(duration_ms: u64) -> Self {
        Self {
            did_just_finish: true,
            ..Self::loaded(false, duration_ms, duration_ms)
        }
    }
}

/// Result of a successful load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedTrack {
    pub duration_ms: u64,
}

/// Status callback installed with [`AudioEngine::subscribe`](super::AudioEngine::subscribe)
///
/// Called from engine-owned tasks; must not block.
pub type StatusCallback = Arc<dyn Fn(StatusEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_status() {
        let status = StatusEvent::unloaded();
        assert!(!status.is_loaded);
        assert!(!status.is_playing);
        assert!(!status.did_just_finish);
    }

    #[test]
    fn test_finished_status_sits_at_end() {
        let status = StatusEvent::finished(3000);
        assert!(status.is_loaded);
        assert!(!status.is_playing);
        assert!(status.did_just_finish);
        assert_eq!(status.position_ms, 3000);
        assert_eq!(status.duration_ms, 3000);
    }
}
