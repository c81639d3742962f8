//! Shared playback state
//!
//! The coordinator's command handlers and the active tracking task are the
//! only writers. Everyone else reads snapshots or subscribes to events.

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use tapedeck_common::events::TapedeckEvent;
use tapedeck_common::time;
use tapedeck_common::{PlaylistId, SongId};

pub use tapedeck_common::events::PlaybackSnapshot;

/// Shared state accessible by all components
///
/// Each mutation takes the write lock once and does no other awaiting while
/// holding it, so a cancelled command never leaves a half-applied change.
pub struct SharedState {
    /// Logical playback state
    pub playback: RwLock<PlaybackSnapshot>,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<TapedeckEvent>,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            playback: RwLock::new(PlaybackSnapshot::default()),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: TapedeckEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<TapedeckEvent> {
        self.event_tx.subscribe()
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.playback.read().await.clone()
    }

    /// Current song and playlist
    pub async fn current(&self) -> (Option<SongId>, Option<PlaylistId>) {
        let state = self.playback.read().await;
        (state.song_id.clone(), state.playlist_id.clone())
    }

    pub async fn is_playing(&self) -> bool {
        self.playback.read().await.is_playing
    }

    /// Playback position in whole seconds
    pub async fn position_secs(&self) -> u64 {
        self.playback.read().await.position_secs()
    }

    /// Track duration in whole seconds
    pub async fn duration_secs(&self) -> u64 {
        self.playback.read().await.duration_secs()
    }

    /// Record a freshly loaded track as current and playing
    ///
    /// Position restarts at zero and the duration comes from the new load,
    /// so nothing from the previous track survives.
    pub async fn commit_track_started(
        &self,
        song_id: SongId,
        playlist_id: PlaylistId,
        duration_ms: u64,
    ) {
        let was_playing = {
            let mut state = self.playback.write().await;
            let was_playing = state.is_playing;
            state.song_id = Some(song_id.clone());
            state.playlist_id = Some(playlist_id.clone());
            state.is_playing = true;
            state.position_ms = 0;
            state.duration_ms = duration_ms;
            was_playing
        };

        self.broadcast_event(TapedeckEvent::CurrentSongChanged {
            song_id,
            playlist_id,
            duration_ms,
            timestamp: time::now(),
        });
        if !was_playing {
            self.broadcast_event(TapedeckEvent::PlaybackStateChanged {
                is_playing: true,
                timestamp: time::now(),
            });
        }
    }

    /// Set the playing flag
    ///
    /// Setting `true` without a current song is refused so that a playing
    /// state always names its song.
    pub async fn set_playing(&self, is_playing: bool) {
        let changed = {
            let mut state = self.playback.write().await;
            if is_playing && state.song_id.is_none() {
                debug!("Ignoring is_playing=true with no current song");
                return;
            }
            let changed = state.is_playing != is_playing;
            state.is_playing = is_playing;
            changed
        };

        if changed {
            self.broadcast_event(TapedeckEvent::PlaybackStateChanged {
                is_playing,
                timestamp: time::now(),
            });
        }
    }

    /// Publish a position reported by the engine
    pub async fn set_position(&self, position_ms: u64) {
        self.set_position_if(position_ms, || true).await;
    }

    /// Publish a position if `is_current` still holds once the write lock is held
    ///
    /// A tracker that was superseded while waiting for the lock must not
    /// write its old track's position over the new track.
    pub async fn set_position_if(&self, position_ms: u64, is_current: impl FnOnce() -> bool) -> bool {
        let event = {
            let mut state = self.playback.write().await;
            if !is_current() {
                return false;
            }
            state.position_ms = position_ms;
            TapedeckEvent::PlaybackPosition {
                song_id: state.song_id.clone(),
                position_ms,
                duration_ms: state.duration_ms,
                playing: state.is_playing,
                timestamp: time::now(),
            }
        };
        self.broadcast_event(event);
        true
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
