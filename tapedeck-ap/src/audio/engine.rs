//! Engine contract consumed by the playback coordinator

use async_trait::async_trait;

use super::types::{LoadedTrack, StatusCallback, StatusEvent};
use crate::error::Result;

/// Single-handle audio engine
///
/// At most one track is loaded at a time. Every operation other than
/// `load_and_play` and `is_initiated` fails with
/// [`Error::EngineNotInitiated`](crate::Error::EngineNotInitiated) when
/// nothing is loaded.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Load `url` and start playing it
    ///
    /// A previously loaded track is unloaded first; its subscriber receives
    /// a final `is_loaded = false` status.
    async fn load_and_play(&self, url: &str) -> Result<LoadedTrack>;

    async fn pause(&self) -> Result<()>;

    /// Continue playing the loaded track from its current position
    async fn resume(&self) -> Result<()>;

    /// Stop and rewind the loaded track; it stays loaded
    async fn stop(&self) -> Result<()>;

    async fn get_status(&self) -> Result<StatusEvent>;

    fn is_initiated(&self) -> bool;

    /// Install the status callback for the loaded track
    ///
    /// Replaces any earlier callback. Callbacks arrive about once per
    /// progress interval while playing, and immediately on load, pause,
    /// resume, finish and unload.
    fn subscribe(&self, callback: StatusCallback) -> Result<()>;
}
