//! Playback coordination
//!
//! The coordinator runs user commands against the audio engine; a tracking
//! task follows the loaded track through its status stream.

pub mod commands;
pub mod coordinator;
pub mod position;
pub mod status_stream;
pub mod tracker;

pub use commands::{Command, CommandKind};
pub use coordinator::PlaybackCoordinator;
pub use position::{classify, PositionState, SongPosition};
pub use status_stream::{StatusStream, StreamCloser, StreamMessage};
pub use tracker::{TrackerHandle, TrackerPhase, TrackingTask};
