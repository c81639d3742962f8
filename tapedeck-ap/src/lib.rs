//! # Tapedeck Audio Player Library (tapedeck-ap)
//!
//! Playlist playback coordination on top of a pluggable audio engine.
//!
//! **Purpose:** Accept play / pause / resume / next / previous, keep a logical
//! playback state in step with the engine's status feed, and expose both over
//! HTTP/SSE.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use playback::PlaybackCoordinator;
pub use state::SharedState;
