//! Audio engine adapter
//!
//! The engine is a black box that loads one track at a time and reports
//! playback status through a callback. `ClockEngine` stands in for a real
//! device-backed engine.

pub mod clock;
pub mod engine;
pub mod types;

pub use clock::ClockEngine;
pub use engine::AudioEngine;
pub use types::{LoadedTrack, StatusCallback, StatusEvent};
