//! # Tapedeck Common Library
//!
//! Shared code for the Tapedeck crates including:
//! - Playlist / song directory contract and in-memory library
//! - Event types (TapedeckEvent enum) and playback snapshots
//! - Configuration loading
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod library;
pub mod time;

pub use error::{Error, Result};
pub use library::{Directory, Library, Playlist, PlaylistId, Song, SongId};
