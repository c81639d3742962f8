//! Playlist and song directory
//!
//! The playback coordinator only ever reads from the directory. Edits made
//! here (adding or removing songs from a playlist) are visible to the very
//! next lookup, which is what next/previous boundary decisions rely on.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// Song identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub String);

/// Playlist identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl SongId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SongId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A playable song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    /// Location handed to the audio engine
    pub url: String,
    /// Known length, used by the simulated engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Song {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: SongId::new(id),
            name: String::new(),
            artist: String::new(),
            url: url.into(),
            duration_ms: None,
        }
    }
}

/// An ordered list of songs; the same song may appear more than once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub song_ids: Vec<SongId>,
}

impl Playlist {
    pub fn new<I, S>(id: impl Into<String>, song_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: PlaylistId::new(id),
            name: String::new(),
            song_ids: song_ids.into_iter().map(SongId::new).collect(),
        }
    }
}

/// Read-only lookups the playback coordinator depends on
pub trait Directory: Send + Sync {
    /// Song metadata by id
    fn get_song_with_id(&self, song_id: &SongId) -> Result<Song>;

    /// Ordered song ids of a playlist (may be empty)
    fn get_playlist_song_ids(&self, playlist_id: &PlaylistId) -> Result<Vec<SongId>>;
}

/// On-disk shape of a library file
#[derive(Debug, Default, Deserialize, Serialize)]
struct LibraryFile {
    #[serde(default)]
    songs: Vec<Song>,
    #[serde(default)]
    playlists: Vec<Playlist>,
}

#[derive(Debug, Default)]
struct LibraryInner {
    songs: HashMap<SongId, Song>,
    playlists: HashMap<PlaylistId, Playlist>,
}

/// In-memory song and playlist store
///
/// Uses std RwLock: every access is a short synchronous map operation.
#[derive(Debug, Default)]
pub struct Library {
    inner: RwLock<LibraryInner>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from TOML text (`[[songs]]` and `[[playlists]]` tables)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: LibraryFile = toml::from_str(content)?;
        let library = Self::new();
        for song in file.songs {
            if library.read()?.songs.contains_key(&song.id) {
                return Err(Error::InvalidInput(format!("duplicate song id {}", song.id)));
            }
            library.upsert_song(song)?;
        }
        for playlist in file.playlists {
            library.upsert_playlist(playlist)?;
        }
        Ok(library)
    }

    /// Load a library file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let library = Self::from_toml_str(&content)?;
        info!(
            "Loaded library from {}: {} songs, {} playlists",
            path.display(),
            library.song_count(),
            library.playlist_count()
        );
        Ok(library)
    }

    pub fn upsert_song(&self, song: Song) -> Result<()> {
        let mut inner = self.write()?;
        debug!("Library: upsert song {}", song.id);
        inner.songs.insert(song.id.clone(), song);
        Ok(())
    }

    pub fn upsert_playlist(&self, playlist: Playlist) -> Result<()> {
        let mut inner = self.write()?;
        debug!("Library: upsert playlist {}", playlist.id);
        inner.playlists.insert(playlist.id.clone(), playlist);
        Ok(())
    }

    /// Append a song to the end of a playlist
    pub fn add_song_to_playlist(&self, playlist_id: &PlaylistId, song_id: SongId) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.songs.contains_key(&song_id) {
            return Err(Error::NotFound(format!("song {}", song_id)));
        }
        let playlist = inner
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| Error::NotFound(format!("playlist {}", playlist_id)))?;
        playlist.song_ids.push(song_id);
        Ok(())
    }

    /// Remove every occurrence of a song from a playlist
    ///
    /// Returns how many entries were removed.
    pub fn remove_song_from_playlist(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
    ) -> Result<usize> {
        let mut inner = self.write()?;
        let playlist = inner
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| Error::NotFound(format!("playlist {}", playlist_id)))?;
        let before = playlist.song_ids.len();
        playlist.song_ids.retain(|id| id != song_id);
        Ok(before - playlist.song_ids.len())
    }

    pub fn playlist(&self, playlist_id: &PlaylistId) -> Result<Playlist> {
        self.read()?
            .playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("playlist {}", playlist_id)))
    }

    pub fn song_count(&self) -> usize {
        self.read().map(|inner| inner.songs.len()).unwrap_or(0)
    }

    pub fn playlist_count(&self) -> usize {
        self.read().map(|inner| inner.playlists.len()).unwrap_or(0)
    }

    /// Known durations keyed by URL, for engines that cannot probe files
    pub fn durations_by_url(&self) -> HashMap<String, u64> {
        self.read()
            .map(|inner| {
                inner
                    .songs
                    .values()
                    .filter_map(|song| song.duration_ms.map(|d| (song.url.clone(), d)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LibraryInner>> {
        self.inner
            .read()
            .map_err(|_| Error::Internal("library lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, LibraryInner>> {
        self.inner
            .write()
            .map_err(|_| Error::Internal("library lock poisoned".to_string()))
    }
}

impl Directory for Library {
    fn get_song_with_id(&self, song_id: &SongId) -> Result<Song> {
        self.read()?
            .songs
            .get(song_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("song {}", song_id)))
    }

    fn get_playlist_song_ids(&self, playlist_id: &PlaylistId) -> Result<Vec<SongId>> {
        Ok(self.playlist(playlist_id)?.song_ids)
    }
}
