//! Boundary classification of a song within its playlist

use tapedeck_common::SongId;

/// Where a song sits in a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    /// Playlist empty or song absent
    NotFound,
    AtTheBeginning,
    AtTheEnd,
    InTheMiddle,
}

/// Classification plus the index it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SongPosition {
    pub state: PositionState,
    /// None when not found
    pub index: Option<usize>,
}

impl SongPosition {
    fn at(state: PositionState, index: usize) -> Self {
        Self {
            state,
            index: Some(index),
        }
    }

    fn not_found() -> Self {
        Self {
            state: PositionState::NotFound,
            index: None,
        }
    }
}

/// Classify the first occurrence of `song_id` in `song_ids`
///
/// Index 0 wins over "last", so a one-song playlist is `AtTheBeginning`.
pub fn classify(song_id: &SongId, song_ids: &[SongId]) -> SongPosition {
    if song_ids.is_empty() {
        return SongPosition::not_found();
    }

    let Some(index) = song_ids.iter().position(|id| id == song_id) else {
        return SongPosition::not_found();
    };

    if index == 0 {
        SongPosition::at(PositionState::AtTheBeginning, index)
    } else if index == song_ids.len() - 1 {
        SongPosition::at(PositionState::AtTheEnd, index)
    } else {
        SongPosition::at(PositionState::InTheMiddle, index)
    }
}
