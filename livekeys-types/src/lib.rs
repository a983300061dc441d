//! # livekeys-types
//!
//! Shared type definitions for the livekeys workspace: MIDI lookup tables,
//! note ranges, keyboard shortcut layouts and participant presence. Used by
//! livekeys-audio, livekeys-net and livekeys-core.

pub mod midi;
pub mod presence;
pub mod shortcuts;

pub use midi::{MidiError, MidiNumber, NoteRange, RangeError};
pub use presence::{
    soundfont_instrument, NoteSet, ParticipantNoteState, Presence, PresencePatch, RosterEntry,
    UserInfo, DEFAULT_INSTRUMENT,
};
pub use shortcuts::{KeyboardLayout, KeyboardShortcutMap, ShortcutLayout};

/// Identifier the presence channel assigns to each connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
