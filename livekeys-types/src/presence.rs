//! Participant presence: what each player is sounding and with which instrument.

use serde::{Deserialize, Serialize};

use crate::midi::MidiNumber;
use crate::ConnectionId;

/// Instrument used when a participant has not chosen one.
pub const DEFAULT_INSTRUMENT: &str = "piano";

/// Display name → soundfont instrument name.
pub const INSTRUMENTS: [(&str, &str); 10] = [
    ("piano", "acoustic_grand_piano"),
    ("fiddle", "fiddle"),
    ("choir", "choir_aahs"),
    ("organ", "reed_organ"),
    ("guitar", "electric_guitar_clean"),
    ("synth", "lead_2_sawtooth"),
    ("steelpan", "steel_drums"),
    ("marimba", "marimba"),
    ("trumpet", "muted_trumpet"),
    ("piccolo", "piccolo"),
];

/// Soundfont name for a display name. Unknown names pass through unchanged
/// so raw soundfont names also work.
pub fn soundfont_instrument(display_name: &str) -> &str {
    INSTRUMENTS
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|&(_, sf)| sf)
        .unwrap_or(display_name)
}

pub fn instrument_names() -> impl Iterator<Item = &'static str> {
    INSTRUMENTS.iter().map(|&(name, _)| name)
}

/// Notes held by one participant, in press order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteSet(Vec<MidiNumber>);

impl NoteSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `midi` if absent. Returns true if it was added.
    pub fn insert(&mut self, midi: MidiNumber) -> bool {
        if self.0.contains(&midi) {
            return false;
        }
        self.0.push(midi);
        true
    }

    /// Returns true if `midi` was present.
    pub fn remove(&mut self, midi: MidiNumber) -> bool {
        let before = self.0.len();
        self.0.retain(|&n| n != midi);
        self.0.len() != before
    }

    pub fn contains(&self, midi: MidiNumber) -> bool {
        self.0.contains(&midi)
    }

    pub fn iter(&self) -> impl Iterator<Item = MidiNumber> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[MidiNumber] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<MidiNumber> for NoteSet {
    fn from_iter<I: IntoIterator<Item = MidiNumber>>(iter: I) -> Self {
        let mut set = NoteSet::new();
        for midi in iter {
            set.insert(midi);
        }
        set
    }
}

/// One participant's state as seen by the renderer and the audio lanes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantNoteState {
    pub id: ConnectionId,
    pub instrument: String,
    pub notes: NoteSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ParticipantNoteState {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            instrument: DEFAULT_INSTRUMENT.to_string(),
            notes: NoteSet::new(),
            color: None,
            name: None,
        }
    }
}

/// Identity metadata assigned by the authorization endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub picture: String,
}

/// Broadcast presence fields. Either may be absent for a participant that
/// has joined but not yet published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<NoteSet>,
}

impl Presence {
    pub fn apply(&mut self, patch: PresencePatch) {
        if let Some(instrument) = patch.instrument {
            self.instrument = Some(instrument);
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
    }
}

/// Partial presence update published by the local participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<NoteSet>,
}

impl PresencePatch {
    pub fn notes(notes: NoteSet) -> Self {
        Self {
            instrument: None,
            notes: Some(notes),
        }
    }

    pub fn instrument(name: impl Into<String>) -> Self {
        Self {
            instrument: Some(name.into()),
            notes: None,
        }
    }
}

/// A remote participant as delivered by the presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub connection_id: ConnectionId,
    pub info: UserInfo,
    #[serde(default)]
    pub presence: Option<Presence>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(n: u8) -> MidiNumber {
        MidiNumber::new(n).unwrap()
    }

    #[test]
    fn note_set_keeps_press_order_without_duplicates() {
        let mut set = NoteSet::new();
        assert!(set.insert(m(64)));
        assert!(set.insert(m(60)));
        assert!(!set.insert(m(64)));
        assert_eq!(set.as_slice(), &[m(64), m(60)]);
        assert!(set.remove(m(64)));
        assert!(!set.remove(m(64)));
        assert_eq!(set.as_slice(), &[m(60)]);
    }

    #[test]
    fn soundfont_lookup() {
        assert_eq!(soundfont_instrument("piano"), "acoustic_grand_piano");
        assert_eq!(soundfont_instrument("organ"), "reed_organ");
        assert_eq!(soundfont_instrument("xylophone"), "xylophone");
        assert_eq!(instrument_names().count(), 10);
    }

    #[test]
    fn patch_merges_field_wise() {
        let mut presence = Presence::default();
        presence.apply(PresencePatch::instrument("organ"));
        presence.apply(PresencePatch::notes([m(60)].into_iter().collect()));
        presence.apply(PresencePatch::default());
        assert_eq!(presence.instrument.as_deref(), Some("organ"));
        assert_eq!(presence.notes.as_ref().map(|n| n.len()), Some(1));
    }

    #[test]
    fn roster_entry_without_presence_deserializes() {
        let json = r##"{"connection_id":3,"info":{"name":"Quinn Elton","color":"#22d3ee"}}"##;
        let entry: RosterEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.connection_id, ConnectionId::new(3));
        assert!(entry.presence.is_none());
        assert_eq!(entry.info.picture, "");
    }
}
