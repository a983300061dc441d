//! Which participant's color each sounding key shows.

use std::collections::HashMap;

use livekeys_types::{ConnectionId, MidiNumber};

use crate::presence::ActiveNoteSnapshot;

/// Tracks when each participant started holding each pitch. A key shows the
/// color of its most recent holder.
#[derive(Debug, Default)]
pub struct KeyHighlights {
    started: HashMap<(ConnectionId, MidiNumber), u64>,
    owners: HashMap<MidiNumber, (ConnectionId, Option<String>)>,
    next_seq: u64,
}

impl KeyHighlights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: &ActiveNoteSnapshot) {
        let mut still_held = HashMap::with_capacity(self.started.len());
        for participant in snapshot.iter() {
            for midi in participant.notes.iter() {
                let key = (participant.id, midi);
                let seq = match self.started.get(&key) {
                    Some(&seq) => seq,
                    None => {
                        self.next_seq += 1;
                        self.next_seq
                    }
                };
                still_held.insert(key, seq);
            }
        }
        self.started = still_held;

        let mut newest: HashMap<MidiNumber, (u64, ConnectionId)> = HashMap::new();
        for (&(id, midi), &seq) in &self.started {
            let entry = newest.entry(midi).or_insert((seq, id));
            if seq > entry.0 {
                *entry = (seq, id);
            }
        }

        self.owners = newest
            .into_iter()
            .map(|(midi, (_, id))| {
                let color = snapshot.get(id).and_then(|p| p.color.clone());
                (midi, (id, color))
            })
            .collect();
    }

    /// Participant whose color `midi` shows.
    pub fn owner(&self, midi: MidiNumber) -> Option<ConnectionId> {
        self.owners.get(&midi).map(|(id, _)| *id)
    }

    pub fn color(&self, midi: MidiNumber) -> Option<&str> {
        self.owners.get(&midi).and_then(|(_, color)| color.as_deref())
    }

    pub fn is_active(&self, midi: MidiNumber) -> bool {
        self.owners.contains_key(&midi)
    }

    /// Union of every participant's notes, ascending.
    pub fn active_notes(&self) -> Vec<MidiNumber> {
        let mut notes: Vec<MidiNumber> = self.owners.keys().copied().collect();
        notes.sort();
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::merge;
    use livekeys_types::{NoteSet, ParticipantNoteState, Presence, RosterEntry, UserInfo};

    fn m(n: u8) -> MidiNumber {
        MidiNumber::new(n).unwrap()
    }

    fn remote(id: u64, color: &str, notes: &[u8]) -> RosterEntry {
        RosterEntry {
            connection_id: ConnectionId::new(id),
            info: UserInfo {
                name: format!("p{}", id),
                color: color.to_string(),
                picture: String::new(),
            },
            presence: Some(Presence {
                instrument: None,
                notes: Some(notes.iter().map(|&n| m(n)).collect::<NoteSet>()),
            }),
        }
    }

    fn local() -> ParticipantNoteState {
        let mut local = ParticipantNoteState::new(ConnectionId::new(1));
        local.color = Some("#local".into());
        local
    }

    #[test]
    fn latest_presser_owns_the_color() {
        let mut hl = KeyHighlights::new();
        hl.update(&merge(&local(), &[remote(2, "#aa", &[64]), remote(3, "#bb", &[])]));
        assert_eq!(hl.color(m(64)), Some("#aa"));

        hl.update(&merge(&local(), &[remote(2, "#aa", &[64]), remote(3, "#bb", &[64])]));
        assert_eq!(hl.color(m(64)), Some("#bb"));
        assert_eq!(hl.active_notes(), vec![m(64)]);
    }

    #[test]
    fn ownership_falls_back_when_owner_releases() {
        let mut hl = KeyHighlights::new();
        hl.update(&merge(&local(), &[remote(2, "#aa", &[64])]));
        hl.update(&merge(&local(), &[remote(2, "#aa", &[64]), remote(3, "#bb", &[64])]));
        hl.update(&merge(&local(), &[remote(2, "#aa", &[64]), remote(3, "#bb", &[])]));
        assert_eq!(hl.owner(m(64)), Some(ConnectionId::new(2)));

        hl.update(&merge(&local(), &[remote(2, "#aa", &[]), remote(3, "#bb", &[])]));
        assert!(!hl.is_active(m(64)));
        assert_eq!(hl.color(m(64)), None);
    }

    #[test]
    fn repress_takes_ownership_back() {
        let mut hl = KeyHighlights::new();
        hl.update(&merge(&local(), &[remote(2, "#aa", &[60])]));
        hl.update(&merge(&local(), &[remote(2, "#aa", &[60]), remote(3, "#bb", &[60])]));
        hl.update(&merge(&local(), &[remote(2, "#aa", &[]), remote(3, "#bb", &[60])]));
        hl.update(&merge(&local(), &[remote(2, "#aa", &[60]), remote(3, "#bb", &[60])]));
        assert_eq!(hl.color(m(60)), Some("#aa"));
    }
}
