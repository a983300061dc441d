//! Merge local and remote presence into one snapshot per update.

use serde::Serialize;

use livekeys_types::{
    ConnectionId, ParticipantNoteState, RosterEntry, DEFAULT_INSTRUMENT,
};

/// Everyone currently able to sound notes. The local participant is always
/// first; remotes follow in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActiveNoteSnapshot {
    participants: Vec<ParticipantNoteState>,
}

impl ActiveNoteSnapshot {
    pub fn participants(&self) -> &[ParticipantNoteState] {
        &self.participants
    }

    pub fn local(&self) -> Option<&ParticipantNoteState> {
        self.participants.first()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ParticipantNoteState> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantNoteState> {
        self.participants.iter()
    }
}

/// Build a fresh snapshot. Remote entries that have not published notes are
/// left out, as is any echo of the local connection. Participants sharing a
/// user identity across connections are kept apart.
pub fn merge(local: &ParticipantNoteState, roster: &[RosterEntry]) -> ActiveNoteSnapshot {
    let mut participants = Vec::with_capacity(roster.len() + 1);
    participants.push(ParticipantNoteState {
        id: local.id,
        instrument: instrument_or_default(Some(&local.instrument)),
        notes: local.notes.clone(),
        color: local.color.clone(),
        name: local.name.clone(),
    });

    for entry in roster {
        if entry.connection_id == local.id {
            continue;
        }
        let Some(presence) = entry.presence.as_ref() else {
            continue;
        };
        let Some(notes) = presence.notes.as_ref() else {
            continue;
        };
        participants.push(ParticipantNoteState {
            id: entry.connection_id,
            instrument: instrument_or_default(presence.instrument.as_deref()),
            notes: notes.clone(),
            color: Some(entry.info.color.clone()),
            name: Some(entry.info.name.clone()),
        });
    }

    ActiveNoteSnapshot { participants }
}

fn instrument_or_default(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => DEFAULT_INSTRUMENT.to_string(),
    }
}
