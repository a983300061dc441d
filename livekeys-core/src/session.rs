//! The local participant's presence and the channel it is published on.

use std::cell::RefCell;
use std::rc::Rc;

use livekeys_net::PresenceClient;
use livekeys_types::{
    ConnectionId, NoteSet, ParticipantNoteState, PresencePatch, RosterEntry, UserInfo,
};

use crate::interaction::NoteIntent;
use crate::presence::{merge, ActiveNoteSnapshot};

/// Transport for presence: publishes local patches, delivers remote rosters.
pub trait PresenceChannel {
    fn update_local_state(&mut self, patch: PresencePatch) -> Result<(), String>;

    /// Newest roster of the other participants, if it changed since the last call.
    fn poll_roster(&mut self) -> Option<Vec<RosterEntry>>;

    fn connection_id(&self) -> ConnectionId;

    /// Identity assigned by the authorization endpoint, if any.
    fn local_info(&self) -> Option<UserInfo>;

    /// The remote end went away; no more rosters will arrive.
    fn is_closed(&self) -> bool;
}

impl PresenceChannel for PresenceClient {
    fn update_local_state(&mut self, patch: PresencePatch) -> Result<(), String> {
        PresenceClient::update_local_state(self, patch).map_err(|e| e.to_string())
    }

    fn poll_roster(&mut self) -> Option<Vec<RosterEntry>> {
        PresenceClient::poll_roster(self)
    }

    fn connection_id(&self) -> ConnectionId {
        PresenceClient::connection_id(self)
    }

    fn local_info(&self) -> Option<UserInfo> {
        Some(self.info().clone())
    }

    fn is_closed(&self) -> bool {
        self.server_shutdown()
    }
}

#[derive(Default)]
struct OfflineState {
    published: Vec<PresencePatch>,
    pending_roster: Option<Vec<RosterEntry>>,
    closed: bool,
}

/// In-process channel for solo play. Clones share state, so a test can keep
/// one to inspect what was published and inject rosters.
#[derive(Clone)]
pub struct OfflineChannel {
    id: ConnectionId,
    info: Option<UserInfo>,
    state: Rc<RefCell<OfflineState>>,
}

impl OfflineChannel {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            info: None,
            state: Rc::new(RefCell::new(OfflineState::default())),
        }
    }

    pub fn with_info(mut self, info: UserInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Deliver `roster` on the next poll.
    pub fn push_roster(&self, roster: Vec<RosterEntry>) {
        self.state.borrow_mut().pending_roster = Some(roster);
    }

    /// Simulate the remote end going away.
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    pub fn published(&self) -> Vec<PresencePatch> {
        self.state.borrow().published.clone()
    }
}

impl PresenceChannel for OfflineChannel {
    fn update_local_state(&mut self, patch: PresencePatch) -> Result<(), String> {
        self.state.borrow_mut().published.push(patch);
        Ok(())
    }

    fn poll_roster(&mut self) -> Option<Vec<RosterEntry>> {
        self.state.borrow_mut().pending_roster.take()
    }

    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn local_info(&self) -> Option<UserInfo> {
        self.info.clone()
    }

    fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

/// Owns the local participant's state. Only note intents and instrument
/// changes mutate it; remote entries are replaced wholesale on each poll.
pub struct LocalSession {
    channel: Box<dyn PresenceChannel>,
    local: ParticipantNoteState,
    roster: Vec<RosterEntry>,
    closed: bool,
}

impl LocalSession {
    /// Start a session and publish `{instrument, notes: []}`.
    pub fn start(channel: Box<dyn PresenceChannel>, instrument: &str) -> Self {
        let mut local = ParticipantNoteState::new(channel.connection_id());
        local.instrument = instrument.to_string();
        if let Some(info) = channel.local_info() {
            local.color = Some(info.color);
            local.name = Some(info.name);
        }

        let mut session = Self {
            channel,
            local,
            roster: Vec::new(),
            closed: false,
        };
        session.publish(PresencePatch {
            instrument: Some(session.local.instrument.clone()),
            notes: Some(NoteSet::new()),
        });
        session
    }

    /// Apply a note intent on top of the active set it was produced from.
    /// Returns true if the local notes changed.
    pub fn apply(&mut self, intent: &NoteIntent) -> bool {
        let mut notes = intent.prev_active().clone();
        match intent {
            NoteIntent::On { midi, .. } => {
                notes.insert(*midi);
            }
            NoteIntent::Off { midi, .. } => {
                notes.remove(*midi);
            }
        }
        if notes == self.local.notes {
            return false;
        }
        self.local.notes = notes;
        self.publish(PresencePatch::notes(self.local.notes.clone()));
        true
    }

    pub fn set_instrument(&mut self, name: &str) -> bool {
        if self.local.instrument == name {
            return false;
        }
        self.local.instrument = name.to_string();
        log::info!(target: "core::session", "Instrument -> {}", name);
        self.publish(PresencePatch::instrument(name));
        true
    }

    /// Pick up a new remote roster. Returns true if one arrived, or if the
    /// channel just closed and the remote participants were dropped.
    pub fn poll(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let roster = self.channel.poll_roster();
        if self.channel.is_closed() {
            log::warn!(
                target: "core::session",
                "Presence channel closed, dropping {} remote participants",
                self.roster.len()
            );
            self.closed = true;
            self.roster.clear();
            return true;
        }
        match roster {
            Some(roster) => {
                self.roster = roster;
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.local.id
    }

    pub fn local(&self) -> &ParticipantNoteState {
        &self.local
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn snapshot(&self) -> ActiveNoteSnapshot {
        merge(&self.local, &self.roster)
    }

    fn publish(&mut self, patch: PresencePatch) {
        if self.closed {
            return;
        }
        if let Err(e) = self.channel.update_local_state(patch) {
            log::warn!(target: "core::session", "Presence update failed: {}", e);
        }
    }
}
