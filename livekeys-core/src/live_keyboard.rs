//! The playable multi-participant keyboard.
//!
//! Input flows through the interaction controller into the local session,
//! which publishes it. Every tick the session's snapshot (local plus remote
//! participants) is fanned out to one audio lane per participant and to the
//! key highlights that the front-end draws.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use livekeys_audio::{AudioBackend, InstrumentLoader, LoaderSettings, NoteScheduler, SampleSource};
use livekeys_types::{
    ConnectionId, KeyboardLayout, MidiNumber, NoteRange, NoteSet, ParticipantNoteState,
};

use crate::geometry::{KeyRect, KeyboardGeometry};
use crate::highlights::KeyHighlights;
use crate::interaction::{InputEvent, KeyInteractionController, NoteIntent};
use crate::key_range::{DeviceClass, KeyRangeConfig, KeyRangeSettings};
use crate::presence::ActiveNoteSnapshot;
use crate::session::LocalSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connected,
    Offline,
    /// The authorization endpoint has no secret. Input is disabled.
    SetupRequired,
}

/// Builds the scheduler for a new participant lane. All lanes share one
/// backend.
pub struct LaneFactory {
    backend: Rc<dyn AudioBackend>,
    source: Arc<dyn SampleSource>,
    settings: LoaderSettings,
}

impl LaneFactory {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        source: Arc<dyn SampleSource>,
        settings: LoaderSettings,
    ) -> Self {
        Self {
            backend,
            source,
            settings,
        }
    }

    fn scheduler(&self) -> NoteScheduler {
        let loader = InstrumentLoader::new(Arc::clone(&self.source), self.settings.clone());
        NoteScheduler::new(Rc::clone(&self.backend), loader)
    }
}

/// One participant's audio.
struct Lane {
    scheduler: NoteScheduler,
    instrument: String,
    notes: NoteSet,
}

impl Lane {
    fn sync(&mut self, participant: &ParticipantNoteState) {
        if self.instrument != participant.instrument {
            self.instrument = participant.instrument.clone();
            self.scheduler.set_instrument(&self.instrument);
        }
        for midi in self.notes.iter() {
            if !participant.notes.contains(midi) {
                self.scheduler.stop_note(midi);
            }
        }
        for midi in participant.notes.iter() {
            if !self.notes.contains(midi) {
                self.scheduler.play_note(midi);
            }
        }
        self.notes = participant.notes.clone();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyView {
    pub midi: MidiNumber,
    pub accidental: bool,
    pub active: bool,
    pub color: Option<String>,
    /// Shortcut character, if the key has one.
    pub label: Option<char>,
    pub rect: KeyRect,
}

/// Everything the front-end needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardFrame {
    pub keys: Vec<KeyView>,
    pub range: NoteRange,
    pub piano_width: u32,
    pub device: DeviceClass,
    /// No instrument ready yet for some participant, including after a
    /// failed fetch.
    pub loading: bool,
    /// Why the local instrument failed to load.
    pub load_error: Option<String>,
    pub offline: bool,
    pub setup_required: bool,
    pub disabled: bool,
    pub participants: Vec<ParticipantNoteState>,
}

pub struct LiveKeyboard {
    range_config: KeyRangeConfig,
    geometry: KeyboardGeometry,
    controller: KeyInteractionController,
    session: LocalSession,
    lane_factory: LaneFactory,
    lanes: HashMap<ConnectionId, Lane>,
    snapshot: ActiveNoteSnapshot,
    highlights: KeyHighlights,
    status: SessionStatus,
}

impl LiveKeyboard {
    pub fn new(
        session: LocalSession,
        lane_factory: LaneFactory,
        range_settings: KeyRangeSettings,
        layout: KeyboardLayout,
        viewport_width: u32,
    ) -> Self {
        let range_config = KeyRangeConfig::new(range_settings, viewport_width);
        let geometry =
            KeyboardGeometry::new(range_config.range(), range_config.piano_width() as f32);
        let controller = KeyInteractionController::new(
            range_config.range(),
            range_config.shortcuts().clone(),
            layout,
        );

        let mut keyboard = Self {
            range_config,
            geometry,
            controller,
            session,
            lane_factory,
            lanes: HashMap::new(),
            snapshot: ActiveNoteSnapshot::default(),
            highlights: KeyHighlights::new(),
            status: SessionStatus::Connected,
        };
        keyboard.refresh();
        keyboard
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        if self.status == status {
            return;
        }
        log::info!(target: "core::live_keyboard", "Session status {:?}", status);
        self.status = status;
        let disabled = status == SessionStatus::SetupRequired;
        self.controller.set_disabled(disabled);
        if disabled {
            let released = self.controller.release_all();
            self.apply_intents(&released);
        }
        self.refresh();
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Feed one input event. Returns the intents it produced.
    pub fn handle_input(&mut self, event: InputEvent) -> Vec<NoteIntent> {
        let intents = self.controller.handle(event);
        if !intents.is_empty() {
            self.apply_intents(&intents);
            self.refresh();
        }
        intents
    }

    /// Key under a point in piano pixel coordinates.
    pub fn key_at(&self, x: f32, y: f32) -> Option<MidiNumber> {
        self.geometry.hit_test(x, y)
    }

    pub fn set_instrument(&mut self, name: &str) {
        if self.session.set_instrument(name) {
            self.refresh();
        }
    }

    pub fn instrument(&self) -> &str {
        &self.session.local().instrument
    }

    /// Re-evaluate the note window. When the device class changes, keys that
    /// fall outside the new range are released.
    pub fn set_viewport_width(&mut self, width: u32) -> Vec<NoteIntent> {
        let changed = self.range_config.update(width);
        self.geometry = KeyboardGeometry::new(
            self.range_config.range(),
            self.range_config.piano_width() as f32,
        );
        if !changed {
            return Vec::new();
        }
        let released = self.controller.set_range(
            self.range_config.range(),
            self.range_config.shortcuts().clone(),
        );
        self.apply_intents(&released);
        self.refresh();
        released
    }

    /// Poll the presence channel and instrument loaders. Returns true if
    /// anything visible changed. A closed channel drops every remote
    /// participant and leaves the keyboard offline.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        for lane in self.lanes.values_mut() {
            let was_fetching = lane.scheduler.is_fetching();
            lane.scheduler.poll();
            changed |= was_fetching != lane.scheduler.is_fetching();
        }
        let was_closed = self.session.is_closed();
        if self.session.poll() {
            self.refresh();
            changed = true;
        }
        if !was_closed && self.session.is_closed() {
            self.set_status(SessionStatus::Offline);
        }
        changed
    }

    /// True until every participant's instrument is ready.
    pub fn is_loading(&self) -> bool {
        self.lanes.values().any(|lane| lane.scheduler.is_loading())
    }

    fn local_load_error(&self) -> Option<String> {
        self.lanes
            .get(&self.session.connection_id())
            .and_then(|lane| lane.scheduler.load_error())
            .map(|e| e.to_string())
    }

    pub fn snapshot(&self) -> &ActiveNoteSnapshot {
        &self.snapshot
    }

    pub fn session(&self) -> &LocalSession {
        &self.session
    }

    /// Pitches the lane for `id` currently has voices for.
    pub fn lane_sounding(&self, id: ConnectionId) -> Vec<MidiNumber> {
        self.lanes
            .get(&id)
            .map(|lane| lane.scheduler.sounding_notes())
            .unwrap_or_default()
    }

    /// Instrument whose samples the lane for `id` currently plays.
    pub fn lane_instrument(&self, id: ConnectionId) -> Option<&str> {
        self.lanes
            .get(&id)
            .and_then(|lane| lane.scheduler.instrument())
            .map(|handle| handle.name())
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn frame(&self) -> KeyboardFrame {
        let disabled = self.controller.is_disabled();
        let shortcuts = self.range_config.shortcuts();
        let keys = self
            .geometry
            .keys()
            .iter()
            .map(|rect| {
                let active = !disabled && self.highlights.is_active(rect.midi);
                KeyView {
                    midi: rect.midi,
                    accidental: rect.accidental,
                    active,
                    color: if active {
                        self.highlights.color(rect.midi).map(str::to_string)
                    } else {
                        None
                    },
                    label: shortcuts.key_for(rect.midi),
                    rect: *rect,
                }
            })
            .collect();

        KeyboardFrame {
            keys,
            range: self.range_config.range(),
            piano_width: self.range_config.piano_width(),
            device: self.range_config.device(),
            loading: self.is_loading(),
            load_error: self.local_load_error(),
            offline: self.status == SessionStatus::Offline,
            setup_required: self.status == SessionStatus::SetupRequired,
            disabled,
            participants: self.snapshot.participants().to_vec(),
        }
    }

    /// Release local keys and silence every lane.
    pub fn shutdown(&mut self) {
        let released = self.controller.release_all();
        self.apply_intents(&released);
        for (_, mut lane) in self.lanes.drain() {
            lane.scheduler.stop_all_notes();
        }
        log::info!(target: "core::live_keyboard", "Keyboard shut down");
    }

    fn apply_intents(&mut self, intents: &[NoteIntent]) {
        for intent in intents {
            self.session.apply(intent);
        }
    }

    fn refresh(&mut self) {
        self.snapshot = self.session.snapshot();
        self.highlights.update(&self.snapshot);
        self.reconcile_lanes();
    }

    fn reconcile_lanes(&mut self) {
        for participant in self.snapshot.iter() {
            let lane = self.lanes.entry(participant.id).or_insert_with(|| {
                log::debug!(
                    target: "core::live_keyboard",
                    "Lane for {} ({})",
                    participant.id,
                    participant.instrument
                );
                let mut scheduler = self.lane_factory.scheduler();
                scheduler.set_instrument(&participant.instrument);
                Lane {
                    scheduler,
                    instrument: participant.instrument.clone(),
                    notes: NoteSet::new(),
                }
            });
            lane.sync(participant);
        }

        let snapshot = &self.snapshot;
        self.lanes.retain(|id, lane| {
            let present = snapshot.get(*id).is_some();
            if !present {
                log::debug!(target: "core::live_keyboard", "Disposing lane for {}", id);
                lane.scheduler.stop_all_notes();
            }
            present
        });
    }
}

impl Drop for LiveKeyboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
