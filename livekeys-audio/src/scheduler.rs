//! Per-participant note playback.

use std::rc::Rc;
use std::sync::Arc;

use livekeys_types::MidiNumber;

use crate::backend::AudioBackend;
use crate::loader::{InstrumentHandle, InstrumentLoader};
use crate::soundfont::LoadError;
use crate::voices::VoiceRegistry;

/// Turns note-on/off into backend voices for one participant. Owns that
/// participant's instrument loader; the backend is shared by every lane.
pub struct NoteScheduler {
    backend: Rc<dyn AudioBackend>,
    loader: InstrumentLoader,
    voices: VoiceRegistry,
}

impl NoteScheduler {
    pub fn new(backend: Rc<dyn AudioBackend>, loader: InstrumentLoader) -> Self {
        Self {
            backend,
            loader,
            voices: VoiceRegistry::new(),
        }
    }

    /// Switch instrument. Voices already sounding keep their samples until
    /// stopped.
    pub fn set_instrument(&mut self, name: &str) -> bool {
        self.loader.load(name)
    }

    /// Drive the loader. Returns true if an instrument became ready.
    pub fn poll(&mut self) -> bool {
        self.loader.poll()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn is_ready(&self) -> bool {
        self.loader.is_ready()
    }

    pub fn is_fetching(&self) -> bool {
        self.loader.is_fetching()
    }

    /// Why the last requested instrument failed to load, if it did.
    pub fn load_error(&self) -> Option<&LoadError> {
        self.loader.last_error()
    }

    pub fn instrument(&self) -> Option<&Arc<InstrumentHandle>> {
        self.loader.handle()
    }

    /// Start `midi`, replacing any voice already sounding at that pitch.
    /// Dropped when no instrument is ready or it lacks a sample for `midi`.
    pub fn play_note(&mut self, midi: MidiNumber) -> bool {
        let Some(handle) = self.loader.handle() else {
            log::debug!(
                target: "audio::scheduler",
                "Dropping note {}: instrument not ready",
                midi.note_name()
            );
            return false;
        };
        let Some(sample) = handle.sample(midi) else {
            log::debug!(
                target: "audio::scheduler",
                "No {} sample for {}",
                handle.name(),
                midi.sample_name()
            );
            return false;
        };

        if self.backend.is_suspended() {
            if let Err(e) = self.backend.resume() {
                log::warn!(target: "audio::scheduler", "Cannot resume output: {}", e);
            }
        }

        if let Some(previous) = self.voices.unregister(midi) {
            if let Err(e) = self.backend.stop_voice(previous) {
                log::warn!(target: "audio::scheduler", "stop_voice failed: {}", e);
            }
        }

        match self.backend.start_voice(sample) {
            Ok(voice) => {
                self.voices.register(midi, voice);
                true
            }
            Err(e) => {
                log::warn!(
                    target: "audio::scheduler",
                    "Cannot start {}: {}",
                    midi.note_name(),
                    e
                );
                false
            }
        }
    }

    /// Stop `midi` if it is sounding.
    pub fn stop_note(&mut self, midi: MidiNumber) -> bool {
        let Some(voice) = self.voices.unregister(midi) else {
            return false;
        };
        if let Err(e) = self.backend.stop_voice(voice) {
            log::warn!(target: "audio::scheduler", "stop_voice failed: {}", e);
        }
        true
    }

    pub fn stop_all_notes(&mut self) {
        for (_, voice) in self.voices.drain() {
            if let Err(e) = self.backend.stop_voice(voice) {
                log::warn!(target: "audio::scheduler", "stop_voice failed: {}", e);
            }
        }
    }

    /// Pitches with a registered voice, ascending.
    pub fn sounding_notes(&self) -> Vec<MidiNumber> {
        self.voices.notes()
    }
}

impl Drop for NoteScheduler {
    fn drop(&mut self) {
        self.stop_all_notes();
    }
}
