use std::collections::HashMap;

use livekeys_types::MidiNumber;

use crate::backend::VoiceId;

/// Tracks which backend voice is sounding for each pitch. At most one voice
/// per MIDI number.
pub struct VoiceRegistry {
    voices: HashMap<MidiNumber, VoiceId>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self {
            voices: HashMap::new(),
        }
    }

    /// Record a voice for `midi`, returning the voice it replaces.
    pub fn register(&mut self, midi: MidiNumber, voice: VoiceId) -> Option<VoiceId> {
        self.voices.insert(midi, voice)
    }

    pub fn unregister(&mut self, midi: MidiNumber) -> Option<VoiceId> {
        self.voices.remove(&midi)
    }

    /// Remove and return every registered voice.
    pub fn drain(&mut self) -> Vec<(MidiNumber, VoiceId)> {
        self.voices.drain().collect()
    }

    /// Sounding pitches, ascending.
    pub fn notes(&self) -> Vec<MidiNumber> {
        let mut notes: Vec<_> = self.voices.keys().copied().collect();
        notes.sort();
        notes
    }
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
