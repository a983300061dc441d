//! Key rectangles for a note range laid out across a pixel width.

use livekeys_types::midi::ACCIDENTAL_WIDTH_RATIO;
use livekeys_types::{MidiNumber, NoteRange};

/// Accidental key height relative to the keyboard height.
pub const ACCIDENTAL_HEIGHT_RATIO: f32 = 0.65;

/// Natural key width divided by its height.
pub const KEY_WIDTH_TO_HEIGHT: f32 = 0.33;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRect {
    pub midi: MidiNumber,
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub accidental: bool,
}

impl KeyRect {
    fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= 0.0 && y < self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardGeometry {
    range: NoteRange,
    width: f32,
    natural_width: f32,
    height: f32,
    keys: Vec<KeyRect>,
}

impl KeyboardGeometry {
    pub fn new(range: NoteRange, width: f32) -> Self {
        let natural_count = range.natural_key_count().max(1) as f32;
        let natural_width = width / natural_count;
        let height = natural_width / KEY_WIDTH_TO_HEIGHT;
        let origin = range.first().absolute_key_position();

        let keys = range
            .midi_numbers()
            .map(|midi| {
                let accidental = midi.is_accidental();
                let x = (midi.absolute_key_position() - origin) * natural_width;
                if accidental {
                    KeyRect {
                        midi,
                        x,
                        width: natural_width * ACCIDENTAL_WIDTH_RATIO,
                        height: height * ACCIDENTAL_HEIGHT_RATIO,
                        accidental,
                    }
                } else {
                    KeyRect {
                        midi,
                        x,
                        width: natural_width,
                        height,
                        accidental,
                    }
                }
            })
            .collect();

        Self {
            range,
            width,
            natural_width,
            height,
            keys,
        }
    }

    pub fn range(&self) -> NoteRange {
        self.range
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn natural_width(&self) -> f32 {
        self.natural_width
    }

    /// All keys, ascending by MIDI number.
    pub fn keys(&self) -> &[KeyRect] {
        &self.keys
    }

    pub fn key(&self, midi: MidiNumber) -> Option<&KeyRect> {
        self.keys.iter().find(|k| k.midi == midi)
    }

    /// Key under `(x, y)`. Accidentals sit on top of the naturals.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<MidiNumber> {
        self.keys
            .iter()
            .filter(|k| k.accidental)
            .find(|k| k.contains(x, y))
            .or_else(|| self.keys.iter().filter(|k| !k.accidental).find(|k| k.contains(x, y)))
            .map(|k| k.midi)
    }
}
