//! MIDI number lookup tables and note ranges.
//!
//! Everything here is derived purely from the MIDI integer: note names,
//! octave, natural/accidental classification, soundfont sample names and
//! the horizontal key offsets used to lay out key shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowest playable MIDI number (C0).
pub const MIN_MIDI_NUMBER: u8 = 12;
/// Highest playable MIDI number (G9).
pub const MAX_MIDI_NUMBER: u8 = 127;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Horizontal position of each pitch class, in natural-key widths from C.
const KEY_OFFSETS: [f32; 12] = [
    0.0, 0.55, 1.0, 1.8, 2.0, 3.0, 3.5, 4.0, 4.7, 5.0, 5.85, 6.0,
];

/// Width of an accidental key relative to a natural key.
pub const ACCIDENTAL_WIDTH_RATIO: f32 = 0.65;

/// Natural keys per octave.
pub const OCTAVE_WIDTH: f32 = 7.0;

/// Error for out-of-range or unparseable notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiError {
    OutOfRange(i32),
    BadNoteName(String),
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiError::OutOfRange(n) => write!(
                f,
                "MIDI number {} outside {}..={}",
                n, MIN_MIDI_NUMBER, MAX_MIDI_NUMBER
            ),
            MidiError::BadNoteName(s) => write!(f, "invalid note name '{}'", s),
        }
    }
}

impl std::error::Error for MidiError {}

/// A MIDI pitch in the playable range.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct MidiNumber(u8);

impl MidiNumber {
    pub fn new(n: u8) -> Result<Self, MidiError> {
        if (MIN_MIDI_NUMBER..=MAX_MIDI_NUMBER).contains(&n) {
            Ok(Self(n))
        } else {
            Err(MidiError::OutOfRange(n as i32))
        }
    }

    /// Parse a note name such as `c4`, `C#3` or `Bb2`.
    pub fn from_note(name: &str) -> Result<Self, MidiError> {
        let bad = || MidiError::BadNoteName(name.to_string());
        let mut chars = name.trim().chars().peekable();

        let letter = chars.next().ok_or_else(bad)?.to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(bad()),
        };

        let accidental = match chars.peek() {
            Some('#') => {
                chars.next();
                1
            }
            Some('b') => {
                chars.next();
                -1
            }
            _ => 0,
        };

        let octave: i32 = chars.collect::<String>().parse().map_err(|_| bad())?;
        let n = (octave + 1) * 12 + base + accidental;
        if !(MIN_MIDI_NUMBER as i32..=MAX_MIDI_NUMBER as i32).contains(&n) {
            return Err(MidiError::OutOfRange(n));
        }
        Ok(Self(n as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn pitch_class(self) -> usize {
        (self.0 % 12) as usize
    }

    pub fn octave(self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    /// Sharp-spelled pitch name without octave, e.g. `C#`.
    pub fn pitch_name(self) -> &'static str {
        SHARP_NAMES[self.pitch_class()]
    }

    /// Sharp-spelled note name, e.g. `C#4`.
    pub fn note_name(self) -> String {
        format!("{}{}", self.pitch_name(), self.octave())
    }

    /// Flat-spelled name used by soundfont sample sets, e.g. `Db4`.
    pub fn sample_name(self) -> String {
        format!("{}{}", FLAT_NAMES[self.pitch_class()], self.octave())
    }

    pub fn is_accidental(self) -> bool {
        matches!(self.pitch_class(), 1 | 3 | 6 | 8 | 10)
    }

    /// Position of the key's left edge in natural-key widths, counted from C0.
    pub fn absolute_key_position(self) -> f32 {
        let octaves_from_c0 = (self.0 - MIN_MIDI_NUMBER) / 12;
        octaves_from_c0 as f32 * OCTAVE_WIDTH + KEY_OFFSETS[self.pitch_class()]
    }
}

impl TryFrom<u8> for MidiNumber {
    type Error = MidiError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<MidiNumber> for u8 {
    fn from(m: MidiNumber) -> u8 {
        m.0
    }
}

impl fmt::Display for MidiNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error constructing a [`NoteRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    AccidentalEndpoint(MidiNumber),
    NotAscending { first: MidiNumber, last: MidiNumber },
    Note(MidiError),
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::AccidentalEndpoint(m) => {
                write!(f, "range endpoint {} is an accidental", m.note_name())
            }
            RangeError::NotAscending { first, last } => write!(
                f,
                "range first {} must be below last {}",
                first.note_name(),
                last.note_name()
            ),
            RangeError::Note(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RangeError {}

impl From<MidiError> for RangeError {
    fn from(e: MidiError) -> Self {
        RangeError::Note(e)
    }
}

/// Visible window of keys. Both endpoints are natural keys and `first < last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    first: MidiNumber,
    last: MidiNumber,
}

impl NoteRange {
    pub fn new(first: MidiNumber, last: MidiNumber) -> Result<Self, RangeError> {
        if first.is_accidental() {
            return Err(RangeError::AccidentalEndpoint(first));
        }
        if last.is_accidental() {
            return Err(RangeError::AccidentalEndpoint(last));
        }
        if first >= last {
            return Err(RangeError::NotAscending { first, last });
        }
        Ok(Self { first, last })
    }

    /// Build from note names, e.g. `NoteRange::from_notes("c3", "b4")`.
    pub fn from_notes(first: &str, last: &str) -> Result<Self, RangeError> {
        Self::new(MidiNumber::from_note(first)?, MidiNumber::from_note(last)?)
    }

    pub fn first(&self) -> MidiNumber {
        self.first
    }

    pub fn last(&self) -> MidiNumber {
        self.last
    }

    pub fn contains(&self, midi: MidiNumber) -> bool {
        self.first <= midi && midi <= self.last
    }

    /// Every MIDI number in the range, ascending.
    pub fn midi_numbers(&self) -> impl Iterator<Item = MidiNumber> {
        (self.first.0..=self.last.0).map(MidiNumber)
    }

    pub fn natural_key_count(&self) -> usize {
        self.midi_numbers().filter(|m| !m.is_accidental()).count()
    }
}
