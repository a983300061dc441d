//! Computer-keyboard shortcuts for piano keys.

use serde::{Deserialize, Serialize};

use crate::midi::{MidiNumber, NoteRange};

/// One physical key column: the natural key char and the char of the key
/// up and to the left of it, which plays the accidental below the natural.
#[derive(Debug, Clone, Copy)]
struct KeyColumn {
    natural: char,
    flat: char,
}

const fn col(natural: char, flat: char) -> KeyColumn {
    KeyColumn { natural, flat }
}

const BOTTOM_ROW: [KeyColumn; 10] = [
    col('z', 'a'),
    col('x', 's'),
    col('c', 'd'),
    col('v', 'f'),
    col('b', 'g'),
    col('n', 'h'),
    col('m', 'j'),
    col(',', 'k'),
    col('.', 'l'),
    col('/', ';'),
];

const HOME_ROW: [KeyColumn; 11] = [
    col('a', 'q'),
    col('s', 'w'),
    col('d', 'e'),
    col('f', 'r'),
    col('g', 't'),
    col('h', 'y'),
    col('j', 'u'),
    col('k', 'i'),
    col('l', 'o'),
    col(';', 'p'),
    col('\'', '['),
];

const QWERTY_ROW: [KeyColumn; 11] = [
    col('q', '1'),
    col('w', '2'),
    col('e', '3'),
    col('r', '4'),
    col('t', '5'),
    col('y', '6'),
    col('u', '7'),
    col('i', '8'),
    col('o', '9'),
    col('p', '0'),
    col('[', '-'),
];

/// Printable keys of the four main rows, left to right, as QWERTY labels them.
/// Shortcut chars always name these physical positions.
const QWERTY_ROWS: [&str; 4] = ["1234567890-=", "qwertyuiop[]", "asdfghjkl;'", "zxcvbnm,./"];

const COLEMAK_ROWS: [&str; 4] = ["1234567890-=", "qwfpgjluy;[]", "arstdhneio'", "zxcvbkm,./"];

/// Character layout of the user's hardware keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardLayout {
    #[default]
    Qwerty,
    Colemak,
}

impl KeyboardLayout {
    fn rows(self) -> &'static [&'static str; 4] {
        match self {
            KeyboardLayout::Qwerty => &QWERTY_ROWS,
            KeyboardLayout::Colemak => &COLEMAK_ROWS,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "qwerty" => Some(KeyboardLayout::Qwerty),
            "colemak" => Some(KeyboardLayout::Colemak),
            _ => None,
        }
    }

    /// The physical key (by its QWERTY label) that types `typed` in this
    /// layout. Chars outside the main rows are returned unchanged.
    pub fn physical_key(self, typed: char) -> char {
        for (row, qwerty) in self.rows().iter().zip(QWERTY_ROWS) {
            if let Some(pos) = row.chars().position(|c| c == typed) {
                return qwerty.chars().nth(pos).unwrap_or(typed);
            }
        }
        typed
    }
}

/// Named row of the computer keyboard used for the natural keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutLayout {
    BottomRow,
    #[default]
    HomeRow,
    QwertyRow,
}

impl ShortcutLayout {
    fn columns(self) -> &'static [KeyColumn] {
        match self {
            ShortcutLayout::BottomRow => &BOTTOM_ROW,
            ShortcutLayout::HomeRow => &HOME_ROW,
            ShortcutLayout::QwertyRow => &QWERTY_ROW,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "bottom_row" | "bottom" => Some(ShortcutLayout::BottomRow),
            "home_row" | "home" => Some(ShortcutLayout::HomeRow),
            "qwerty_row" | "qwerty" => Some(ShortcutLayout::QwertyRow),
            _ => None,
        }
    }
}

/// Ordered key → MIDI number mapping for one note range.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyboardShortcutMap {
    entries: Vec<(char, MidiNumber)>,
}

impl KeyboardShortcutMap {
    /// Walk the range from its first note, giving each natural key the next
    /// column's natural char and each accidental the flat char of the column
    /// its following natural will take.
    pub fn build(range: &NoteRange, layout: ShortcutLayout) -> Self {
        let columns = layout.columns();
        let mut entries = Vec::new();
        let mut column = 0;

        for midi in range.midi_numbers() {
            let Some(key) = columns.get(column) else {
                break;
            };
            if midi.is_accidental() {
                entries.push((key.flat, midi));
            } else {
                entries.push((key.natural, midi));
                column += 1;
            }
        }

        Self { entries }
    }

    pub fn midi_for(&self, key: char) -> Option<MidiNumber> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, m)| m)
    }

    /// Resolve a char typed on a `layout` keyboard to its physical key and
    /// the MIDI number mapped there.
    pub fn lookup(&self, typed: char, layout: KeyboardLayout) -> Option<(char, MidiNumber)> {
        let key = layout.physical_key(typed.to_ascii_lowercase());
        self.midi_for(key).map(|midi| (key, midi))
    }

    pub fn key_for(&self, midi: MidiNumber) -> Option<char> {
        self.entries
            .iter()
            .find(|(_, m)| *m == midi)
            .map(|&(k, _)| k)
    }

    pub fn entries(&self) -> &[(char, MidiNumber)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
