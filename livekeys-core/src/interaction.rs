//! Pointer, touch and hardware-keyboard input to note-on/note-off intents.
//!
//! A key is either idle or pressed. Every source (the mouse pointer, each
//! touch point, each held shortcut key) remembers which key it is on, but
//! whether a note-on or note-off is emitted is decided only by the shared
//! active set, so a key never receives two note-ons without a note-off in
//! between, nor a note-off while idle.

use std::collections::HashMap;

use livekeys_types::{KeyboardLayout, KeyboardShortcutMap, MidiNumber, NoteRange, NoteSet};

/// Raw input, already resolved to the key under the pointer where relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown { key: Option<MidiNumber> },
    /// Pointer moved; `key` is the key now under it.
    PointerMove { key: Option<MidiNumber> },
    PointerUp,
    /// Pointer left the keyboard area.
    PointerLeave,
    TouchStart { id: u64, key: Option<MidiNumber> },
    TouchMove { id: u64, key: Option<MidiNumber> },
    TouchEnd { id: u64 },
    TouchCancel { id: u64 },
    KeyDown { key: char },
    KeyUp { key: char },
}

/// A note change requested by local input. `prev_active` is the locally
/// active set before this intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteIntent {
    On { midi: MidiNumber, prev_active: NoteSet },
    Off { midi: MidiNumber, prev_active: NoteSet },
}

impl NoteIntent {
    pub fn midi(&self) -> MidiNumber {
        match self {
            NoteIntent::On { midi, .. } | NoteIntent::Off { midi, .. } => *midi,
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, NoteIntent::On { .. })
    }

    pub fn prev_active(&self) -> &NoteSet {
        match self {
            NoteIntent::On { prev_active, .. } | NoteIntent::Off { prev_active, .. } => {
                prev_active
            }
        }
    }
}

pub struct KeyInteractionController {
    range: NoteRange,
    shortcuts: KeyboardShortcutMap,
    layout: KeyboardLayout,
    disabled: bool,
    active: NoteSet,
    pointer_down: bool,
    pointer_key: Option<MidiNumber>,
    touches: HashMap<u64, Option<MidiNumber>>,
    held_chars: HashMap<char, MidiNumber>,
}

impl KeyInteractionController {
    pub fn new(range: NoteRange, shortcuts: KeyboardShortcutMap, layout: KeyboardLayout) -> Self {
        Self {
            range,
            shortcuts,
            layout,
            disabled: false,
            active: NoteSet::new(),
            pointer_down: false,
            pointer_key: None,
            touches: HashMap::new(),
            held_chars: HashMap::new(),
        }
    }

    pub fn range(&self) -> NoteRange {
        self.range
    }

    pub fn shortcuts(&self) -> &KeyboardShortcutMap {
        &self.shortcuts
    }

    pub fn active_notes(&self) -> &NoteSet {
        &self.active
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// While disabled no note-on is emitted. Releases still go through.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn handle(&mut self, event: InputEvent) -> Vec<NoteIntent> {
        let mut out = Vec::new();
        match event {
            InputEvent::PointerDown { key } => {
                self.pointer_down = true;
                if let Some(old) = self.pointer_key.take() {
                    if key != Some(old) {
                        self.release(old, &mut out);
                    }
                }
                self.pointer_key = key;
                if let Some(midi) = key {
                    self.press(midi, &mut out);
                }
            }
            InputEvent::PointerMove { key } => {
                if self.pointer_down && key != self.pointer_key {
                    if let Some(old) = self.pointer_key.take() {
                        self.release(old, &mut out);
                    }
                    self.pointer_key = key;
                    if let Some(midi) = key {
                        self.press(midi, &mut out);
                    }
                }
            }
            InputEvent::PointerUp => {
                self.pointer_down = false;
                if let Some(old) = self.pointer_key.take() {
                    self.release(old, &mut out);
                }
            }
            InputEvent::PointerLeave => {
                if let Some(old) = self.pointer_key.take() {
                    self.release(old, &mut out);
                }
            }
            InputEvent::TouchStart { id, key } => {
                if let Some(Some(old)) = self.touches.insert(id, key) {
                    self.release(old, &mut out);
                }
                if let Some(midi) = key {
                    self.press(midi, &mut out);
                }
            }
            InputEvent::TouchMove { id, key } => {
                let Some(current) = self.touches.get_mut(&id) else {
                    return out;
                };
                if *current != key {
                    let old = std::mem::replace(current, key);
                    if let Some(old) = old {
                        self.release(old, &mut out);
                    }
                    if let Some(midi) = key {
                        self.press(midi, &mut out);
                    }
                }
            }
            InputEvent::TouchEnd { id } | InputEvent::TouchCancel { id } => {
                if let Some(Some(old)) = self.touches.remove(&id) {
                    self.release(old, &mut out);
                }
            }
            InputEvent::KeyDown { key } => {
                let Some((key, midi)) = self.shortcuts.lookup(key, self.layout) else {
                    return out;
                };
                if self.held_chars.contains_key(&key) {
                    // OS key repeat
                    return out;
                }
                self.held_chars.insert(key, midi);
                self.press(midi, &mut out);
            }
            InputEvent::KeyUp { key } => {
                let key = self.layout.physical_key(key.to_ascii_lowercase());
                if let Some(midi) = self.held_chars.remove(&key) {
                    self.release(midi, &mut out);
                }
            }
        }
        out
    }

    /// Switch to a new note window. Pressed keys outside it are released.
    pub fn set_range(&mut self, range: NoteRange, shortcuts: KeyboardShortcutMap) -> Vec<NoteIntent> {
        self.range = range;
        self.shortcuts = shortcuts;

        let mut out = Vec::new();
        let outside: Vec<MidiNumber> = self.active.iter().filter(|m| !range.contains(*m)).collect();
        for midi in outside {
            self.release(midi, &mut out);
        }

        if self.pointer_key.is_some_and(|m| !range.contains(m)) {
            self.pointer_key = None;
        }
        for key in self.touches.values_mut() {
            if key.is_some_and(|m| !range.contains(m)) {
                *key = None;
            }
        }
        self.held_chars.retain(|_, m| range.contains(*m));
        out
    }

    /// Release every pressed key and forget all sources.
    pub fn release_all(&mut self) -> Vec<NoteIntent> {
        let mut out = Vec::new();
        let pressed: Vec<MidiNumber> = self.active.iter().collect();
        for midi in pressed {
            self.release(midi, &mut out);
        }
        self.pointer_down = false;
        self.pointer_key = None;
        self.touches.clear();
        self.held_chars.clear();
        out
    }

    fn press(&mut self, midi: MidiNumber, out: &mut Vec<NoteIntent>) {
        if self.disabled || !self.range.contains(midi) || self.active.contains(midi) {
            return;
        }
        let prev_active = self.active.clone();
        self.active.insert(midi);
        out.push(NoteIntent::On { midi, prev_active });
    }

    fn release(&mut self, midi: MidiNumber, out: &mut Vec<NoteIntent>) {
        if !self.active.contains(midi) {
            return;
        }
        let prev_active = self.active.clone();
        self.active.remove(midi);
        out.push(NoteIntent::Off { midi, prev_active });
    }
}
