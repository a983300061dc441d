//! Terminal front-end state: turns terminal events into keyboard input and
//! keeps the held-key and viewport bookkeeping.

use std::time::{Duration, Instant};

use livekeys_core::{InputEvent, KeyboardFrame, LiveKeyboard};
use livekeys_types::presence::instrument_names;

use crate::held_keys::HeldKeys;
use crate::render::{CellMap, Chrome};
use crate::terminal::{KeyInput, KeyPhase, PointerPhase, UiEvent};

pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

pub struct App {
    keyboard: LiveKeyboard,
    held: HeldKeys,
    px_per_column: u32,
    reports_release: bool,
    room: Option<String>,
    quit: bool,
    dirty: bool,
}

impl App {
    pub fn new(keyboard: LiveKeyboard, px_per_column: u32, reports_release: bool) -> Self {
        Self {
            keyboard,
            held: HeldKeys::new(),
            px_per_column: px_per_column.max(1),
            reports_release,
            room: None,
            quit: false,
            dirty: true,
        }
    }

    pub fn with_room(mut self, room: Option<String>) -> Self {
        self.room = room;
        self
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn keyboard(&self) -> &LiveKeyboard {
        &self.keyboard
    }

    /// Viewport width in piano pixels for a terminal width in columns.
    pub fn viewport_for(&self, columns: u16) -> u32 {
        columns as u32 * self.px_per_column
    }

    pub fn cell_map(&self, frame: &KeyboardFrame) -> CellMap {
        let key_height = frame
            .keys
            .iter()
            .find(|k| !k.accidental)
            .map(|k| k.rect.height)
            .unwrap_or(1.0);
        CellMap::new(self.px_per_column, key_height)
    }

    pub fn chrome(&self) -> Chrome<'_> {
        Chrome {
            instrument: self.keyboard.instrument(),
            room: self.room.as_deref(),
        }
    }

    pub fn key_at(&self, x: f32, y: f32) -> Option<livekeys_types::MidiNumber> {
        self.keyboard.key_at(x, y)
    }

    pub fn handle_event(&mut self, event: UiEvent, now: Instant) {
        match event {
            UiEvent::Key(KeyInput::Escape | KeyInput::Interrupt, KeyPhase::Press) => {
                self.quit = true;
            }
            UiEvent::Key(KeyInput::Tab, KeyPhase::Press) => self.cycle_instrument(1),
            UiEvent::Key(KeyInput::BackTab, KeyPhase::Press) => self.cycle_instrument(-1),
            UiEvent::Key(KeyInput::Char(c), KeyPhase::Press | KeyPhase::Repeat) => {
                let new_press = self.held.key_pressed(c, now);
                if self.reports_release || new_press {
                    self.input(InputEvent::KeyDown { key: c });
                }
            }
            UiEvent::Key(KeyInput::Char(c), KeyPhase::Release) => {
                self.held.key_released(c);
                self.input(InputEvent::KeyUp { key: c });
            }
            UiEvent::Key(..) => {}
            UiEvent::Pointer { phase, column, row } => {
                let frame = self.keyboard.frame();
                let key = self
                    .cell_map(&frame)
                    .to_piano(column, row)
                    .and_then(|(x, y)| self.keyboard.key_at(x, y));
                let input = match phase {
                    PointerPhase::Down => InputEvent::PointerDown { key },
                    PointerPhase::Drag | PointerPhase::Moved => InputEvent::PointerMove { key },
                    PointerPhase::Up => InputEvent::PointerUp,
                };
                self.input(input);
            }
            UiEvent::Resize(columns, _) => {
                let width = self.viewport_for(columns);
                self.keyboard.set_viewport_width(width);
                self.dirty = true;
            }
        }
    }

    /// Synthesise key-ups, poll the session and loaders. Returns true when a
    /// redraw is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.reports_release {
            for c in self.held.check_releases(now) {
                self.input(InputEvent::KeyUp { key: c });
            }
        }
        if self.keyboard.tick() {
            self.dirty = true;
        }
        std::mem::take(&mut self.dirty)
    }

    pub fn shutdown(&mut self) {
        for c in self.held.release_all() {
            self.input(InputEvent::KeyUp { key: c });
        }
        self.keyboard.shutdown();
    }

    fn input(&mut self, event: InputEvent) {
        if !self.keyboard.handle_input(event).is_empty() {
            self.dirty = true;
        }
    }

    fn cycle_instrument(&mut self, step: isize) {
        let names: Vec<&str> = instrument_names().collect();
        let current = names
            .iter()
            .position(|n| *n == self.keyboard.instrument())
            .unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(names.len() as isize) as usize;
        self.keyboard.set_instrument(names[next]);
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::sync::Arc;

    use livekeys_audio::{AudioBackend, LoaderSettings, NullBackend, StaticSampleSource};
    use livekeys_core::{
        KeyRangeSettings, KeyboardLayout, LaneFactory, LocalSession, OfflineChannel,
    };
    use livekeys_types::{ConnectionId, MidiNumber};

    fn app(reports_release: bool) -> App {
        let backend: Rc<dyn AudioBackend> = Rc::new(NullBackend::new());
        let session = LocalSession::start(
            Box::new(OfflineChannel::new(ConnectionId::new(1))),
            "piano",
        );
        let keyboard = LiveKeyboard::new(
            session,
            LaneFactory::new(backend, Arc::new(StaticSampleSource::new()), LoaderSettings::default()),
            KeyRangeSettings::default(),
            KeyboardLayout::Qwerty,
            1300,
        );
        App::new(keyboard, 8, reports_release)
    }

    fn local_notes(app: &App) -> Vec<u8> {
        app.keyboard()
            .session()
            .local()
            .notes
            .iter()
            .map(MidiNumber::get)
            .collect()
    }

    #[test]
    fn presses_without_release_events_time_out() {
        let mut app = app(false);
        let start = Instant::now();
        app.handle_event(UiEvent::Key(KeyInput::Char('a'), KeyPhase::Press), start);
        assert_eq!(local_notes(&app), vec![48]);

        app.handle_event(
            UiEvent::Key(KeyInput::Char('a'), KeyPhase::Press),
            start + Duration::from_millis(60),
        );
        app.tick(start + Duration::from_millis(120));
        assert_eq!(local_notes(&app), vec![48]);

        app.tick(start + Duration::from_millis(300));
        assert!(local_notes(&app).is_empty());
    }

    #[test]
    fn explicit_release_is_honoured() {
        let mut app = app(true);
        let now = Instant::now();
        app.handle_event(UiEvent::Key(KeyInput::Char('s'), KeyPhase::Press), now);
        app.handle_event(UiEvent::Key(KeyInput::Char('s'), KeyPhase::Repeat), now);
        assert_eq!(local_notes(&app), vec![50]);
        app.handle_event(UiEvent::Key(KeyInput::Char('s'), KeyPhase::Release), now);
        assert!(local_notes(&app).is_empty());
    }

    #[test]
    fn narrow_terminal_switches_to_mobile_range() {
        let mut app = app(true);
        app.handle_event(UiEvent::Resize(100, 40), Instant::now());
        assert_eq!(app.keyboard().frame().range.first().get(), 60);
    }

    #[test]
    fn tab_cycles_instruments() {
        let mut app = app(true);
        let now = Instant::now();
        app.handle_event(UiEvent::Key(KeyInput::Tab, KeyPhase::Press), now);
        assert_eq!(app.keyboard().instrument(), "fiddle");
        app.handle_event(UiEvent::Key(KeyInput::BackTab, KeyPhase::Press), now);
        app.handle_event(UiEvent::Key(KeyInput::BackTab, KeyPhase::Press), now);
        assert_eq!(app.keyboard().instrument(), "piccolo");
    }

    #[test]
    fn mouse_drag_glides_across_keys() {
        let mut app = app(true);
        let now = Instant::now();
        // row 10 is the bottom key row, where only naturals are hit
        app.handle_event(UiEvent::Pointer { phase: PointerPhase::Down, column: 2, row: 10 }, now);
        assert_eq!(local_notes(&app), vec![48]);
        app.handle_event(UiEvent::Pointer { phase: PointerPhase::Drag, column: 14, row: 10 }, now);
        assert_eq!(local_notes(&app), vec![50]);
        app.handle_event(UiEvent::Pointer { phase: PointerPhase::Up, column: 14, row: 10 }, now);
        assert!(local_notes(&app).is_empty());
        app.handle_event(UiEvent::Key(KeyInput::Escape, KeyPhase::Press), now);
        assert!(app.should_quit());
    }
}
