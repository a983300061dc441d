use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, buffer::Buffer, layout::Rect, Terminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Tab,
    BackTab,
    Escape,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Press,
    Repeat,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Drag,
    Up,
    Moved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    Key(KeyInput, KeyPhase),
    Pointer { phase: PointerPhase, column: u16, row: u16 },
    Resize(u16, u16),
}

/// Crossterm terminal in raw mode with mouse capture.
pub struct TerminalBackend {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    keyboard_enhancement_enabled: bool,
}

impl TerminalBackend {
    pub fn new() -> io::Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            keyboard_enhancement_enabled: false,
        })
    }

    pub fn start(&mut self) -> io::Result<()> {
        enable_raw_mode()?;

        // Must be queried before the alternate screen is entered
        let supports_enhancement = matches!(supports_keyboard_enhancement(), Ok(true));

        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;

        if supports_enhancement
            && execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )
            .is_ok()
        {
            self.keyboard_enhancement_enabled = true;
        }
        log::info!(
            target: "ui::terminal",
            "Terminal started (key release events: {})",
            self.keyboard_enhancement_enabled
        );

        self.terminal.clear()?;
        Ok(())
    }

    pub fn stop(&mut self) -> io::Result<()> {
        if self.keyboard_enhancement_enabled {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
            self.keyboard_enhancement_enabled = false;
        }
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;
        Ok(())
    }

    /// True when the terminal reports key releases. Otherwise held keys are
    /// released on a timeout.
    pub fn reports_key_release(&self) -> bool {
        self.keyboard_enhancement_enabled
    }

    pub fn size(&self) -> io::Result<(u16, u16)> {
        let size = self.terminal.size()?;
        Ok((size.width, size.height))
    }

    /// Draw with a closure that fills the whole-screen buffer.
    pub fn draw(&mut self, paint: impl FnOnce(Rect, &mut Buffer)) -> io::Result<()> {
        self.terminal.draw(|f| {
            let area = f.area();
            paint(area, f.buffer_mut());
        })?;
        Ok(())
    }

    pub fn poll_event(&mut self, timeout: Duration) -> Option<UiEvent> {
        let mut t = timeout;
        loop {
            if !event::poll(t).ok()? {
                return None;
            }
            let converted = match event::read().ok()? {
                Event::Key(key) => convert_key_event(key),
                Event::Mouse(mouse) => convert_mouse_event(mouse),
                Event::Resize(w, h) => Some(UiEvent::Resize(w, h)),
                _ => None,
            };
            if converted.is_some() {
                return converted;
            }
            // drain discarded events without waiting again
            t = Duration::ZERO;
        }
    }
}

fn convert_key_event(event: KeyEvent) -> Option<UiEvent> {
    let phase = match event.kind {
        KeyEventKind::Press => KeyPhase::Press,
        KeyEventKind::Repeat => KeyPhase::Repeat,
        KeyEventKind::Release => KeyPhase::Release,
    };
    let key = match event.code {
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyInput::Interrupt
        }
        KeyCode::Char(c) => KeyInput::Char(c),
        KeyCode::Tab => KeyInput::Tab,
        KeyCode::BackTab => KeyInput::BackTab,
        KeyCode::Esc => KeyInput::Escape,
        _ => return None,
    };
    Some(UiEvent::Key(key, phase))
}

fn convert_mouse_event(event: MouseEvent) -> Option<UiEvent> {
    let phase = match event.kind {
        MouseEventKind::Down(MouseButton::Left) => PointerPhase::Down,
        MouseEventKind::Drag(MouseButton::Left) => PointerPhase::Drag,
        MouseEventKind::Up(MouseButton::Left) => PointerPhase::Up,
        MouseEventKind::Moved => PointerPhase::Moved,
        _ => return None,
    };
    Some(UiEvent::Pointer {
        phase,
        column: event.column,
        row: event.row,
    })
}
