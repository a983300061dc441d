//! Draws a keyboard frame into the terminal buffer.
//!
//! Piano pixels map onto terminal cells at a fixed number of pixels per
//! column; the key rows span the full key height.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};

use livekeys_core::{KeyView, KeyboardFrame};
use livekeys_types::MidiNumber;

/// Terminal rows the keys occupy.
pub const KEY_ROWS: u16 = 9;
const KEYBOARD_TOP: u16 = 2;
const KEYBOARD_LEFT: u16 = 1;

const NATURAL_BG: Color = Color::Rgb(236, 236, 228);
const ACCIDENTAL_BG: Color = Color::Rgb(40, 40, 44);
const DIVIDER_FG: Color = Color::Rgb(150, 150, 150);
const DEFAULT_ACTIVE: Color = Color::Rgb(96, 165, 250);
const DIM: Color = Color::Rgb(120, 120, 120);

/// Parse `#rrggbb` or `#rgb`.
pub fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    let channel = |h: &str| u8::from_str_radix(h, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        3 => {
            let expand = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Some(Color::Rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

/// Conversion between terminal cells and piano pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMap {
    pub px_per_column: u32,
    pub key_height: f32,
}

impl CellMap {
    pub fn new(px_per_column: u32, key_height: f32) -> Self {
        Self {
            px_per_column: px_per_column.max(1),
            key_height,
        }
    }

    /// Piano pixel at the centre of a cell, or None outside the key rows.
    pub fn to_piano(&self, column: u16, row: u16) -> Option<(f32, f32)> {
        if column < KEYBOARD_LEFT || row < KEYBOARD_TOP || row >= KEYBOARD_TOP + KEY_ROWS {
            return None;
        }
        let ppc = self.px_per_column as f32;
        let x = (column - KEYBOARD_LEFT) as f32 * ppc + ppc / 2.0;
        let y = ((row - KEYBOARD_TOP) as f32 + 0.5) / KEY_ROWS as f32 * self.key_height;
        Some((x, y))
    }

    pub fn columns_for(&self, piano_width: u32) -> u16 {
        (piano_width / self.px_per_column).min(u16::MAX as u32) as u16
    }
}

/// Extra text for the status and participant lines.
pub struct Chrome<'a> {
    pub instrument: &'a str,
    pub room: Option<&'a str>,
}

pub fn draw(
    buf: &mut Buffer,
    area: Rect,
    frame: &KeyboardFrame,
    map: CellMap,
    chrome: &Chrome<'_>,
    hit: impl Fn(f32, f32) -> Option<MidiNumber>,
) {
    draw_status(buf, area, frame, chrome);

    let columns = map.columns_for(frame.piano_width);
    for row in KEYBOARD_TOP..(KEYBOARD_TOP + KEY_ROWS).min(area.height) {
        for col in KEYBOARD_LEFT..(KEYBOARD_LEFT + columns).min(area.width) {
            let Some((x, y)) = map.to_piano(col, row) else {
                continue;
            };
            let Some(view) = hit(x, y).and_then(|midi| frame.keys.iter().find(|k| k.midi == midi))
            else {
                continue;
            };
            paint_key_cell(buf, col, row, view, x, map);
        }
    }

    draw_labels(buf, area, frame, map);
    draw_participants(buf, area, frame);
}

fn key_bg(view: &KeyView) -> Color {
    if view.active {
        view.color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(DEFAULT_ACTIVE)
    } else if view.accidental {
        ACCIDENTAL_BG
    } else {
        NATURAL_BG
    }
}

fn paint_key_cell(buf: &mut Buffer, col: u16, row: u16, view: &KeyView, x: f32, map: CellMap) {
    let Some(cell) = buf.cell_mut((col, row)) else {
        return;
    };
    let starts_here = !view.accidental && x - view.rect.x < map.px_per_column as f32;
    let symbol = if starts_here { "▏" } else { " " };
    cell.set_symbol(symbol);
    cell.set_style(Style::default().bg(key_bg(view)).fg(DIVIDER_FG));
}

fn draw_labels(buf: &mut Buffer, area: Rect, frame: &KeyboardFrame, map: CellMap) {
    let natural_row = KEYBOARD_TOP + KEY_ROWS - 1;
    let accidental_row = KEYBOARD_TOP + ((KEY_ROWS as f32 * 0.65) as u16).saturating_sub(1);
    for view in &frame.keys {
        let Some(label) = view.label else {
            continue;
        };
        let centre = view.rect.x + view.rect.width / 2.0;
        let col = KEYBOARD_LEFT + (centre / map.px_per_column as f32) as u16;
        let row = if view.accidental { accidental_row } else { natural_row };
        if col >= area.width || row >= area.height {
            continue;
        }
        if let Some(cell) = buf.cell_mut((col, row)) {
            let fg = if view.accidental && !view.active {
                NATURAL_BG
            } else {
                ACCIDENTAL_BG
            };
            cell.set_char(label.to_ascii_uppercase());
            cell.set_style(Style::default().fg(fg).bg(key_bg(view)));
        }
    }
}

fn status_line(frame: &KeyboardFrame, chrome: &Chrome<'_>) -> String {
    let mut text = format!(
        " LIVEKEYS  {}  {}..{}",
        chrome.instrument,
        frame.range.first().note_name(),
        frame.range.last().note_name()
    );
    if let Some(room) = chrome.room {
        text.push_str(&format!("  room {}", room));
    }
    if frame.offline && chrome.room.is_some() {
        text.push_str("  offline");
    }
    if frame.loading {
        text.push_str("  loading...");
    }
    if let Some(err) = &frame.load_error {
        text.push_str(&format!(" ({})", err));
    }
    if frame.setup_required {
        text.push_str("  SETUP REQUIRED: no authorization secret on the server");
    }
    text
}

fn draw_status(buf: &mut Buffer, area: Rect, frame: &KeyboardFrame, chrome: &Chrome<'_>) {
    if area.height == 0 {
        return;
    }
    let text = status_line(frame, chrome);
    let style = if frame.setup_required {
        Style::default().fg(Color::Rgb(248, 113, 113)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    buf.set_stringn(0, 0, &text, area.width as usize, style);

    let help = " keys play notes  mouse drag for glissando  Tab instrument  Esc quit";
    if area.height > 1 {
        buf.set_stringn(0, 1, help, area.width as usize, Style::default().fg(DIM));
    }
}

fn draw_participants(buf: &mut Buffer, area: Rect, frame: &KeyboardFrame) {
    let top = KEYBOARD_TOP + KEY_ROWS + 1;
    for (i, p) in frame.participants.iter().enumerate() {
        let row = top + i as u16;
        if row >= area.height {
            break;
        }
        let swatch = p
            .color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(DEFAULT_ACTIVE);
        buf.set_string(1, row, "  ", Style::default().bg(swatch));
        let notes: Vec<String> = p.notes.iter().map(|m| m.note_name()).collect();
        let who = p.name.as_deref().unwrap_or("anonymous");
        let marker = if i == 0 { " (you)" } else { "" };
        let line = format!(" {}{}  {}  {}", who, marker, p.instrument, notes.join(" "));
        buf.set_stringn(3, row, &line, area.width.saturating_sub(3) as usize, Style::default().fg(Color::White));
    }
}
