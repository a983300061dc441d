//! Visible note window and shortcut map, chosen from the viewport width.

use livekeys_types::{KeyboardShortcutMap, NoteRange, ShortcutLayout};

pub const DEFAULT_BREAKPOINT: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

/// A note range and the shortcut layout laid over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePreset {
    pub range: NoteRange,
    pub shortcuts: ShortcutLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRangeSettings {
    pub breakpoint: u32,
    pub desktop: RangePreset,
    pub mobile: RangePreset,
}

impl Default for KeyRangeSettings {
    fn default() -> Self {
        Self {
            breakpoint: DEFAULT_BREAKPOINT,
            desktop: RangePreset {
                range: range_or_panic("c3", "b4"),
                shortcuts: ShortcutLayout::HomeRow,
            },
            mobile: RangePreset {
                range: range_or_panic("c4", "b4"),
                shortcuts: ShortcutLayout::HomeRow,
            },
        }
    }
}

fn range_or_panic(first: &str, last: &str) -> NoteRange {
    match NoteRange::from_notes(first, last) {
        Ok(range) => range,
        Err(e) => panic!("built-in range {}..{} invalid: {}", first, last, e),
    }
}

/// Piano pixel width for a viewport width. Bands are upper-open.
pub fn piano_width_for(viewport_width: u32) -> u32 {
    if viewport_width < 1250 {
        viewport_width.saturating_sub(20)
    } else if viewport_width < 1550 {
        1200
    } else {
        1500
    }
}

pub fn device_class_for(viewport_width: u32, breakpoint: u32) -> DeviceClass {
    if viewport_width < breakpoint {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    }
}

/// Current note window, shortcut map and piano width.
#[derive(Debug, Clone)]
pub struct KeyRangeConfig {
    settings: KeyRangeSettings,
    viewport_width: u32,
    device: DeviceClass,
    shortcuts: KeyboardShortcutMap,
}

impl KeyRangeConfig {
    pub fn new(settings: KeyRangeSettings, viewport_width: u32) -> Self {
        let device = device_class_for(viewport_width, settings.breakpoint);
        let preset = settings.preset(device);
        Self {
            settings,
            viewport_width,
            device,
            shortcuts: KeyboardShortcutMap::build(&preset.range, preset.shortcuts),
        }
    }

    /// Re-evaluate for a new viewport width. Returns true if the device
    /// class (and with it the range and shortcuts) changed.
    pub fn update(&mut self, viewport_width: u32) -> bool {
        self.viewport_width = viewport_width;
        let device = device_class_for(viewport_width, self.settings.breakpoint);
        if device == self.device {
            return false;
        }
        self.device = device;
        let preset = self.settings.preset(device);
        self.shortcuts = KeyboardShortcutMap::build(&preset.range, preset.shortcuts);
        log::debug!(
            target: "core::key_range",
            "Viewport {}px -> {:?} range {}..{}",
            viewport_width,
            device,
            preset.range.first().note_name(),
            preset.range.last().note_name()
        );
        true
    }

    pub fn device(&self) -> DeviceClass {
        self.device
    }

    pub fn range(&self) -> NoteRange {
        self.settings.preset(self.device).range
    }

    pub fn shortcuts(&self) -> &KeyboardShortcutMap {
        &self.shortcuts
    }

    pub fn viewport_width(&self) -> u32 {
        self.viewport_width
    }

    pub fn piano_width(&self) -> u32 {
        piano_width_for(self.viewport_width)
    }
}

impl KeyRangeSettings {
    fn preset(&self, device: DeviceClass) -> RangePreset {
        match device {
            DeviceClass::Mobile => self.mobile,
            DeviceClass::Desktop => self.desktop,
        }
    }
}
