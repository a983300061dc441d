use std::path::{Path, PathBuf};

use serde::Deserialize;

use livekeys_audio::{LoaderSettings, SampleFormat, SampleHost, Soundfont};
use livekeys_types::{KeyboardLayout, NoteRange, ShortcutLayout, DEFAULT_INSTRUMENT};

use crate::key_range::{KeyRangeSettings, RangePreset};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Environment variable overriding `[auth] secret`.
pub const SECRET_ENV_VAR: &str = livekeys_net::auth::SECRET_ENV_VAR;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    keyboard: KeyboardConfig,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    net: NetConfig,
    #[serde(default)]
    auth: AuthConfig,
}

#[derive(Deserialize, Default)]
struct KeyboardConfig {
    breakpoint: Option<u32>,
    desktop_first: Option<String>,
    desktop_last: Option<String>,
    desktop_shortcuts: Option<String>,
    mobile_first: Option<String>,
    mobile_last: Option<String>,
    mobile_shortcuts: Option<String>,
    keyboard_layout: Option<String>,
    px_per_column: Option<u32>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    soundfont_host: Option<String>,
    soundfont: Option<String>,
    format: Option<String>,
    default_instrument: Option<String>,
}

#[derive(Deserialize, Default)]
struct NetConfig {
    listen_addr: Option<String>,
}

#[derive(Deserialize, Default)]
struct AuthConfig {
    secret: Option<String>,
}

pub struct Config {
    keyboard: KeyboardConfig,
    audio: AudioConfig,
    net: NetConfig,
    auth: AuthConfig,
}

impl Config {
    /// Built-in defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            keyboard: base.keyboard,
            audio: base.audio,
            net: base.net,
            auth: base.auth,
        }
    }

    pub fn key_range_settings(&self) -> KeyRangeSettings {
        let fallback = KeyRangeSettings::default();
        let k = &self.keyboard;
        KeyRangeSettings {
            breakpoint: k.breakpoint.unwrap_or(fallback.breakpoint),
            desktop: preset(
                k.desktop_first.as_deref(),
                k.desktop_last.as_deref(),
                k.desktop_shortcuts.as_deref(),
                fallback.desktop,
            ),
            mobile: preset(
                k.mobile_first.as_deref(),
                k.mobile_last.as_deref(),
                k.mobile_shortcuts.as_deref(),
                fallback.mobile,
            ),
        }
    }

    pub fn keyboard_layout(&self) -> KeyboardLayout {
        self.keyboard
            .keyboard_layout
            .as_deref()
            .and_then(KeyboardLayout::parse)
            .unwrap_or_default()
    }

    /// Pixels per terminal column (clamped to 1..=64).
    pub fn px_per_column(&self) -> u32 {
        self.keyboard.px_per_column.unwrap_or(8).clamp(1, 64)
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        let fallback = LoaderSettings::default();
        LoaderSettings {
            host: self.sample_host().base(),
            soundfont: self
                .audio
                .soundfont
                .as_deref()
                .and_then(Soundfont::parse)
                .unwrap_or(fallback.soundfont),
            format: self
                .audio
                .format
                .as_deref()
                .and_then(SampleFormat::parse)
                .unwrap_or(fallback.format),
        }
    }

    /// Soundfont content host: a URL, or a local directory mirroring it.
    /// Empty means the mirror under the user data directory.
    pub fn sample_host(&self) -> SampleHost {
        match self.audio.soundfont_host.as_deref() {
            Some(host) if !host.trim().is_empty() => SampleHost::parse(host),
            _ => SampleHost::Dir(
                dirs::data_dir()
                    .unwrap_or_else(std::env::temp_dir)
                    .join("livekeys")
                    .join("soundfonts"),
            ),
        }
    }

    pub fn default_instrument(&self) -> String {
        self.audio
            .default_instrument
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTRUMENT.to_string())
    }

    pub fn listen_addr(&self) -> String {
        self.net
            .listen_addr
            .clone()
            .unwrap_or_else(|| "127.0.0.1:7878".to_string())
    }

    /// `LIVEKEYS_SECRET_KEY` if set, otherwise `[auth] secret`.
    pub fn auth_secret(&self) -> Option<String> {
        std::env::var(SECRET_ENV_VAR)
            .ok()
            .or_else(|| self.auth.secret.clone())
            .filter(|s| !s.trim().is_empty())
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("livekeys").join("config.toml"))
}

fn preset(
    first: Option<&str>,
    last: Option<&str>,
    shortcuts: Option<&str>,
    fallback: RangePreset,
) -> RangePreset {
    let range = match (first, last) {
        (Some(first), Some(last)) => parse_range(first, last).unwrap_or(fallback.range),
        _ => fallback.range,
    };
    let shortcuts = shortcuts
        .and_then(ShortcutLayout::parse)
        .unwrap_or(fallback.shortcuts);
    RangePreset { range, shortcuts }
}

fn parse_range(first: &str, last: &str) -> Option<NoteRange> {
    match NoteRange::from_notes(first, last) {
        Ok(range) => Some(range),
        Err(e) => {
            log::warn!(target: "config", "ignoring range {}..{}: {}", first, last, e);
            None
        }
    }
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    merge_keyboard(&mut base.keyboard, user.keyboard);
    merge_audio(&mut base.audio, user.audio);
    if user.net.listen_addr.is_some() {
        base.net.listen_addr = user.net.listen_addr;
    }
    if user.auth.secret.is_some() {
        base.auth.secret = user.auth.secret;
    }
}

fn merge_keyboard(base: &mut KeyboardConfig, user: KeyboardConfig) {
    if user.breakpoint.is_some() {
        base.breakpoint = user.breakpoint;
    }
    if user.desktop_first.is_some() {
        base.desktop_first = user.desktop_first;
    }
    if user.desktop_last.is_some() {
        base.desktop_last = user.desktop_last;
    }
    if user.desktop_shortcuts.is_some() {
        base.desktop_shortcuts = user.desktop_shortcuts;
    }
    if user.mobile_first.is_some() {
        base.mobile_first = user.mobile_first;
    }
    if user.mobile_last.is_some() {
        base.mobile_last = user.mobile_last;
    }
    if user.mobile_shortcuts.is_some() {
        base.mobile_shortcuts = user.mobile_shortcuts;
    }
    if user.keyboard_layout.is_some() {
        base.keyboard_layout = user.keyboard_layout;
    }
    if user.px_per_column.is_some() {
        base.px_per_column = user.px_per_column;
    }
}

fn merge_audio(base: &mut AudioConfig, user: AudioConfig) {
    if user.soundfont_host.is_some() {
        base.soundfont_host = user.soundfont_host;
    }
    if user.soundfont.is_some() {
        base.soundfont = user.soundfont;
    }
    if user.format.is_some() {
        base.format = user.format;
    }
    if user.default_instrument.is_some() {
        base.default_instrument = user.default_instrument;
    }
}
