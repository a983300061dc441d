//! Key-up synthesis for terminals that only report presses.
//!
//! A held key produces a stream of repeat presses. A key whose last press is
//! older than the release timeout is treated as released.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const RELEASE_TIMEOUT: Duration = Duration::from_millis(150);

pub struct HeldKeys {
    last_seen: HashMap<char, Instant>,
    release_timeout: Duration,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self {
            last_seen: HashMap::new(),
            release_timeout: RELEASE_TIMEOUT,
        }
    }

    /// Record a press. Returns true for a new press, false for a repeat.
    pub fn key_pressed(&mut self, c: char, now: Instant) -> bool {
        self.last_seen.insert(c, now).is_none()
    }

    /// Forget `c` after an explicit release.
    pub fn key_released(&mut self, c: char) -> bool {
        self.last_seen.remove(&c).is_some()
    }

    /// Keys not seen within the timeout. They are forgotten.
    pub fn check_releases(&mut self, now: Instant) -> Vec<char> {
        let timeout = self.release_timeout;
        let mut released = Vec::new();
        self.last_seen.retain(|&c, last| {
            if now.duration_since(*last) > timeout {
                released.push(c);
                false
            } else {
                true
            }
        });
        released.sort_unstable();
        released
    }

    pub fn release_all(&mut self) -> Vec<char> {
        let mut keys: Vec<char> = self.last_seen.drain().map(|(c, _)| c).collect();
        keys.sort_unstable();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

impl Default for HeldKeys {
    fn default() -> Self {
        Self::new()
    }
}
