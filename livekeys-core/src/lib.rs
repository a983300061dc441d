//! # livekeys-core
//!
//! The shared keyboard itself: viewport-driven key ranges, key geometry,
//! the input state machine, presence merging, per-participant audio lanes
//! and configuration.

pub mod config;
pub mod geometry;
pub mod highlights;
pub mod interaction;
pub mod key_range;
pub mod live_keyboard;
pub mod presence;
pub mod session;

pub use config::Config;
pub use geometry::{KeyRect, KeyboardGeometry};
pub use highlights::KeyHighlights;
pub use interaction::{InputEvent, KeyInteractionController, NoteIntent};
pub use key_range::{DeviceClass, KeyRangeConfig, KeyRangeSettings};
pub use livekeys_types::KeyboardLayout;
pub use live_keyboard::{KeyView, KeyboardFrame, LaneFactory, LiveKeyboard, SessionStatus};
pub use presence::{merge, ActiveNoteSnapshot};
pub use session::{LocalSession, OfflineChannel, PresenceChannel};
