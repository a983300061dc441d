//! # livekeys-audio
//!
//! Sample playback for the shared keyboard: the `AudioBackend` trait and its
//! cpal, null and recording implementations, soundfont manifest decoding,
//! on-demand instrument loading and per-participant note scheduling.

pub mod backend;
pub mod cpal_backend;
pub mod loader;
pub mod scheduler;
pub mod soundfont;
pub mod source;
pub mod voices;

pub use backend::{
    AudioBackend, BackendError, BackendResult, NullBackend, SampleData, SharedTestBackend,
    TestBackend, TestOp, VoiceId,
};
pub use cpal_backend::CpalBackend;
pub use loader::{InstrumentHandle, InstrumentLoader, LoaderSettings};
pub use scheduler::NoteScheduler;
pub use soundfont::{LoadError, SampleFormat, SampleSet, SampleSetRequest, Soundfont};
pub use source::{
    DirSampleSource, HttpSampleSource, SampleHost, SampleSource, StaticSampleSource,
};
