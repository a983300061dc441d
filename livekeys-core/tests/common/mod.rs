#![allow(dead_code)]
//! Shared harness for livekeys-core integration tests: an offline session,
//! a recording audio backend and in-memory sample sets.

use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use livekeys_audio::soundfont::wav_data_uri;
use livekeys_audio::{
    AudioBackend, LoadError, LoaderSettings, SampleSetRequest, SampleSource, SharedTestBackend,
    StaticSampleSource, TestBackend,
};
use livekeys_core::{
    KeyRangeSettings, KeyboardLayout, LaneFactory, LiveKeyboard, LocalSession, OfflineChannel,
};
use livekeys_types::{ConnectionId, MidiNumber, NoteSet, Presence, RosterEntry, UserInfo};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn m(n: u8) -> MidiNumber {
    MidiNumber::new(n).unwrap()
}

pub fn local_id() -> ConnectionId {
    ConnectionId::new(1)
}

pub fn wav_manifest(instrument: &str, sample_names: &[String]) -> String {
    let uri = wav_data_uri(&[0.0, 0.5, 0.0, -0.5], 22_050).unwrap();
    let body: Vec<String> = sample_names
        .iter()
        .map(|name| format!("\"{}\": \"{}\"", name, uri))
        .collect();
    format!("MIDI.Soundfont.{} = {{\n{}\n}}\n", instrument, body.join(",\n"))
}

/// Piano and organ sample sets covering C3..B4.
pub fn static_source() -> StaticSampleSource {
    let names: Vec<String> = (48u8..=71).map(|n| m(n).sample_name()).collect();
    StaticSampleSource::new()
        .with_manifest("acoustic_grand_piano", wav_manifest("acoustic_grand_piano", &names))
        .with_manifest("reed_organ", wav_manifest("reed_organ", &names))
}

/// Fetches for gated instruments block until `open` is called.
pub struct GatedSource {
    inner: StaticSampleSource,
    gated: Vec<String>,
    open: Mutex<bool>,
    cond: Condvar,
}

impl GatedSource {
    pub fn new(gated: &[&str]) -> Self {
        Self {
            inner: static_source(),
            gated: gated.iter().map(|s| s.to_string()).collect(),
            open: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

impl SampleSource for GatedSource {
    fn fetch(&self, request: &SampleSetRequest) -> Result<Vec<u8>, LoadError> {
        if self.gated.contains(&request.instrument) {
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cond.wait(open).unwrap();
            }
        }
        self.inner.fetch(request)
    }
}

pub struct Rig {
    pub keyboard: LiveKeyboard,
    pub backend: Arc<TestBackend>,
    pub channel: OfflineChannel,
}

pub fn rig_with(source: Arc<dyn SampleSource>, viewport_width: u32) -> Rig {
    let backend = Arc::new(TestBackend::new());
    let shared: Rc<dyn AudioBackend> = Rc::new(SharedTestBackend(backend.clone()));
    let channel = OfflineChannel::new(local_id()).with_info(UserInfo {
        name: "Tatum Paolo".into(),
        color: "#local".into(),
        picture: "/assets/avatars/3.png".into(),
    });
    let session = LocalSession::start(Box::new(channel.clone()), "piano");
    let keyboard = LiveKeyboard::new(
        session,
        LaneFactory::new(shared, source, LoaderSettings::default()),
        KeyRangeSettings::default(),
        KeyboardLayout::Qwerty,
        viewport_width,
    );
    Rig {
        keyboard,
        backend,
        channel,
    }
}

/// A keyboard whose local piano lane has finished loading.
pub fn ready_rig(viewport_width: u32) -> Rig {
    let mut rig = rig_with(Arc::new(static_source()), viewport_width);
    tick_until(&mut rig.keyboard, |k| !k.is_loading());
    rig
}

pub fn tick_until(keyboard: &mut LiveKeyboard, mut pred: impl FnMut(&LiveKeyboard) -> bool) {
    let start = Instant::now();
    loop {
        keyboard.tick();
        if pred(keyboard) {
            return;
        }
        assert!(start.elapsed() < TIMEOUT, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

pub fn remote(id: u64, color: &str, instrument: Option<&str>, notes: &[u8]) -> RosterEntry {
    RosterEntry {
        connection_id: ConnectionId::new(id),
        info: UserInfo {
            name: format!("remote {}", id),
            color: color.to_string(),
            picture: String::new(),
        },
        presence: Some(Presence {
            instrument: instrument.map(str::to_string),
            notes: Some(notes.iter().map(|&n| m(n)).collect::<NoteSet>()),
        }),
    }
}
