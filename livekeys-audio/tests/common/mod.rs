#![allow(dead_code)]
//! Test helpers for livekeys-audio integration tests.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use livekeys_audio::soundfont::wav_data_uri;
use livekeys_audio::{
    InstrumentLoader, LoadError, LoaderSettings, SampleSetRequest, SampleSource,
    StaticSampleSource,
};

/// A manifest with one short WAV sample per given sample name.
pub fn wav_manifest(instrument: &str, sample_names: &[&str]) -> String {
    let uri = wav_data_uri(&[0.0, 0.25, 0.5, 0.25, 0.0, -0.25], 22_050).unwrap();
    let body: Vec<String> = sample_names
        .iter()
        .map(|name| format!("\"{}\": \"{}\"", name, uri))
        .collect();
    format!("MIDI.Soundfont.{} = {{\n{},\n}}\n", instrument, body.join(",\n"))
}

/// Manifests for piano and organ covering C3..B4.
pub fn static_source() -> StaticSampleSource {
    let names: Vec<String> = (48u8..=71)
        .map(|n| livekeys_types::MidiNumber::new(n).unwrap().sample_name())
        .collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    StaticSampleSource::new()
        .with_manifest("acoustic_grand_piano", wav_manifest("acoustic_grand_piano", &names))
        .with_manifest("reed_organ", wav_manifest("reed_organ", &names))
}

/// Poll until the loader settles (ready or failed), or panic on timeout.
pub fn poll_until_settled(loader: &mut InstrumentLoader, timeout: Duration) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        loader.poll();
        if !loader.is_fetching() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("Timed out waiting for instrument load");
}

pub fn loader(source: Arc<dyn SampleSource>) -> InstrumentLoader {
    InstrumentLoader::new(source, LoaderSettings::default())
}

/// Source whose fetches for gated instruments block until `open` is called.
pub struct GatedSource {
    inner: StaticSampleSource,
    gated: Vec<String>,
    open: Mutex<bool>,
    cond: Condvar,
}

impl GatedSource {
    pub fn new(inner: StaticSampleSource, gated: &[&str]) -> Self {
        Self {
            inner,
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
