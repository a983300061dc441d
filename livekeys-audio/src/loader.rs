//! On-demand instrument loading.
//!
//! `load` starts a fetch on a background thread; `poll` applies completed
//! fetches on the caller's thread. Each load bumps a generation counter so a
//! fetch overtaken by a later `load` is ignored when it finally completes.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use livekeys_types::{soundfont_instrument, MidiNumber};

use crate::backend::SampleData;
use crate::soundfont::{
    build_sample_set, LoadError, SampleFormat, SampleSet, SampleSetRequest, Soundfont,
};
use crate::source::SampleSource;

/// Where and in which encoding to fetch sample sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub host: String,
    pub soundfont: Soundfont,
    pub format: SampleFormat,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            soundfont: Soundfont::MusyngKite,
            format: SampleFormat::Mp3,
        }
    }
}

/// A loaded instrument ready for playback.
#[derive(Debug)]
pub struct InstrumentHandle {
    name: String,
    samples: SampleSet,
}

impl InstrumentHandle {
    /// Display name the handle was loaded for, e.g. `organ`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample(&self, midi: MidiNumber) -> Option<&SampleData> {
        self.samples.sample(midi)
    }
}

#[derive(Debug)]
enum LoadState {
    Idle,
    Loading,
    Ready(Arc<InstrumentHandle>),
    Failed(LoadError),
}

struct Completion {
    generation: u64,
    name: String,
    result: Result<SampleSet, LoadError>,
}

pub struct InstrumentLoader {
    source: Arc<dyn SampleSource>,
    settings: LoaderSettings,
    current: Option<String>,
    generation: u64,
    state: LoadState,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl InstrumentLoader {
    pub fn new(source: Arc<dyn SampleSource>, settings: LoaderSettings) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            source,
            settings,
            current: None,
            generation: 0,
            state: LoadState::Idle,
            tx,
            rx,
        }
    }

    /// Request the instrument with display name `name`. Returns true if a
    /// fetch was started; a repeat request for the instrument already loading
    /// or loaded does nothing.
    pub fn load(&mut self, name: &str) -> bool {
        if self.current.as_deref() == Some(name)
            && matches!(self.state, LoadState::Loading | LoadState::Ready(_))
        {
            return false;
        }

        self.generation += 1;
        self.current = Some(name.to_string());
        self.state = LoadState::Loading;

        let request = SampleSetRequest {
            host: self.settings.host.clone(),
            soundfont: self.settings.soundfont,
            format: self.settings.format,
            instrument: soundfont_instrument(name).to_string(),
        };
        log::debug!(
            target: "audio::loader",
            "Loading {} (generation {}) from {}",
            name,
            self.generation,
            request.url()
        );

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let generation = self.generation;
        let name = name.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("fetch-{}", request.instrument))
            .spawn(move || {
                let result = source
                    .fetch(&request)
                    .and_then(|bytes| build_sample_set(&request.instrument, &bytes));
                // Receiver is gone when the loader was dropped mid-fetch
                let _ = tx.send(Completion {
                    generation,
                    name,
                    result,
                });
            });
        if let Err(e) = spawned {
            log::warn!(target: "audio::loader", "Cannot spawn fetch thread: {}", e);
            self.state = LoadState::Failed(LoadError::Fetch(e.to_string()));
        }
        true
    }

    /// Apply finished fetches. Returns true if an instrument became ready.
    pub fn poll(&mut self) -> bool {
        let mut became_ready = false;
        while let Ok(done) = self.rx.try_recv() {
            if done.generation != self.generation {
                log::debug!(
                    target: "audio::loader",
                    "Ignoring stale load of {} (generation {}, current {})",
                    done.name,
                    done.generation,
                    self.generation
                );
                continue;
            }
            match done.result {
                Ok(samples) => {
                    log::info!(
                        target: "audio::loader",
                        "Loaded {} ({} samples)",
                        done.name,
                        samples.len()
                    );
                    self.state = LoadState::Ready(Arc::new(InstrumentHandle {
                        name: done.name,
                        samples,
                    }));
                    became_ready = true;
                }
                Err(e) => {
                    log::warn!(target: "audio::loader", "Failed to load {}: {}", done.name, e);
                    self.state = LoadState::Failed(e);
                }
            }
        }
        became_ready
    }

    /// The ready instrument, if any.
    pub fn handle(&self) -> Option<&Arc<InstrumentHandle>> {
        match &self.state {
            LoadState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    /// True until an instrument is ready. A failed fetch leaves the loader
    /// loading until the next request succeeds.
    pub fn is_loading(&self) -> bool {
        !self.is_ready()
    }

    /// A fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }

    pub fn last_error(&self) -> Option<&LoadError> {
        match &self.state {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Display name of the most recently requested instrument.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
