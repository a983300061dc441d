//! Instrument asset sources: where manifests come from.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::soundfont::{LoadError, SampleSetRequest};

/// Delivers raw manifest bytes for a sample-set request. Called from the
/// loader's fetch threads.
pub trait SampleSource: Send + Sync {
    fn fetch(&self, request: &SampleSetRequest) -> Result<Vec<u8>, LoadError>;
}

/// Local mirror of the content host: `<root>/<soundfont>/<instrument>-<format>.js`.
pub struct DirSampleSource {
    root: PathBuf,
}

impl DirSampleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SampleSource for DirSampleSource {
    fn fetch(&self, request: &SampleSetRequest) -> Result<Vec<u8>, LoadError> {
        let path = self.root.join(request.relative_path());
        std::fs::read(&path).map_err(|e| LoadError::Fetch(format!("{}: {}", path.display(), e)))
    }
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest manifest accepted; the biggest MusyngKite sets are around 5 MB.
const MAX_MANIFEST_BYTES: u64 = 32 * 1024 * 1024;

/// The content host itself, fetched over HTTP(S) at [`SampleSetRequest::url`].
pub struct HttpSampleSource {
    agent: ureq::Agent,
}

impl HttpSampleSource {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build(),
        }
    }
}

impl Default for HttpSampleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for HttpSampleSource {
    fn fetch(&self, request: &SampleSetRequest) -> Result<Vec<u8>, LoadError> {
        let url = request.url();
        let response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => LoadError::Fetch(format!("{}: HTTP {}", url, code)),
            ureq::Error::Transport(t) => LoadError::Fetch(format!("{}: {}", url, t)),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_MANIFEST_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| LoadError::Fetch(format!("{}: {}", url, e)))?;
        log::debug!(target: "audio::source", "Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }
}

/// Where sample sets are fetched from, chosen by the configured host:
/// `http://` and `https://` hosts go over the network, anything else names a
/// local mirror directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleHost {
    Http(String),
    Dir(PathBuf),
}

impl SampleHost {
    pub fn parse(host: &str) -> Self {
        let host = host.trim();
        let lower = host.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SampleHost::Http(host.trim_end_matches('/').to_string())
        } else {
            SampleHost::Dir(PathBuf::from(host))
        }
    }

    /// Base that request URLs and paths are built on.
    pub fn base(&self) -> String {
        match self {
            SampleHost::Http(url) => url.clone(),
            SampleHost::Dir(root) => root.display().to_string(),
        }
    }

    pub fn source(&self) -> Arc<dyn SampleSource> {
        match self {
            SampleHost::Http(url) => {
                log::info!(target: "audio::source", "Fetching instruments from {}", url);
                Arc::new(HttpSampleSource::new())
            }
            SampleHost::Dir(root) => {
                log::info!(target: "audio::source", "Reading instruments from {}", root.display());
                Arc::new(DirSampleSource::new(root.clone()))
            }
        }
    }
}

/// In-memory manifests keyed by soundfont instrument name. Counts fetches.
#[derive(Default)]
pub struct StaticSampleSource {
    manifests: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl StaticSampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(mut self, instrument: &str, manifest: impl Into<Vec<u8>>) -> Self {
        self.manifests.insert(instrument.to_string(), manifest.into());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SampleSource for StaticSampleSource {
    fn fetch(&self, request: &SampleSetRequest) -> Result<Vec<u8>, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .get(&request.instrument)
            .cloned()
            .ok_or_else(|| LoadError::Fetch(format!("404: {}", request.url())))
    }
}
