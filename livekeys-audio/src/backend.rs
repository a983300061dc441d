//! Audio backend trait: a semantic-level abstraction over the output device.
//!
//! `AudioBackend` captures what the scheduler *means* to do (resume output,
//! start a sampled voice, stop it) independently of how it's done (a cpal
//! output stream mixing decoded samples). This enables unit testing of note
//! scheduling without an audio device.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// `Ok(())` unless a voice or the stream failed.
pub type BackendResult<T = ()> = Result<T, BackendError>;

/// Output stream or voice failure, as text.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

/// Handle for one sounding voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Decoded sample: mono f32 frames at the original sample rate.
#[derive(Debug, Clone)]
pub struct SampleData {
    /// `<instrument>/<sample name>`, e.g. `reed_organ/Db4`.
    pub name: String,
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
}

impl SampleData {
    pub fn new(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            samples: Arc::new(samples),
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }
}

/// Output for sampled voices.
///
/// One backend is the session's audio context; every participant lane shares
/// it. Output may start suspended (no device activity until the first note)
/// and must be resumed before voices are audible.
pub trait AudioBackend {
    /// Whether output is currently suspended.
    fn is_suspended(&self) -> bool;

    /// Resume suspended output. No-op if already running.
    fn resume(&self) -> BackendResult;

    /// Start playing a sample from its beginning.
    fn start_voice(&self, sample: &SampleData) -> BackendResult<VoiceId>;

    /// Release a voice. Unknown or finished voices are ignored.
    fn stop_voice(&self, voice: VoiceId) -> BackendResult;
}

// ─── Test Backend ──────────────────────────────────────────────────

/// Recorded backend operation for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOp {
    Resume,
    StartVoice { voice: VoiceId, sample: String },
    StopVoice(VoiceId),
}

/// Records every resume/start/stop so tests can assert on what a lane did.
/// Never fails. Shareable through `Arc<TestBackend>`.
pub struct TestBackend {
    ops: Mutex<Vec<TestOp>>,
    next_voice: AtomicU64,
    suspended: AtomicBool,
}

impl TestBackend {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            next_voice: AtomicU64::new(1),
            suspended: AtomicBool::new(false),
        }
    }

    /// A backend that starts suspended, like a freshly created audio context.
    pub fn suspended() -> Self {
        let backend = Self::new();
        backend.suspended.store(true, Ordering::SeqCst);
        backend
    }

    /// Snapshot of the log so far.
    pub fn operations(&self) -> Vec<TestOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Forget what was recorded.
    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn count(&self, matches: impl Fn(&TestOp) -> bool) -> usize {
        self.ops.lock().unwrap().iter().filter(|&op| matches(op)).count()
    }

    /// Sample names of all started voices, in order.
    pub fn samples_started(&self) -> Vec<String> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                TestOp::StartVoice { sample, .. } => Some(sample.clone()),
                _ => None,
            })
            .collect()
    }

    /// Voices started and not yet stopped.
    pub fn live_voices(&self) -> Vec<VoiceId> {
        let ops = self.ops.lock().unwrap();
        let mut live = Vec::new();
        for op in ops.iter() {
            match op {
                TestOp::StartVoice { voice, .. } => live.push(*voice),
                TestOp::StopVoice(voice) => live.retain(|v| v != voice),
                TestOp::Resume => {}
            }
        }
        live
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for TestBackend {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    fn resume(&self) -> BackendResult {
        self.suspended.store(false, Ordering::SeqCst);
        self.ops.lock().unwrap().push(TestOp::Resume);
        Ok(())
    }

    fn start_voice(&self, sample: &SampleData) -> BackendResult<VoiceId> {
        let voice = VoiceId(self.next_voice.fetch_add(1, Ordering::SeqCst));
        self.ops.lock().unwrap().push(TestOp::StartVoice {
            voice,
            sample: sample.name.clone(),
        });
        Ok(voice)
    }

    fn stop_voice(&self, voice: VoiceId) -> BackendResult {
        self.ops.lock().unwrap().push(TestOp::StopVoice(voice));
        Ok(())
    }
}

/// Wraps `Arc<TestBackend>` to implement `AudioBackend` so the scheduler can
/// own it while the test keeps a handle for assertions.
pub struct SharedTestBackend(pub Arc<TestBackend>);

impl AudioBackend for SharedTestBackend {
    fn is_suspended(&self) -> bool {
        self.0.is_suspended()
    }
    fn resume(&self) -> BackendResult {
        self.0.resume()
    }
    fn start_voice(&self, sample: &SampleData) -> BackendResult<VoiceId> {
        self.0.start_voice(sample)
    }
    fn stop_voice(&self, voice: VoiceId) -> BackendResult {
        self.0.stop_voice(voice)
    }
}

// ─── Null Backend ──────────────────────────────────────────────────

/// Backend that accepts everything and produces no sound. Used when no
/// output device is available.
pub struct NullBackend {
    next_voice: AtomicU64,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            next_voice: AtomicU64::new(1),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn is_suspended(&self) -> bool {
        false
    }
    fn resume(&self) -> BackendResult {
        Ok(())
    }
    fn start_voice(&self, _: &SampleData) -> BackendResult<VoiceId> {
        Ok(VoiceId(self.next_voice.fetch_add(1, Ordering::Relaxed)))
    }
    fn stop_voice(&self, _: VoiceId) -> BackendResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> SampleData {
        SampleData::new(name, vec![0.0; 4], 44_100)
    }

    #[test]
    fn test_backend_tracks_live_voices() {
        let backend = TestBackend::new();
        let a = backend.start_voice(&sample("piano/C4")).unwrap();
        let b = backend.start_voice(&sample("piano/D4")).unwrap();
        assert_ne!(a, b);
        backend.stop_voice(a).unwrap();
        assert_eq!(backend.live_voices(), vec![b]);
        assert_eq!(backend.samples_started(), vec!["piano/C4", "piano/D4"]);
    }

    #[test]
    fn suspended_backend_resumes() {
        let backend = TestBackend::suspended();
        assert!(backend.is_suspended());
        backend.resume().unwrap();
        assert!(!backend.is_suspended());
        assert_eq!(backend.count(|op| *op == TestOp::Resume), 1);
    }
}
