//! Output backend using cpal: a small in-process sampler mixing one-shot
//! sample voices into the default output device.
//!
//! The mixer lives inside the stream callback. The main thread only sends it
//! commands over a channel, so the callback never waits on a lock.

use std::cell::Cell;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};

use crate::backend::{AudioBackend, BackendError, BackendResult, SampleData, VoiceId};

/// Release fade length applied when a voice is stopped.
const RELEASE_SECS: f32 = 0.2;
const VOICE_GAIN: f32 = 0.6;
/// Callback buffer preallocated per channel; larger device buffers grow it once.
const SCRATCH_FRAMES: usize = 4096;

struct MixVoice {
    id: VoiceId,
    samples: Arc<Vec<f32>>,
    position: f64,
    /// Source frames advanced per output frame.
    step: f64,
    gain: f32,
    /// Gain removed per output frame once released.
    release: Option<f32>,
}

pub(crate) enum MixerCommand {
    Start {
        id: VoiceId,
        samples: Arc<Vec<f32>>,
        sample_rate: u32,
    },
    Release(VoiceId),
}

impl MixerCommand {
    fn start(id: VoiceId, sample: &SampleData) -> Self {
        MixerCommand::Start {
            id,
            samples: Arc::clone(&sample.samples),
            sample_rate: sample.sample_rate,
        }
    }
}

/// Voices currently sounding. Owned by the cpal callback.
pub(crate) struct Mixer {
    voices: Vec<MixVoice>,
    output_rate: u32,
}

impl Mixer {
    pub(crate) fn new(output_rate: u32) -> Self {
        Self {
            voices: Vec::new(),
            output_rate,
        }
    }

    pub(crate) fn apply(&mut self, command: MixerCommand) {
        match command {
            MixerCommand::Start {
                id,
                samples,
                sample_rate,
            } => self.start(id, samples, sample_rate),
            MixerCommand::Release(id) => self.release(id),
        }
    }

    /// Apply everything queued since the last callback.
    pub(crate) fn drain(&mut self, commands: &Receiver<MixerCommand>) {
        while let Ok(command) = commands.try_recv() {
            self.apply(command);
        }
    }

    fn start(&mut self, id: VoiceId, samples: Arc<Vec<f32>>, sample_rate: u32) {
        let step = sample_rate as f64 / self.output_rate.max(1) as f64;
        self.voices.push(MixVoice {
            id,
            samples,
            position: 0.0,
            step,
            gain: VOICE_GAIN,
            release: None,
        });
    }

    fn release(&mut self, id: VoiceId) {
        let per_frame = VOICE_GAIN / (RELEASE_SECS * self.output_rate as f32).max(1.0);
        if let Some(voice) = self.voices.iter_mut().find(|v| v.id == id) {
            voice.release.get_or_insert(per_frame);
        }
    }

    #[cfg(test)]
    pub(crate) fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Fill an interleaved buffer. Every channel gets the same mono mix.
    pub(crate) fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let mut mix = 0.0f32;
            for voice in self.voices.iter_mut() {
                let idx = voice.position as usize;
                if idx + 1 >= voice.samples.len() {
                    voice.gain = 0.0;
                    continue;
                }
                let frac = (voice.position - idx as f64) as f32;
                let a = voice.samples[idx];
                let b = voice.samples[idx + 1];
                mix += (a + (b - a) * frac) * voice.gain;
                voice.position += voice.step;
                if let Some(step) = voice.release {
                    voice.gain = (voice.gain - step).max(0.0);
                }
            }
            let value = mix.clamp(-1.0, 1.0);
            for sample in frame.iter_mut() {
                *sample = value;
            }
            self.voices.retain(|v| v.gain > 0.0);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut mixer: Mixer,
    commands: Receiver<MixerCommand>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * channels.max(1)];

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            mixer.drain(&commands);
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let mixed = &mut scratch[..data.len()];
            mixer.render(mixed, channels);
            for (out, &value) in data.iter_mut().zip(mixed.iter()) {
                *out = cpal::Sample::from_sample(value);
            }
        },
        |err| {
            log::error!(target: "audio::output", "Audio output error: {}", err);
        },
        None,
    )
}

/// Default output device backend. Created paused; `resume` starts the stream
/// on the first note.
pub struct CpalBackend {
    stream: Stream,
    commands: Sender<MixerCommand>,
    suspended: Cell<bool>,
    next_voice: Cell<u64>,
    sample_rate: u32,
}

impl CpalBackend {
    pub fn new() -> Result<Self, BackendError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| BackendError("No output device available".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| BackendError(format!("Failed to get output config: {}", e)))?;

        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate().0;
        let config: StreamConfig = supported.into();
        let mixer = Mixer::new(sample_rate);
        let (commands, command_rx) = crossbeam_channel::unbounded();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer, command_rx),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer, command_rx),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer, command_rx),
            other => {
                return Err(BackendError(format!(
                    "Unsupported output sample format {:?}",
                    other
                )))
            }
        }
        .map_err(|e| BackendError(format!("Failed to build output stream: {}", e)))?;
        stream
            .pause()
            .map_err(|e| BackendError(format!("Failed to pause output stream: {}", e)))?;

        log::info!(
            target: "audio::output",
            "Output device ready: {} Hz, {} channels, {:?}",
            sample_rate,
            config.channels,
            sample_format
        );

        Ok(Self {
            stream,
            commands,
            suspended: Cell::new(true),
            next_voice: Cell::new(1),
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&self, command: MixerCommand) -> BackendResult {
        self.commands
            .send(command)
            .map_err(|_| BackendError("output stream has stopped".to_string()))
    }
}

impl AudioBackend for CpalBackend {
    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn resume(&self) -> BackendResult {
        if !self.suspended.get() {
            return Ok(());
        }
        self.stream
            .play()
            .map_err(|e| BackendError(format!("Failed to start output stream: {}", e)))?;
        self.suspended.set(false);
        log::debug!(target: "audio::output", "Output resumed");
        Ok(())
    }

    fn start_voice(&self, sample: &SampleData) -> BackendResult<VoiceId> {
        let id = VoiceId(self.next_voice.get());
        self.next_voice.set(id.0 + 1);
        self.send(MixerCommand::start(id, sample))?;
        Ok(id)
    }

    fn stop_voice(&self, voice: VoiceId) -> BackendResult {
        self.send(MixerCommand::Release(voice))
    }
}
