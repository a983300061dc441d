//! Soundfont sample sets: request addressing, manifest parsing and sample
//! decoding.
//!
//! A manifest is the soundfont-player JavaScript file for one instrument:
//!
//! ```text
//! if (typeof(MIDI) === 'undefined') var MIDI = {};
//! MIDI.Soundfont.acoustic_grand_piano = {
//! "A0": "data:audio/mp3;base64,//sxxAAA...",
//! ...
//! }
//! ```
//!
//! Each entry is a flat-spelled sample name mapped to a base64 data URI.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use livekeys_types::MidiNumber;

use crate::backend::SampleData;

/// Error loading an instrument sample set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The asset source could not deliver the manifest.
    Fetch(String),
    /// The manifest text is not a soundfont object.
    Manifest(String),
    /// A sample's data URI or audio payload could not be decoded.
    Decode { sample: String, reason: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Fetch(e) => write!(f, "fetch failed: {}", e),
            LoadError::Manifest(e) => write!(f, "bad manifest: {}", e),
            LoadError::Decode { sample, reason } => {
                write!(f, "cannot decode sample {}: {}", sample, reason)
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Fetch(e.to_string())
    }
}

/// Soundfont collection hosted by the content server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Soundfont {
    #[default]
    MusyngKite,
    #[serde(rename = "FluidR3_GM")]
    FluidR3Gm,
}

impl Soundfont {
    pub fn as_str(self) -> &'static str {
        match self {
            Soundfont::MusyngKite => "MusyngKite",
            Soundfont::FluidR3Gm => "FluidR3_GM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MusyngKite" => Some(Soundfont::MusyngKite),
            "FluidR3_GM" => Some(Soundfont::FluidR3Gm),
            _ => None,
        }
    }
}

/// Encoding of the samples inside a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[default]
    Mp3,
    Ogg,
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Mp3 => "mp3",
            SampleFormat::Ogg => "ogg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mp3" => Some(SampleFormat::Mp3),
            "ogg" => Some(SampleFormat::Ogg),
            _ => None,
        }
    }
}

/// Address of one instrument's manifest on the content host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSetRequest {
    pub host: String,
    pub soundfont: Soundfont,
    pub format: SampleFormat,
    /// Soundfont instrument name, e.g. `acoustic_grand_piano`.
    pub instrument: String,
}

impl SampleSetRequest {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            self.relative_path().display()
        )
    }

    /// `{soundfont}/{instrument}-{format}.js`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.soundfont.as_str()).join(format!(
            "{}-{}.js",
            self.instrument,
            self.format.as_str()
        ))
    }
}

/// Decoded samples for one instrument, keyed by flat-spelled sample name.
#[derive(Debug, Clone)]
pub struct SampleSet {
    instrument: String,
    samples: HashMap<String, SampleData>,
}

impl SampleSet {
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn sample(&self, midi: MidiNumber) -> Option<&SampleData> {
        self.samples.get(&midi.sample_name())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Extract the `sample name → data URI` object from a manifest. Accepts the
/// JavaScript wrapper or a bare JSON object; a trailing comma before the
/// closing brace is tolerated.
pub fn parse_manifest(text: &str) -> Result<BTreeMap<String, String>, LoadError> {
    let open = match text.rfind("= {") {
        Some(i) => i + 2,
        None => text
            .find('{')
            .ok_or_else(|| LoadError::Manifest("no object found".to_string()))?,
    };
    let close = text
        .rfind('}')
        .filter(|&i| i > open)
        .ok_or_else(|| LoadError::Manifest("unterminated object".to_string()))?;

    let body = text[open + 1..close].trim_end().trim_end_matches(',');
    let json = format!("{{{}}}", body);
    serde_json::from_str(&json).map_err(|e| LoadError::Manifest(e.to_string()))
}

/// Split a `data:audio/<fmt>;base64,<payload>` URI into a file extension
/// hint and the decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(&'static str, Vec<u8>), String> {
    let (header, payload) = uri.split_once(',').ok_or("missing ',' in data URI")?;
    let mime = header
        .strip_prefix("data:")
        .and_then(|h| h.strip_suffix(";base64"))
        .ok_or("not a base64 data URI")?;
    let ext = match mime {
        "audio/mp3" | "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/wave" | "audio/x-wav" => "wav",
        other => return Err(format!("unsupported media type {}", other)),
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("base64: {}", e))?;
    Ok((ext, bytes))
}

/// Decode an encoded sample to mono f32 frames and its sample rate.
pub fn decode_sample(ext: &str, bytes: Vec<u8>) -> Result<(Vec<f32>, u32), String> {
    if ext == "wav" {
        decode_wav(bytes)
    } else {
        decode_compressed(ext, bytes)
    }
}

fn decode_wav(bytes: Vec<u8>) -> Result<(Vec<f32>, u32), String> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };
    Ok((
        mix_to_mono(&interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

fn decode_compressed(ext: &str, bytes: Vec<u8>) -> Result<(Vec<f32>, u32), String> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(ext);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| format!("unrecognized audio format: {}", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or("no audio track")?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(44_100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| format!("codec: {}", e))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("read: {}", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(format!("decode: {}", e)),
        };
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        mono.extend(mix_to_mono(buf.samples(), spec.channels.count()));
    }

    if mono.is_empty() {
        return Err("no audio frames".to_string());
    }
    Ok((mono, sample_rate))
}

fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Parse a manifest and decode every sample in it.
pub fn build_sample_set(instrument: &str, manifest: &[u8]) -> Result<SampleSet, LoadError> {
    let text = std::str::from_utf8(manifest)
        .map_err(|e| LoadError::Manifest(format!("not utf-8: {}", e)))?;
    let entries = parse_manifest(text)?;
    if entries.is_empty() {
        return Err(LoadError::Manifest("no samples".to_string()));
    }

    let mut samples = HashMap::with_capacity(entries.len());
    for (name, uri) in entries {
        let decode_err = |reason: String| LoadError::Decode {
            sample: name.clone(),
            reason,
        };
        let (ext, bytes) = decode_data_uri(&uri).map_err(decode_err)?;
        let (frames, rate) = decode_sample(ext, bytes).map_err(decode_err)?;
        let data = SampleData::new(format!("{}/{}", instrument, name), frames, rate);
        samples.insert(name, data);
    }

    Ok(SampleSet {
        instrument: instrument.to_string(),
        samples,
    })
}

/// Encode mono f32 frames as a 16-bit WAV data URI.
pub fn wav_data_uri(frames: &[f32], sample_rate: u32) -> Result<String, String> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| e.to_string())?;
        for &s in frames {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(v).map_err(|e| e.to_string())?;
        }
        writer.finalize().map_err(|e| e.to_string())?;
    }
    Ok(format!(
        "data:audio/wav;base64,{}",
        STANDARD.encode(cursor.into_inner())
    ))
}
