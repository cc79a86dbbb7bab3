use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// Planar stereo audio at a fixed sample rate.
///
/// Every buffer in the pipeline is exactly two channels: mono sources are
/// duplicated on load, extra channels are dropped. The sample rate is set
/// when the buffer is created and only changes through an explicit
/// resampling operation.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if left.len() != right.len() {
            return Err(StudioError::DspComputation(format!(
                "channel length mismatch: left={}, right={}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Builds a stereo buffer from a mono signal by duplicating the channel.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            left: samples.clone(),
            right: samples,
            sample_rate,
        }
    }

    /// Builds a buffer from interleaved samples with the given channel count.
    /// Mono is duplicated, channels beyond the first two are dropped.
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Self {
        match channels {
            0 | 1 => Self::from_mono(samples.to_vec(), sample_rate),
            n => {
                let n = n as usize;
                let frames = samples.len() / n;
                let mut left = Vec::with_capacity(frames);
                let mut right = Vec::with_capacity(frames);
                for frame in samples.chunks_exact(n) {
                    left.push(frame[0]);
                    right.push(frame[1]);
                }
                Self {
                    left,
                    right,
                    sample_rate,
                }
            }
        }
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Sum of squared samples over both channels.
    pub fn energy(&self) -> f64 {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum()
    }

    /// Maximum absolute sample value over both channels.
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    /// Multiplies every sample by `gain` in place.
    pub fn scale(&mut self, gain: f32) {
        for s in self.left.iter_mut().chain(self.right.iter_mut()) {
            *s *= gain;
        }
    }

    /// Average of the two channels.
    pub fn to_mono(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(self.right.iter())
            .map(|(&l, &r)| 0.5 * (l + r))
            .collect()
    }

    /// Interleaved L/R samples, for encoding.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * 2);
        for (&l, &r) in self.left.iter().zip(self.right.iter()) {
            out.push(l);
            out.push(r);
        }
        out
    }

    /// Per-channel sample-wise subtraction. Both buffers must be the same
    /// length and rate.
    pub fn subtract(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        if self.len() != other.len() || self.sample_rate != other.sample_rate {
            return Err(StudioError::DspComputation(format!(
                "buffer mismatch in subtraction: {} @ {} Hz vs {} @ {} Hz",
                self.len(),
                self.sample_rate,
                other.len(),
                other.sample_rate
            )));
        }
        let left = self
            .left
            .iter()
            .zip(other.left.iter())
            .map(|(&a, &b)| a - b)
            .collect();
        let right = self
            .right
            .iter()
            .zip(other.right.iter())
            .map(|(&a, &b)| a - b)
            .collect();
        Ok(AudioBuffer {
            left,
            right,
            sample_rate: self.sample_rate,
        })
    }
}

/// The five stem classes the pipeline can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemLabel {
    Drums,
    Bass,
    Vocals,
    Guitar,
    /// Keys, organs, synths and whatever else the cascade could not place.
    Keys,
}

impl StemLabel {
    pub const ALL: [StemLabel; 5] = [
        StemLabel::Drums,
        StemLabel::Bass,
        StemLabel::Vocals,
        StemLabel::Guitar,
        StemLabel::Keys,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemLabel::Drums => "drums",
            StemLabel::Bass => "bass",
            StemLabel::Vocals => "vocals",
            StemLabel::Guitar => "guitar",
            StemLabel::Keys => "keys",
        }
    }
}

impl std::fmt::Display for StemLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One isolated instrument/vocal signal. Immutable after creation.
#[derive(Clone, Debug)]
pub struct Stem {
    pub label: StemLabel,
    pub buffer: AudioBuffer,
    pub energy: f64,
}

impl Stem {
    pub fn new(label: StemLabel, buffer: AudioBuffer) -> Self {
        let energy = buffer.energy();
        Self {
            label,
            buffer,
            energy,
        }
    }
}

/// Gated stems of one separation request.
pub type SeparationResult = BTreeMap<StemLabel, Stem>;

/// Persisted stem paths returned by the separation entry point.
#[derive(Clone, Debug)]
pub struct SeparationOutput {
    pub stems: BTreeMap<StemLabel, PathBuf>,
    pub sample_rate: u32,
}

/// Per-track effect settings of a mix request.
///
/// Every field has a neutral default so a track descriptor only needs to
/// name the parameters it actually changes. A parameter at its neutral
/// value (within the chain's epsilon) is skipped entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackEffectSpec {
    /// Path of the source stem file.
    pub url: PathBuf,
    /// Playback rate; 2.0 halves the duration without changing pitch.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Pitch shift in semitones, duration preserved.
    #[serde(default)]
    pub pitch: f64,
    /// Soft-clipping drive, 0 = clean.
    #[serde(default)]
    pub distortion: f64,
    /// Single 300 ms echo tap level, 0 = off.
    #[serde(default)]
    pub echo: f64,
    /// Low-pass cutoff in Hz; 20 kHz = full bandwidth.
    #[serde(default = "default_lpf")]
    pub lpf: f64,
    /// High-pass cutoff in Hz; 20 Hz = full bandwidth.
    #[serde(default = "default_hpf")]
    pub hpf: f64,
    /// Single 50 ms early-reflection level, 0 = off.
    #[serde(default)]
    pub reverb: f64,
    /// Uniform gain.
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Stereo position in [-1, 1]; negative is left.
    #[serde(default)]
    pub pan: f64,
}

fn default_speed() -> f64 {
    1.0
}

fn default_lpf() -> f64 {
    20_000.0
}

fn default_hpf() -> f64 {
    20.0
}

fn default_volume() -> f64 {
    1.0
}

impl TrackEffectSpec {
    /// A spec with every effect at its neutral default.
    pub fn neutral(url: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            speed: default_speed(),
            pitch: 0.0,
            distortion: 0.0,
            echo: 0.0,
            lpf: default_lpf(),
            hpf: default_hpf(),
            reverb: 0.0,
            volume: default_volume(),
            pan: 0.0,
        }
    }
}

/// Outcome of a successful mix render.
#[derive(Clone, Debug)]
pub struct MixResult {
    pub output_path: PathBuf,
    pub tracks_mixed: usize,
    pub tracks_skipped: usize,
    pub sample_rate: u32,
}

/// Tunable constants of the DSP separation cascade.
///
/// These are empirically tuned, not physically derived; the defaults track
/// the values the pipeline shipped with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// STFT size for the vocal-mask stage and HPSS.
    pub n_fft: usize,
    /// STFT hop for the vocal-mask stage and HPSS.
    pub hop: usize,
    /// HPSS harmonic margin.
    pub harmonic_margin: f32,
    /// HPSS percussive margin. Kept well above the harmonic margin so only
    /// strongly transient content lands in the drum stem.
    pub percussive_margin: f32,
    /// Bass low-pass cutoff in Hz.
    pub bass_cutoff_hz: f64,
    /// Vocal band-pass edges in Hz.
    pub vocal_low_hz: f64,
    pub vocal_high_hz: f64,
    /// Exponent applied to the inter-channel similarity mask.
    pub vocal_mask_power: u32,
    /// Guitar band-pass edges in Hz.
    pub guitar_low_hz: f64,
    pub guitar_high_hz: f64,
    /// A stem is kept only if its energy exceeds this fraction of the
    /// input energy.
    pub energy_gate_ratio: f64,
    /// Peak target for gated stems and the mix master.
    pub peak_headroom: f32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop: 512,
            harmonic_margin: 1.0,
            percussive_margin: 4.0,
            bass_cutoff_hz: 140.0,
            vocal_low_hz: 120.0,
            vocal_high_hz: 8000.0,
            vocal_mask_power: 4,
            guitar_low_hz: 200.0,
            guitar_high_hz: 4500.0,
            energy_gate_ratio: 0.005,
            peak_headroom: 0.9,
        }
    }
}

/// Settings for the external separation executable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemucsConfig {
    /// Executable to invoke.
    pub binary: String,
    /// Model name passed with `-n`; also the first directory level of the
    /// expected output layout.
    pub model: String,
    /// Concurrency hint passed with `-j`.
    pub jobs: usize,
    /// Wall-clock bound on the subprocess. Timeout is treated identically
    /// to process failure.
    pub timeout_secs: u64,
}

impl Default for DemucsConfig {
    fn default() -> Self {
        Self {
            binary: "demucs".into(),
            model: "htdemucs_6s".into(),
            jobs: 2,
            timeout_secs: 600,
        }
    }
}

/// Which engine(s) a separation request may use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineChoice {
    /// External engine first, DSP cascade on failure or empty result.
    #[default]
    Auto,
    /// External engine only; its failure fails the request.
    External,
    /// DSP cascade only.
    Dsp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeparateOptions {
    pub output_dir: PathBuf,
    pub engine: EngineChoice,
    pub demucs: DemucsConfig,
    pub cascade: CascadeConfig,
}

impl Default for SeparateOptions {
    fn default() -> Self {
        Self {
            output_dir: ".".into(),
            engine: EngineChoice::Auto,
            demucs: DemucsConfig::default(),
            cascade: CascadeConfig::default(),
        }
    }
}
