//! Deterministic five-stem separation cascade.
//!
//! Each stage extracts one stem and subtracts it from the running residual
//! before the next stage runs, so the stems never double-count energy. The
//! stage heuristics (transient density, frequency band, stereo placement)
//! only approximate true instrument separation; this engine exists as an
//! explainable fallback for when the external model is unavailable.

use std::collections::BTreeMap;
use std::path::Path;

use num_complex::Complex32;
use tracing::debug;

use crate::audio::read_audio;
use crate::core::dsp::{istft, stft};
use crate::core::filters::{zero_phase_bandpass, zero_phase_lowpass};
use crate::core::hpss::{hpss, HpssParams};
use crate::engine::SeparationEngine;
use crate::error::Result;
use crate::types::{AudioBuffer, CascadeConfig, StemLabel};

pub struct CascadeEngine {
    config: CascadeConfig,
}

impl CascadeEngine {
    pub fn new(config: CascadeConfig) -> Self {
        Self { config }
    }

    /// Runs the cascade over a loaded stereo buffer. Candidates are
    /// returned ungated; the orchestrator applies the energy gate.
    pub fn separate_buffer(&self, y: &AudioBuffer) -> Result<BTreeMap<StemLabel, AudioBuffer>> {
        let cfg = &self.config;
        let sr = y.sample_rate;

        // Stage 1: drums. The percussive margin is kept well above the
        // harmonic margin so only transient-dominated bins land here.
        let params = HpssParams {
            harmonic_margin: cfg.harmonic_margin,
            percussive_margin: cfg.percussive_margin,
            ..HpssParams::default()
        };
        let (res_l, res_r) = rayon::join(
            || hpss(&y.left, cfg.n_fft, cfg.hop, &params),
            || hpss(&y.right, cfg.n_fft, cfg.hop, &params),
        );
        let (harm_l, perc_l) = res_l?;
        let (harm_r, perc_r) = res_r?;
        let drums = AudioBuffer::new(perc_l, perc_r, sr)?;
        let harmonic = AudioBuffer::new(harm_l, harm_r, sr)?;
        debug!(energy = drums.energy(), "cascade: drums extracted");

        // Stage 2: bass, low-passed out of the harmonic residual.
        let bass = AudioBuffer::new(
            zero_phase_lowpass(&harmonic.left, cfg.bass_cutoff_hz, sr)?,
            zero_phase_lowpass(&harmonic.right, cfg.bass_cutoff_hz, sr)?,
            sr,
        )?;
        let r1 = harmonic.subtract(&bass)?;
        debug!(energy = bass.energy(), "cascade: bass extracted");

        // Stage 3: vocals, via the inter-channel similarity mask.
        let vocals = self.extract_vocals(&r1)?;
        let r2 = r1.subtract(&vocals)?;
        debug!(energy = vocals.energy(), "cascade: vocals extracted");

        // Stage 4: guitar band; what remains is keys/other.
        let guitar = AudioBuffer::new(
            zero_phase_bandpass(&r2.left, cfg.guitar_low_hz, cfg.guitar_high_hz, sr)?,
            zero_phase_bandpass(&r2.right, cfg.guitar_low_hz, cfg.guitar_high_hz, sr)?,
            sr,
        )?;
        let keys = r2.subtract(&guitar)?;
        debug!(
            guitar_energy = guitar.energy(),
            keys_energy = keys.energy(),
            "cascade: guitar/keys split"
        );

        let mut stems = BTreeMap::new();
        stems.insert(StemLabel::Drums, drums);
        stems.insert(StemLabel::Bass, bass);
        stems.insert(StemLabel::Vocals, vocals);
        stems.insert(StemLabel::Guitar, guitar);
        stems.insert(StemLabel::Keys, keys);
        Ok(stems)
    }

    /// Estimates the vocal as the strongly center-panned part of the
    /// residual: per-bin similarity of the channel magnitudes, raised to a
    /// power for selectivity, applied to the mid spectrum, then band
    /// limited to the vocal range and duplicated back to stereo.
    fn extract_vocals(&self, r1: &AudioBuffer) -> Result<AudioBuffer> {
        let cfg = &self.config;
        let len = r1.len();

        if len < cfg.n_fft {
            // Too short for spectral masking; nothing credible to extract.
            return Ok(AudioBuffer::from_mono(vec![0.0; len], r1.sample_rate));
        }

        let (spec_l, spec_r) = rayon::join(
            || stft(&r1.left, cfg.n_fft, cfg.hop),
            || stft(&r1.right, cfg.n_fft, cfg.hop),
        );
        let spec_l = spec_l?;
        let spec_r = spec_r?;

        let eps = 1e-10f32;
        let mut mid: Vec<Vec<Complex32>> = Vec::with_capacity(spec_l.len());
        for (fl, fr) in spec_l.iter().zip(spec_r.iter()) {
            let mut frame = Vec::with_capacity(fl.len());
            for (&l, &r) in fl.iter().zip(fr.iter()) {
                let mag_l = l.norm();
                let mag_r = r.norm();
                let similarity = mag_l.min(mag_r) / (mag_l.max(mag_r) + eps);
                let mask = similarity.powi(cfg.vocal_mask_power as i32);
                frame.push((l + r) * 0.5 * mask);
            }
            mid.push(frame);
        }

        let raw = istft(&mid, cfg.n_fft, cfg.hop, len)?;
        let band = zero_phase_bandpass(&raw, cfg.vocal_low_hz, cfg.vocal_high_hz, r1.sample_rate)?;
        Ok(AudioBuffer::from_mono(band, r1.sample_rate))
    }
}

impl SeparationEngine for CascadeEngine {
    fn label(&self) -> &'static str {
        "dsp-cascade"
    }

    fn separate(&self, input: &Path) -> Result<BTreeMap<StemLabel, AudioBuffer>> {
        let y = read_audio(input)?;
        self.separate_buffer(&y)
    }
}
