//! Ordered per-track effect chain.
//!
//! Effects run in a fixed order; any effect whose parameter sits at its
//! neutral default (within a small epsilon) is skipped entirely so an
//! untouched track passes through sample-identical.

use tracing::debug;

use crate::core::filters::{zero_phase_highpass, zero_phase_lowpass};
use crate::error::{Result, StudioError};
use crate::mix::stretch::{pitch_shift, time_stretch};
use crate::types::{AudioBuffer, TrackEffectSpec};

const SPEED_EPS: f64 = 0.01;
const PITCH_EPS: f64 = 0.1;
const LPF_NEUTRAL_HZ: f64 = 19_900.0;
const HPF_NEUTRAL_HZ: f64 = 30.0;

const ECHO_DELAY_SECS: f64 = 0.3;
const ECHO_DECAY: f64 = 0.5;
const REVERB_DELAY_SECS: f64 = 0.05;
const REVERB_DECAY: f64 = 0.4;

/// Rejects parameter values outside the chain's domain before any signal
/// work happens.
pub fn validate_spec(spec: &TrackEffectSpec) -> Result<()> {
    if !(spec.speed.is_finite() && spec.speed > 0.0) {
        return Err(StudioError::EffectParam(format!(
            "speed must be positive, got {}",
            spec.speed
        )));
    }
    if !spec.pitch.is_finite() {
        return Err(StudioError::EffectParam(format!(
            "pitch must be finite, got {}",
            spec.pitch
        )));
    }
    if !(spec.volume.is_finite() && spec.volume >= 0.0) {
        return Err(StudioError::EffectParam(format!(
            "volume must be non-negative, got {}",
            spec.volume
        )));
    }
    if !(-1.0..=1.0).contains(&spec.pan) {
        return Err(StudioError::EffectParam(format!(
            "pan must be in [-1, 1], got {}",
            spec.pan
        )));
    }
    if spec.distortion < 0.0 || spec.echo < 0.0 || spec.reverb < 0.0 {
        return Err(StudioError::EffectParam(
            "distortion, echo and reverb must be non-negative".into(),
        ));
    }
    if spec.lpf <= 0.0 || spec.hpf <= 0.0 {
        return Err(StudioError::EffectParam(
            "filter cutoffs must be positive".into(),
        ));
    }
    Ok(())
}

/// Applies the full chain to one track, returning a new buffer.
pub fn apply_effects(input: &AudioBuffer, spec: &TrackEffectSpec) -> Result<AudioBuffer> {
    validate_spec(spec)?;

    let mut y = input.clone();
    let sr = y.sample_rate;

    // 1. Time stretch: changes duration, preserves pitch.
    if (spec.speed - 1.0).abs() > SPEED_EPS {
        debug!(speed = spec.speed, "applying time stretch");
        y = AudioBuffer::new(
            time_stretch(&y.left, spec.speed)?,
            time_stretch(&y.right, spec.speed)?,
            sr,
        )?;
    }

    // 2. Pitch shift: preserves duration.
    if spec.pitch.abs() > PITCH_EPS {
        debug!(semitones = spec.pitch, "applying pitch shift");
        y = AudioBuffer::new(
            pitch_shift(&y.left, spec.pitch)?,
            pitch_shift(&y.right, spec.pitch)?,
            sr,
        )?;
    }

    // 3. Distortion: bounded soft clip, output never exceeds full scale.
    if spec.distortion > 0.0 {
        let drive = (1.0 + spec.distortion * 10.0) as f32;
        for s in y.left.iter_mut().chain(y.right.iter_mut()) {
            *s = (*s * drive).tanh();
        }
    }

    // 4. Echo: one feed-forward tap, no recursive feedback.
    if spec.echo > 0.0 {
        let delay = (sr as f64 * ECHO_DELAY_SECS) as usize;
        let decay = (ECHO_DECAY * spec.echo) as f32;
        add_delayed_tap(&mut y, delay, decay);
    }

    // 5. Filters, each only when the cutoff moved off full bandwidth.
    let nyquist = sr as f64 / 2.0;
    if spec.lpf < LPF_NEUTRAL_HZ && spec.lpf < nyquist {
        y = AudioBuffer::new(
            zero_phase_lowpass(&y.left, spec.lpf, sr)?,
            zero_phase_lowpass(&y.right, spec.lpf, sr)?,
            sr,
        )?;
    }
    if spec.hpf > HPF_NEUTRAL_HZ {
        y = AudioBuffer::new(
            zero_phase_highpass(&y.left, spec.hpf, sr)?,
            zero_phase_highpass(&y.right, spec.hpf, sr)?,
            sr,
        )?;
    }

    // 6. Reverb: a single short early reflection.
    if spec.reverb > 0.0 {
        let delay = (sr as f64 * REVERB_DELAY_SECS) as usize;
        let decay = (REVERB_DECAY * spec.reverb) as f32;
        add_delayed_tap(&mut y, delay, decay);
    }

    // 7. Pan: linear law, the side opposite the pan direction loses gain.
    if spec.pan != 0.0 {
        let left_gain = (1.0 - spec.pan.max(0.0)) as f32;
        let right_gain = (1.0 - (-spec.pan).max(0.0)) as f32;
        for s in y.left.iter_mut() {
            *s *= left_gain;
        }
        for s in y.right.iter_mut() {
            *s *= right_gain;
        }
    }

    // 8. Volume.
    if (spec.volume - 1.0).abs() > f64::EPSILON {
        y.scale(spec.volume as f32);
    }

    Ok(y)
}

/// Adds `signal[i - delay] * decay` into `signal[i]`, keeping the length
/// unchanged. No-op when the buffer is shorter than the delay.
fn add_delayed_tap(y: &mut AudioBuffer, delay: usize, decay: f32) {
    if y.len() <= delay || decay == 0.0 {
        return;
    }
    for channel in [&mut y.left, &mut y.right] {
        for i in (delay..channel.len()).rev() {
            channel[i] += channel[i - delay] * decay;
        }
    }
}
