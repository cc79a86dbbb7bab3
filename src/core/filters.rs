//! Zero-phase Butterworth filtering.
//!
//! A 4th-order section is two cascaded biquads at the Butterworth pole Q
//! values. Zero-phase response comes from running the cascade forward and
//! then backward over the buffer, which cancels the phase shift and squares
//! the magnitude response, the classic filtfilt scheme.

use std::f64::consts::PI;

use crate::error::{Result, StudioError};

/// Pole Q values of a 4th-order Butterworth filter.
const BUTTERWORTH4_Q: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376];

/// A single biquad (second-order IIR) section, Direct Form I.
///
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
#[derive(Debug, Clone)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    fn lowpass(freq: f64, sample_rate: u32, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate as f64;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w0) / 2.0 / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: (1.0 - cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn highpass(freq: f64, sample_rate: u32, q: f64) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate as f64;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Low,
    High,
}

fn check_cutoff(cutoff: f64, sample_rate: u32) -> Result<()> {
    let nyquist = sample_rate as f64 / 2.0;
    if !(cutoff > 0.0 && cutoff < nyquist) {
        return Err(StudioError::DspComputation(format!(
            "filter cutoff {cutoff} Hz outside (0, {nyquist}) at {sample_rate} Hz"
        )));
    }
    Ok(())
}

fn butterworth4(kind: Kind, cutoff: f64, sample_rate: u32) -> [Biquad; 2] {
    match kind {
        Kind::Low => [
            Biquad::lowpass(cutoff, sample_rate, BUTTERWORTH4_Q[0]),
            Biquad::lowpass(cutoff, sample_rate, BUTTERWORTH4_Q[1]),
        ],
        Kind::High => [
            Biquad::highpass(cutoff, sample_rate, BUTTERWORTH4_Q[0]),
            Biquad::highpass(cutoff, sample_rate, BUTTERWORTH4_Q[1]),
        ],
    }
}

fn run_cascade(sections: &mut [Biquad; 2], samples: &mut [f32]) {
    for s in samples.iter_mut() {
        let mut x = *s as f64;
        for section in sections.iter_mut() {
            x = section.process_sample(x);
        }
        *s = x as f32;
    }
}

fn zero_phase(kind: Kind, samples: &[f32], cutoff: f64, sample_rate: u32) -> Result<Vec<f32>> {
    check_cutoff(cutoff, sample_rate)?;

    let mut out = samples.to_vec();
    let mut sections = butterworth4(kind, cutoff, sample_rate);

    // Forward pass
    run_cascade(&mut sections, &mut out);

    // Backward pass with cleared state cancels the phase shift
    for section in sections.iter_mut() {
        section.reset();
    }
    out.reverse();
    run_cascade(&mut sections, &mut out);
    out.reverse();

    Ok(out)
}

/// 4th-order zero-phase Butterworth low-pass.
pub fn zero_phase_lowpass(samples: &[f32], cutoff: f64, sample_rate: u32) -> Result<Vec<f32>> {
    zero_phase(Kind::Low, samples, cutoff, sample_rate)
}

/// 4th-order zero-phase Butterworth high-pass.
pub fn zero_phase_highpass(samples: &[f32], cutoff: f64, sample_rate: u32) -> Result<Vec<f32>> {
    zero_phase(Kind::High, samples, cutoff, sample_rate)
}

/// Band-pass as a high-pass at `low` followed by a low-pass at `high`,
/// both zero-phase.
pub fn zero_phase_bandpass(
    samples: &[f32],
    low: f64,
    high: f64,
    sample_rate: u32,
) -> Result<Vec<f32>> {
    if low >= high {
        return Err(StudioError::DspComputation(format!(
            "band-pass edges inverted: {low} >= {high}"
        )));
    }
    let hp = zero_phase(Kind::High, samples, low, sample_rate)?;
    zero_phase(Kind::Low, &hp, high, sample_rate)
}
