//! Duration and pitch manipulation for mix tracks.
//!
//! Time stretching is a standard phase vocoder: analysis frames are taken
//! at a fixed hop, resynthesized at a scaled hop, and bin phases are
//! advanced by their measured instantaneous frequency so tonal content
//! stays coherent. Pitch shifting is a stretch followed by a sinc resample
//! back to the original duration.

use std::f32::consts::PI;

use num_complex::Complex32;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use rustfft::num_traits::Zero;

use crate::core::dsp::hann_window;
use crate::error::{Result, StudioError};

const TWO_PI: f32 = 2.0 * PI;

const FFT_SIZE: usize = 2048;
const HOP_ANALYSIS: usize = 512;

/// Stretches a mono signal by `rate`: the output runs `1/rate` times the
/// input duration at unchanged pitch. Inputs shorter than one analysis
/// frame pass through unchanged.
pub fn time_stretch(input: &[f32], rate: f64) -> Result<Vec<f32>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(StudioError::DspComputation(format!(
            "invalid stretch rate {rate}"
        )));
    }
    if input.len() < FFT_SIZE {
        return Ok(input.to_vec());
    }

    let stretch_ratio = 1.0 / rate;
    let hop_synthesis = ((HOP_ANALYSIS as f64 * stretch_ratio).round() as usize).max(1);

    let num_bins = FFT_SIZE / 2 + 1;
    let num_frames = (input.len() - FFT_SIZE) / HOP_ANALYSIS + 1;
    let output_len = (num_frames - 1) * hop_synthesis + FFT_SIZE;

    let window = hann_window(FFT_SIZE);
    let mut planner = rustfft::FftPlanner::new();
    let fft_forward = planner.plan_fft_forward(FFT_SIZE);
    let fft_inverse = planner.plan_fft_inverse(FFT_SIZE);
    let norm = 1.0 / FFT_SIZE as f32;

    let expected_phase_advance: Vec<f32> = (0..num_bins)
        .map(|bin| TWO_PI * bin as f32 * HOP_ANALYSIS as f32 / FFT_SIZE as f32)
        .collect();

    let mut output = vec![0.0f32; output_len];
    let mut window_sum = vec![0.0f32; output_len];
    let mut fft_buffer = vec![Complex32::zero(); FFT_SIZE];
    let mut prev_phase = vec![0.0f32; num_bins];
    let mut phase_accum = vec![0.0f32; num_bins];

    let hop_ratio = hop_synthesis as f32 / HOP_ANALYSIS as f32;

    for frame_idx in 0..num_frames {
        let analysis_pos = frame_idx * HOP_ANALYSIS;
        let synthesis_pos = frame_idx * hop_synthesis;

        for (i, (&sample, &win)) in input[analysis_pos..analysis_pos + FFT_SIZE]
            .iter()
            .zip(window.iter())
            .enumerate()
        {
            fft_buffer[i] = Complex32::new(sample * win, 0.0);
        }
        fft_forward.process(&mut fft_buffer);

        for bin in 0..num_bins {
            let c = fft_buffer[bin];
            let magnitude = c.norm();
            let phase = c.arg();

            // Deviation from the expected advance gives the true bin
            // frequency; accumulate it at the synthesis hop.
            let expected = expected_phase_advance[bin];
            let deviation = wrap_phase(phase - prev_phase[bin] - expected);
            phase_accum[bin] += (expected + deviation) * hop_ratio;
            prev_phase[bin] = phase;

            fft_buffer[bin] = Complex32::from_polar(magnitude, phase_accum[bin]);
        }
        for bin in 1..num_bins - 1 {
            fft_buffer[FFT_SIZE - bin] = fft_buffer[bin].conj();
        }

        fft_inverse.process(&mut fft_buffer);

        let out_end = (synthesis_pos + FFT_SIZE).min(output_len);
        for i in 0..out_end - synthesis_pos {
            let out_idx = synthesis_pos + i;
            output[out_idx] += fft_buffer[i].re * norm * window[i];
            window_sum[out_idx] += window[i] * window[i];
        }
    }

    // Clamp the window-sum divisor so low-overlap edges are not amplified.
    let max_ws = window_sum.iter().cloned().fold(0.0f32, f32::max);
    let min_ws = (max_ws * 0.1).max(1e-6);
    for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
        *sample /= ws.max(min_ws);
    }

    Ok(output)
}

/// Shifts a mono signal by `semitones` at unchanged duration: stretch by
/// `2^(-semitones/12)`, then resample by the same factor back to the
/// original length.
pub fn pitch_shift(input: &[f32], semitones: f64) -> Result<Vec<f32>> {
    if input.len() < FFT_SIZE {
        return Ok(input.to_vec());
    }
    let factor = 2f64.powf(-semitones / 12.0);
    let stretched = time_stretch(input, factor)?;
    resample(&stretched, factor)
}

/// Sinc resample of a mono signal by `ratio` (output length ≈ input × ratio).
fn resample(input: &[f32], ratio: f64) -> Result<Vec<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1)
        .map_err(|e| StudioError::DspComputation(format!("resampler construction: {e}")))?;

    let output = resampler
        .process(&[input.to_vec()], None)
        .map_err(|e| StudioError::DspComputation(format!("resampling failed: {e}")))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Wraps a phase value to [-PI, PI].
#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let p = phase + PI;
    p - (p / TWO_PI).floor() * TWO_PI - PI
}
