use std::collections::HashMap;
use std::sync::Mutex;

use num_complex::Complex32;
use once_cell::sync::Lazy;
use rustfft::{num_traits::Zero, FftPlanner};

use crate::error::{Result, StudioError};

/// Complex spectrogram as frames x bins, bins = n_fft/2 + 1.
pub type Spectrogram = Vec<Vec<Complex32>>;

static PLANNER: Lazy<Mutex<FftPlanner<f32>>> = Lazy::new(|| Mutex::new(FftPlanner::new()));

static HANN_CACHE: Lazy<Mutex<HashMap<usize, Vec<f32>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Periodic-ish Hann window, cached per size.
pub fn hann_window(n_fft: usize) -> Vec<f32> {
    let mut cache = HANN_CACHE.lock().expect("hann cache poisoned");
    cache
        .entry(n_fft)
        .or_insert_with(|| compute_hann(n_fft))
        .clone()
}

fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = (n_fft - 1) as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

fn check_params(n_fft: usize, hop: usize) -> Result<()> {
    if n_fft < 2 || hop == 0 || hop > n_fft {
        return Err(StudioError::DspComputation(format!(
            "invalid STFT parameters: n_fft={n_fft}, hop={hop}"
        )));
    }
    Ok(())
}

/// Forward short-time transform of a mono signal with center padding.
///
/// Returns `1 + len/hop` frames of `n_fft/2 + 1` complex bins each.
pub fn stft(signal: &[f32], n_fft: usize, hop: usize) -> Result<Spectrogram> {
    check_params(n_fft, hop)?;

    let t = signal.len();
    let pad = n_fft / 2;
    let padded_len = pad + t + pad;
    let mut sig = vec![0.0f32; padded_len];
    sig[pad..pad + t].copy_from_slice(signal);

    let frames = 1 + (t / hop);
    let bins = n_fft / 2 + 1;

    let fft = PLANNER
        .lock()
        .expect("fft planner poisoned")
        .plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let mut out: Spectrogram = Vec::with_capacity(frames);
    let mut buf = vec![Complex32::zero(); n_fft];

    for fr in 0..frames {
        let start = fr * hop;
        for i in 0..n_fft {
            let s = if start + i < padded_len {
                sig[start + i]
            } else {
                0.0
            };
            buf[i] = Complex32::new(s * window[i], 0.0);
        }
        fft.process(&mut buf);
        out.push(buf[..bins].to_vec());
    }

    Ok(out)
}

/// Inverse short-time transform back to a mono signal of `target_len`
/// samples. Windowed overlap-add with window-sum normalization, then the
/// center padding introduced by [`stft`] is cropped away.
pub fn istft(spec: &Spectrogram, n_fft: usize, hop: usize, target_len: usize) -> Result<Vec<f32>> {
    check_params(n_fft, hop)?;

    let bins = n_fft / 2 + 1;
    if spec.iter().any(|frame| frame.len() != bins) {
        return Err(StudioError::DspComputation(format!(
            "spectrogram bin count does not match n_fft={n_fft}"
        )));
    }

    let pad = n_fft / 2;
    let padded_len = target_len + 2 * pad;

    let ifft = PLANNER
        .lock()
        .expect("fft planner poisoned")
        .plan_fft_inverse(n_fft);
    let window = hann_window(n_fft);
    let scale = 1.0 / (n_fft as f32);

    let mut out = vec![0.0f32; padded_len];
    let mut window_sum = vec![0.0f32; padded_len];
    let mut buf = vec![Complex32::zero(); n_fft];

    for (fr, frame) in spec.iter().enumerate() {
        buf.fill(Complex32::zero());
        buf[..bins].copy_from_slice(frame);

        // Conjugate mirror for the negative frequencies
        for fi in 1..n_fft / 2 {
            buf[n_fft - fi] = buf[fi].conj();
        }
        // DC and Nyquist must be real
        buf[0].im = 0.0;
        buf[n_fft / 2].im = 0.0;

        ifft.process(&mut buf);

        let start = fr * hop;
        for i in 0..n_fft {
            let pos = start + i;
            if pos < padded_len {
                let w = window[i];
                out[pos] += buf[i].re * w * scale;
                window_sum[pos] += w * w;
            }
        }
    }

    for i in 0..padded_len {
        if window_sum[i] > 1e-10 {
            out[i] /= window_sum[i];
        }
    }

    let start = pad.min(out.len());
    let end = (pad + target_len).min(out.len());
    let mut cropped = if end > start {
        out[start..end].to_vec()
    } else {
        Vec::new()
    };
    cropped.resize(target_len, 0.0);
    Ok(cropped)
}
