//! Harmonic/percussive decomposition via median filtering.
//!
//! Harmonic content is temporally continuous (horizontal ridges in the
//! magnitude spectrogram), percussive content is spectrally broadband
//! (vertical ridges). Median-filtering the magnitudes along each axis and
//! building soft masks from the two estimates splits the signal into the
//! two components. Margins sharpen the masks: a component only claims a
//! bin where its estimate dominates the other by at least that factor.

use ndarray::Array2;

use crate::core::dsp::{istft, stft};
use crate::error::Result;

/// Median filter widths and mask margins for one decomposition.
#[derive(Debug, Clone, Copy)]
pub struct HpssParams {
    /// Width of the horizontal (time) median filter in frames.
    pub harmonic_width: usize,
    /// Width of the vertical (frequency) median filter in bins.
    pub percussive_width: usize,
    /// Harmonic mask margin.
    pub harmonic_margin: f32,
    /// Percussive mask margin. Raising this keeps only strongly
    /// transient-dominated bins in the percussive output.
    pub percussive_margin: f32,
}

impl Default for HpssParams {
    fn default() -> Self {
        Self {
            harmonic_width: 17,
            percussive_width: 17,
            harmonic_margin: 1.0,
            percussive_margin: 1.0,
        }
    }
}

/// Splits a mono signal into `(harmonic, percussive)` components, both at
/// the input length. Inputs shorter than one analysis frame pass through
/// as all-harmonic.
pub fn hpss(
    input: &[f32],
    n_fft: usize,
    hop: usize,
    params: &HpssParams,
) -> Result<(Vec<f32>, Vec<f32>)> {
    if input.len() < n_fft {
        return Ok((input.to_vec(), vec![0.0; input.len()]));
    }

    let spec = stft(input, n_fft, hop)?;
    let frames = spec.len();
    let bins = n_fft / 2 + 1;

    let mut mags = Array2::<f32>::zeros((frames, bins));
    for (fr, frame) in spec.iter().enumerate() {
        for (bin, c) in frame.iter().enumerate() {
            mags[[fr, bin]] = c.norm();
        }
    }

    let harmonic_mags = median_filter_time(&mags, params.harmonic_width);
    let percussive_mags = median_filter_freq(&mags, params.percussive_width);

    // Margin-weighted Wiener masks. With margins above 1 the masks no
    // longer sum to 1: ambiguous bins are claimed by neither component.
    let eps = 1e-10f32;
    let mut harm_spec = spec.clone();
    let mut perc_spec = spec;

    for fr in 0..frames {
        for bin in 0..bins {
            let h = harmonic_mags[[fr, bin]];
            let p = percussive_mags[[fr, bin]];

            let h2 = h * h;
            let p2 = p * p;
            let h_ref = params.harmonic_margin * p;
            let p_ref = params.percussive_margin * h;

            let h_mask = h2 / (h2 + h_ref * h_ref + eps);
            let p_mask = p2 / (p2 + p_ref * p_ref + eps);

            harm_spec[fr][bin] = harm_spec[fr][bin] * h_mask;
            perc_spec[fr][bin] = perc_spec[fr][bin] * p_mask;
        }
    }

    let harmonic = istft(&harm_spec, n_fft, hop, input.len())?;
    let percussive = istft(&perc_spec, n_fft, hop, input.len())?;
    Ok((harmonic, percussive))
}

/// Median over a window of `width` frames centered on each frame, per bin.
/// Enhances temporally stable components.
fn median_filter_time(mags: &Array2<f32>, width: usize) -> Array2<f32> {
    let (frames, bins) = mags.dim();
    let half = width / 2;
    let mut result = Array2::<f32>::zeros((frames, bins));
    let mut scratch: Vec<f32> = Vec::with_capacity(width);

    for fr in 0..frames {
        let start = fr.saturating_sub(half);
        let end = (fr + half + 1).min(frames);
        for bin in 0..bins {
            scratch.clear();
            for f in start..end {
                scratch.push(mags[[f, bin]]);
            }
            result[[fr, bin]] = median(&mut scratch);
        }
    }
    result
}

/// Median over a window of `width` bins centered on each bin, per frame.
/// Enhances spectrally broad components.
fn median_filter_freq(mags: &Array2<f32>, width: usize) -> Array2<f32> {
    let (frames, bins) = mags.dim();
    let half = width / 2;
    let mut result = Array2::<f32>::zeros((frames, bins));
    let mut scratch: Vec<f32> = Vec::with_capacity(width);

    for fr in 0..frames {
        for bin in 0..bins {
            let start = bin.saturating_sub(half);
            let end = (bin + half + 1).min(bins);
            scratch.clear();
            for b in start..end {
                scratch.push(mags[[fr, b]]);
            }
            result[[fr, bin]] = median(&mut scratch);
        }
    }
    result
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values[values.len() / 2]
}
