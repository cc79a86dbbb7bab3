mod common;

use common::{energy, sine};
use stem_studio_core::filters::{zero_phase_bandpass, zero_phase_highpass, zero_phase_lowpass};
use stem_studio_core::StudioError;

const SR: u32 = 44_100;
const LEN: usize = 44_100;

/// Settle margin excluded from energy measurements, away from the
/// forward/backward pass edges.
const SETTLE: usize = 2048;

fn interior(samples: &[f32]) -> &[f32] {
    &samples[SETTLE..samples.len() - SETTLE]
}

#[test]
fn lowpass_passes_low_and_rejects_high() {
    let low = sine(100.0, 0.5, SR, LEN);
    let high = sine(3000.0, 0.5, SR, LEN);

    let low_out = zero_phase_lowpass(&low, 140.0, SR).unwrap();
    let high_out = zero_phase_lowpass(&high, 140.0, SR).unwrap();

    assert!(
        energy(interior(&low_out)) > 0.5 * energy(interior(&low)),
        "100 Hz should pass a 140 Hz low-pass"
    );
    assert!(
        energy(interior(&high_out)) < 0.01 * energy(interior(&high)),
        "3 kHz should be rejected by a 140 Hz low-pass"
    );
}

#[test]
fn highpass_passes_high_and_rejects_low() {
    let low = sine(100.0, 0.5, SR, LEN);
    let high = sine(3000.0, 0.5, SR, LEN);

    let low_out = zero_phase_highpass(&low, 200.0, SR).unwrap();
    let high_out = zero_phase_highpass(&high, 200.0, SR).unwrap();

    assert!(energy(interior(&high_out)) > 0.5 * energy(interior(&high)));
    assert!(energy(interior(&low_out)) < 0.01 * energy(interior(&low)));
}

#[test]
fn bandpass_rejects_both_sides() {
    let below = sine(80.0, 0.5, SR, LEN);
    let inside = sine(3000.0, 0.5, SR, LEN);
    let above = sine(10_000.0, 0.5, SR, LEN);

    let below_out = zero_phase_bandpass(&below, 200.0, 4500.0, SR).unwrap();
    let inside_out = zero_phase_bandpass(&inside, 200.0, 4500.0, SR).unwrap();
    let above_out = zero_phase_bandpass(&above, 200.0, 4500.0, SR).unwrap();

    assert!(energy(interior(&inside_out)) > 0.5 * energy(interior(&inside)));
    assert!(energy(interior(&below_out)) < 0.01 * energy(interior(&below)));
    assert!(energy(interior(&above_out)) < 0.01 * energy(interior(&above)));
}

/// An in-band tone through a zero-phase filter keeps its waveform
/// alignment: the output is a scaled copy, not a delayed one.
#[test]
fn lowpass_is_zero_phase() {
    let tone = sine(100.0, 0.5, SR, LEN);
    let out = zero_phase_lowpass(&tone, 140.0, SR).unwrap();

    let a = interior(&tone);
    let b = interior(&out);
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum();
    let corr = dot / (energy(a).sqrt() * energy(b).sqrt());

    assert!(
        corr > 0.99,
        "zero-phase output should stay aligned with the input, corr={corr:.4}"
    );
}

#[test]
fn invalid_cutoffs_are_rejected() {
    let tone = sine(100.0, 0.5, SR, 4096);

    assert!(matches!(
        zero_phase_lowpass(&tone, 0.0, SR),
        Err(StudioError::DspComputation(_))
    ));
    assert!(matches!(
        zero_phase_highpass(&tone, 30_000.0, SR),
        Err(StudioError::DspComputation(_))
    ));
    assert!(matches!(
        zero_phase_bandpass(&tone, 4500.0, 200.0, SR),
        Err(StudioError::DspComputation(_))
    ));
}

#[test]
fn filter_preserves_length() {
    let tone = sine(440.0, 0.5, SR, 12_345);
    let out = zero_phase_lowpass(&tone, 1000.0, SR).unwrap();
    assert_eq!(out.len(), tone.len());
}
