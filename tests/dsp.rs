mod common;

use approx::assert_abs_diff_eq;
use stem_studio_core::dsp::{istft, stft};
use stem_studio_core::StudioError;

#[test]
fn stft_istft_roundtrip() {
    let n_fft = 1024usize;
    let hop = 256usize;
    let t = 4096usize;

    let mut signal = vec![0.0f32; t];
    signal[100] = 1.0;
    signal[200] = -1.0;
    for (i, s) in signal.iter_mut().enumerate() {
        *s += (i as f32 * 0.01).cos() * 0.1;
    }

    let spec = stft(&signal, n_fft, hop).unwrap();
    assert_eq!(spec.len(), 1 + t / hop);
    assert_eq!(spec[0].len(), n_fft / 2 + 1);

    let rec = istft(&spec, n_fft, hop, t).unwrap();
    assert_eq!(rec.len(), t);

    let margin = n_fft;
    for i in margin..(t - margin) {
        assert_abs_diff_eq!(rec[i], signal[i], epsilon = 1e-3);
    }
}

#[test]
fn stft_roundtrip_sine() {
    let sr = 44_100u32;
    let t = 22_050usize;
    let signal = common::sine(440.0, 0.5, sr, t);

    let spec = stft(&signal, 2048, 512).unwrap();
    let rec = istft(&spec, 2048, 512, t).unwrap();

    let margin = 2048;
    for i in margin..(t - margin) {
        assert_abs_diff_eq!(rec[i], signal[i], epsilon = 1e-3);
    }
}

#[test]
fn stft_rejects_bad_params() {
    let signal = vec![0.0f32; 1024];
    assert!(matches!(
        stft(&signal, 1024, 0),
        Err(StudioError::DspComputation(_))
    ));
    assert!(matches!(
        stft(&signal, 256, 512),
        Err(StudioError::DspComputation(_))
    ));
}

#[test]
fn istft_rejects_bin_mismatch() {
    let signal = vec![0.1f32; 2048];
    let spec = stft(&signal, 512, 128).unwrap();
    // Claiming a different n_fft than the spectrogram was built with
    assert!(matches!(
        istft(&spec, 1024, 128, 2048),
        Err(StudioError::DspComputation(_))
    ));
}
