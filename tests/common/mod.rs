#![allow(dead_code)]

use std::f64::consts::PI;

use stem_studio_core::AudioBuffer;

/// Mono sine tone.
pub fn sine(freq: f64, amplitude: f64, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()) as f32)
        .collect()
}

/// Adds `b` into `a` sample-wise.
pub fn mix_into(a: &mut [f32], b: &[f32]) {
    for (x, &y) in a.iter_mut().zip(b.iter()) {
        *x += y;
    }
}

/// Sum of squared samples.
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

/// Normalized magnitude of one frequency component (projection onto the
/// complex exponential at `freq`).
pub fn tone_magnitude(samples: &[f32], freq: f64, sample_rate: u32) -> f64 {
    let mut re = 0.0f64;
    let mut im = 0.0f64;
    for (i, &s) in samples.iter().enumerate() {
        let phase = 2.0 * PI * freq * i as f64 / sample_rate as f64;
        re += s as f64 * phase.cos();
        im += s as f64 * phase.sin();
    }
    2.0 * (re * re + im * im).sqrt() / samples.len() as f64
}

/// Stereo buffer with an 80 Hz tone dead center and a 3 kHz tone biased
/// toward the left channel.
pub fn two_tone_stereo(sample_rate: u32, len: usize) -> AudioBuffer {
    let low = sine(80.0, 0.5, sample_rate, len);
    let high_l = sine(3000.0, 0.45, sample_rate, len);
    let high_r = sine(3000.0, 0.3, sample_rate, len);

    let mut left = low.clone();
    let mut right = low;
    mix_into(&mut left, &high_l);
    mix_into(&mut right, &high_r);

    AudioBuffer::new(left, right, sample_rate).unwrap()
}
