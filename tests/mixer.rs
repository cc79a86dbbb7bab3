mod common;

use approx::assert_abs_diff_eq;
use common::sine;
use stem_studio_core::{
    combine, mix_tracks, read_audio, write_audio, AudioBuffer, StudioError, TrackEffectSpec,
};
use tempfile::tempdir;

const SR: u32 = 44_100;

#[test]
fn combine_rejects_empty_track_list() {
    assert!(matches!(combine(&[]), Err(StudioError::MixNoValidTracks)));
}

#[test]
fn single_track_is_reproduced_up_to_normalization() {
    let track = AudioBuffer::from_mono(sine(440.0, 0.5, SR, 8192), SR);
    let master = combine(std::slice::from_ref(&track)).unwrap();

    assert_eq!(master.len(), track.len());

    // Peak lands exactly on the headroom target and the waveform is a
    // scaled copy.
    assert_abs_diff_eq!(master.peak(), 0.9, epsilon = 1e-3);
    let gain = 0.9 / track.peak();
    for i in 0..track.len() {
        assert_abs_diff_eq!(master.left[i], track.left[i] * gain, epsilon = 1e-4);
    }
}

#[test]
fn master_length_is_the_maximum_track_length() {
    let short = AudioBuffer::from_mono(sine(440.0, 0.3, SR, 100), SR);
    let long = AudioBuffer::from_mono(sine(220.0, 0.3, SR, 250), SR);
    let master = combine(&[short, long]).unwrap();
    assert_eq!(master.len(), 250);
}

#[test]
fn silent_master_is_left_unscaled() {
    let silent = AudioBuffer::from_mono(vec![0.0; 1024], SR);
    let master = combine(&[silent]).unwrap();
    assert!(master.left.iter().all(|&s| s == 0.0));
    assert!(master.right.iter().all(|&s| s == 0.0));
}

#[test]
fn mix_with_no_tracks_fails_and_writes_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("master.wav");

    let err = mix_tracks(&[], &out).unwrap_err();
    assert!(matches!(err, StudioError::MixNoValidTracks));
    assert!(!out.exists(), "no output file may be written on failure");
}

#[test]
fn mix_with_only_invalid_tracks_fails_and_writes_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("master.wav");

    let specs = vec![
        TrackEffectSpec::neutral(dir.path().join("missing-a.wav")),
        TrackEffectSpec::neutral(dir.path().join("missing-b.wav")),
    ];
    let err = mix_tracks(&specs, &out).unwrap_err();
    assert!(matches!(err, StudioError::MixNoValidTracks));
    assert!(!out.exists());
}

#[test]
fn mix_skips_bad_tracks_and_renders_the_rest() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.wav");
    let out = dir.path().join("master.wav");

    let track = AudioBuffer::from_mono(sine(440.0, 0.5, SR, 8192), SR);
    write_audio(&good, &track).unwrap();

    let specs = vec![
        TrackEffectSpec::neutral(&good),
        TrackEffectSpec::neutral(dir.path().join("missing.wav")),
    ];
    let result = mix_tracks(&specs, &out).unwrap();

    assert_eq!(result.tracks_mixed, 1);
    assert_eq!(result.tracks_skipped, 1);
    assert!(out.exists());
}

#[test]
fn mix_end_to_end_reproduces_a_neutral_track() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("stem.wav");
    let out = dir.path().join("master.wav");

    let track = AudioBuffer::from_mono(sine(440.0, 0.5, SR, 8192), SR);
    write_audio(&source, &track).unwrap();

    let result = mix_tracks(&[TrackEffectSpec::neutral(&source)], &out).unwrap();
    assert_eq!(result.sample_rate, SR);

    let master = read_audio(&out).unwrap();
    assert_eq!(master.len(), track.len());

    let gain = 0.9 / track.peak();
    for i in 0..track.len() {
        assert_abs_diff_eq!(master.left[i], track.left[i] * gain, epsilon = 1e-4);
    }
}

#[test]
fn distorted_track_mix_stays_bounded() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("stem.wav");
    let out = dir.path().join("master.wav");

    let track = AudioBuffer::from_mono(sine(440.0, 0.9, SR, 8192), SR);
    write_audio(&source, &track).unwrap();

    let spec = TrackEffectSpec {
        distortion: 0.5,
        ..TrackEffectSpec::neutral(&source)
    };
    mix_tracks(&[spec], &out).unwrap();

    let master = read_audio(&out).unwrap();
    assert!(master.peak() <= 1.0, "master peak must stay in full scale");
}
