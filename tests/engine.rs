mod common;

use approx::assert_abs_diff_eq;
use common::two_tone_stereo;
use stem_studio_core::{
    read_audio, separate_file, write_audio, AudioBuffer, EngineChoice, SeparateOptions,
    StemLabel, StudioError,
};
use tempfile::tempdir;

const SR: u32 = 44_100;

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let input = dir.join("song.wav");
    write_audio(&input, &two_tone_stereo(SR, SR as usize)).unwrap();
    input
}

fn opts_with_missing_binary(output_dir: &std::path::Path, engine: EngineChoice) -> SeparateOptions {
    let mut opts = SeparateOptions {
        output_dir: output_dir.to_path_buf(),
        engine,
        ..SeparateOptions::default()
    };
    // Guaranteed spawn failure, so the external attempt always fails fast.
    opts.demucs.binary = "stem-studio-test-missing-binary".into();
    opts
}

#[test]
fn dsp_engine_separates_and_persists_stems() {
    let dir = tempdir().unwrap();
    let input = write_fixture(dir.path());

    let opts = opts_with_missing_binary(dir.path(), EngineChoice::Dsp);
    let output = separate_file(&input, &opts).unwrap();

    assert!(!output.stems.is_empty(), "non-silent input must yield stems");
    assert!(output.stems.contains_key(&StemLabel::Bass));
    assert_eq!(output.sample_rate, SR);

    for (label, path) in &output.stems {
        assert!(path.exists(), "missing stem file for {label}");
        assert!(path
            .to_string_lossy()
            .contains(&format!("stems_song.wav/{label}.wav")));

        let stem = read_audio(path).unwrap();
        assert_eq!(stem.sample_rate, SR);
        assert!(stem.peak() <= 0.91, "stems are normalized to headroom");
    }
}

/// With the external engine unavailable, the orchestrator's result must be
/// exactly what the DSP engine produces on its own.
#[test]
fn fallback_result_matches_direct_dsp_run() {
    let dir = tempdir().unwrap();
    let input = write_fixture(dir.path());

    let auto_dir = dir.path().join("auto");
    let dsp_dir = dir.path().join("dsp");

    let auto_out =
        separate_file(&input, &opts_with_missing_binary(&auto_dir, EngineChoice::Auto)).unwrap();
    let dsp_out =
        separate_file(&input, &opts_with_missing_binary(&dsp_dir, EngineChoice::Dsp)).unwrap();

    let auto_labels: Vec<_> = auto_out.stems.keys().collect();
    let dsp_labels: Vec<_> = dsp_out.stems.keys().collect();
    assert_eq!(auto_labels, dsp_labels);

    for (label, auto_path) in &auto_out.stems {
        let a: AudioBuffer = read_audio(auto_path).unwrap();
        let b: AudioBuffer = read_audio(&dsp_out.stems[label]).unwrap();
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert_abs_diff_eq!(a.left[i], b.left[i], epsilon = 1e-6);
            assert_abs_diff_eq!(a.right[i], b.right[i], epsilon = 1e-6);
        }
    }
}

#[test]
fn external_only_engine_surfaces_the_failure() {
    let dir = tempdir().unwrap();
    let input = write_fixture(dir.path());

    let opts = opts_with_missing_binary(dir.path(), EngineChoice::External);
    let err = separate_file(&input, &opts).unwrap_err();
    assert!(matches!(err, StudioError::SeparationEngine(_)));
}

#[test]
fn silent_input_yields_no_stems_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("silence.wav");
    write_audio(&input, &AudioBuffer::from_mono(vec![0.0; 8192], SR)).unwrap();

    let opts = opts_with_missing_binary(dir.path(), EngineChoice::Dsp);
    let err = separate_file(&input, &opts).unwrap_err();
    assert!(matches!(err, StudioError::SeparationNoStems));
}

#[test]
fn missing_input_is_a_load_error() {
    let dir = tempdir().unwrap();
    let opts = opts_with_missing_binary(dir.path(), EngineChoice::Auto);
    let err = separate_file(&dir.path().join("nope.wav"), &opts).unwrap_err();
    assert!(matches!(err, StudioError::Load { .. }));
}

/// Near-silent stems are gated out rather than reported as usable tracks.
#[test]
fn energy_gate_drops_marginal_stems() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bass-only.wav");
    // A single low tone: everything except the bass stem should fall
    // under the gate.
    let tone = common::sine(60.0, 0.5, SR, SR as usize);
    write_audio(&input, &AudioBuffer::from_mono(tone, SR)).unwrap();

    let opts = opts_with_missing_binary(dir.path(), EngineChoice::Dsp);
    let output = separate_file(&input, &opts).unwrap();

    assert!(output.stems.contains_key(&StemLabel::Bass));
    assert!(!output.stems.contains_key(&StemLabel::Guitar));
    assert!(!output.stems.contains_key(&StemLabel::Vocals));
}
