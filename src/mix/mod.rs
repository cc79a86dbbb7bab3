//! Track rendering and master mixdown.

pub mod effects;
pub mod stretch;

use std::path::Path;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::audio::{read_audio, write_audio};
use crate::error::{Result, StudioError};
use crate::mix::effects::apply_effects;
use crate::types::{AudioBuffer, MixResult, TrackEffectSpec};

/// Peak target of the rendered master.
const MASTER_HEADROOM: f32 = 0.9;

/// Renders a list of track descriptors into one mastered file.
///
/// Tracks are loaded and effect-processed independently (in parallel); a
/// track that fails to load or process is logged and skipped, and the mix
/// continues with the rest. Only when no track survives does the request
/// fail, with no file written.
pub fn mix_tracks(specs: &[TrackEffectSpec], output_path: &Path) -> Result<MixResult> {
    let processed: Vec<Option<AudioBuffer>> = specs
        .par_iter()
        .enumerate()
        .map(|(index, spec)| match render_track(index, spec) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!(track = index, url = %spec.url.display(), error = %e, "track skipped");
                None
            }
        })
        .collect();

    let tracks: Vec<AudioBuffer> = processed.into_iter().flatten().collect();
    let tracks_skipped = specs.len() - tracks.len();

    let master = combine(&tracks)?;
    write_audio(output_path, &master)?;

    info!(
        output = %output_path.display(),
        mixed = tracks.len(),
        skipped = tracks_skipped,
        "mix rendered"
    );

    Ok(MixResult {
        output_path: output_path.to_path_buf(),
        tracks_mixed: tracks.len(),
        tracks_skipped,
        sample_rate: master.sample_rate,
    })
}

fn render_track(index: usize, spec: &TrackEffectSpec) -> Result<AudioBuffer> {
    let buffer = read_audio(&spec.url).map_err(|e| StudioError::TrackLoad {
        index,
        reason: e.to_string(),
    })?;
    apply_effects(&buffer, spec)
}

/// Sums already-processed tracks into a master buffer.
///
/// The master takes the maximum track length; shorter tracks are
/// implicitly zero-padded. Summation is order-independent, then the master
/// is peak-normalized to the headroom target unless it is effectively
/// silent.
pub fn combine(tracks: &[AudioBuffer]) -> Result<AudioBuffer> {
    let Some(first) = tracks.first() else {
        return Err(StudioError::MixNoValidTracks);
    };
    let sample_rate = first.sample_rate;
    if tracks.iter().any(|t| t.sample_rate != sample_rate) {
        warn!("sample rate mismatch across mix tracks, using first track's rate");
    }

    let max_len = tracks.iter().map(AudioBuffer::len).max().unwrap_or(0);
    let mut left = vec![0.0f32; max_len];
    let mut right = vec![0.0f32; max_len];

    for track in tracks {
        for (i, &s) in track.left.iter().enumerate() {
            left[i] += s;
        }
        for (i, &s) in track.right.iter().enumerate() {
            right[i] += s;
        }
    }

    let mut master = AudioBuffer::new(left, right, sample_rate)?;
    let peak = master.peak();
    if peak > 1e-4 {
        master.scale(MASTER_HEADROOM / peak);
    }
    Ok(master)
}
