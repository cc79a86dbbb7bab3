//! Separation engines and the fallback orchestrator.

mod cascade;
mod demucs;

pub use cascade::CascadeEngine;
pub use demucs::DemucsEngine;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::audio::{read_audio, write_audio};
use crate::error::{Result, StudioError};
use crate::types::{
    AudioBuffer, EngineChoice, SeparateOptions, SeparationOutput, SeparationResult, Stem,
    StemLabel,
};

/// A separation engine turns an input audio file into a stem mapping, or
/// fails. The orchestrator composes interchangeable implementations behind
/// this seam instead of branching on engine identity.
pub trait SeparationEngine {
    fn label(&self) -> &'static str;
    fn separate(&self, input: &Path) -> Result<BTreeMap<StemLabel, AudioBuffer>>;
}

/// Separates `input` into stem files under `opts.output_dir`.
///
/// The external engine is tried first; any failure or empty (post-gate)
/// result falls back to the DSP cascade, one attempt per engine. If the
/// fallback also yields nothing above the energy gate, the request fails:
/// an empty result is never reported as success.
pub fn separate_file(input: &Path, opts: &SeparateOptions) -> Result<SeparationOutput> {
    // Decode once up front: a missing/unreadable input is a load failure,
    // not an engine failure, and the buffer doubles as the gate reference
    // and the cascade input.
    let reference = read_audio(input)?;
    let total_energy = reference.energy();
    if total_energy <= 0.0 {
        return Err(StudioError::SeparationNoStems);
    }

    let cascade = CascadeEngine::new(opts.cascade.clone());

    let gated = match opts.engine {
        EngineChoice::Dsp => gate(cascade.separate_buffer(&reference)?, total_energy, opts),
        EngineChoice::External => {
            let external = DemucsEngine::new(opts.demucs.clone());
            gate(external.separate(input)?, total_energy, opts)
        }
        EngineChoice::Auto => {
            let external = DemucsEngine::new(opts.demucs.clone());
            match external.separate(input) {
                Ok(candidates) => {
                    let gated = gate(candidates, total_energy, opts);
                    if gated.is_empty() {
                        info!(
                            engine = external.label(),
                            "external result empty after gating, falling back to DSP cascade"
                        );
                        gate(cascade.separate_buffer(&reference)?, total_energy, opts)
                    } else {
                        gated
                    }
                }
                Err(e) => {
                    warn!(
                        engine = external.label(),
                        error = %e,
                        "external separation failed, falling back to DSP cascade"
                    );
                    gate(cascade.separate_buffer(&reference)?, total_energy, opts)
                }
            }
        }
    };

    if gated.is_empty() {
        return Err(StudioError::SeparationNoStems);
    }

    write_stems(input, &gated, opts)
}

/// Applies the energy gate and peak normalization uniformly, whichever
/// engine produced the candidates. Near-silent stems are suppressed rather
/// than reported as usable tracks.
fn gate(
    candidates: BTreeMap<StemLabel, AudioBuffer>,
    total_energy: f64,
    opts: &SeparateOptions,
) -> SeparationResult {
    let threshold = total_energy * opts.cascade.energy_gate_ratio;
    let mut result = SeparationResult::new();

    for (label, mut buffer) in candidates {
        let energy = buffer.energy();
        if energy <= threshold {
            info!(stem = %label, energy, threshold, "stem below energy gate, dropped");
            continue;
        }
        let peak = buffer.peak();
        if peak > 1e-4 {
            buffer.scale(opts.cascade.peak_headroom / peak);
        }
        info!(
            stem = %label,
            share = 100.0 * energy / total_energy,
            "stem kept"
        );
        result.insert(label, Stem::new(label, buffer));
    }
    result
}

/// Persists gated stems as float WAVs with deterministic names, namespaced
/// per source file so concurrent requests never collide.
fn write_stems(
    input: &Path,
    stems: &SeparationResult,
    opts: &SeparateOptions,
) -> Result<SeparationOutput> {
    let file_name = input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let stem_dir = opts.output_dir.join(format!("stems_{file_name}"));
    fs::create_dir_all(&stem_dir)?;

    let mut paths = BTreeMap::new();
    let mut sample_rate = 0;
    for stem in stems.values() {
        let path = stem_dir.join(format!("{}.wav", stem.label));
        write_audio(&path, &stem.buffer)?;
        sample_rate = stem.buffer.sample_rate;
        paths.insert(stem.label, path);
    }

    Ok(SeparationOutput {
        stems: paths,
        sample_rate,
    })
}
