//! # stem-studio-core
//!
//! Core audio pipeline for splitting a mixed stereo recording into
//! instrument/vocal stems and rendering edited stems back into a single
//! mastered track.
//!
//! Separation runs an external model engine first and falls back to a
//! deterministic DSP cascade (harmonic/percussive decomposition, band
//! filtering, inter-channel masking) when the external engine fails or
//! returns nothing usable. Mixing applies a fixed-order per-track effect
//! chain and sums the results into a peak-normalized master.

mod audio;
mod core;
mod engine;
mod error;
mod mix;
mod types;

pub use crate::{
    audio::{read_audio, write_audio},
    engine::{separate_file, CascadeEngine, DemucsEngine, SeparationEngine},
    error::{Result, StudioError},
    mix::{combine, effects::apply_effects, mix_tracks},
    types::{
        AudioBuffer, CascadeConfig, DemucsConfig, EngineChoice, MixResult, SeparateOptions,
        SeparationOutput, SeparationResult, Stem, StemLabel, TrackEffectSpec,
    },
};

// DSP primitives are exposed for integration tests and advanced callers.
pub use crate::core::{dsp, filters, hpss};
