//! External model-based separation, run as an isolated subprocess.
//!
//! The adapter shells out to a separation executable (Demucs by default),
//! waits for it with a wall-clock bound, and maps the fixed output layout
//! `<scratch>/<model>/<input-stem>/<stem>.wav` back to stem labels. The
//! scratch directory is a fresh temp dir per invocation, so a previous
//! request's output can never be picked up as this one's result.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::tempdir;
use tracing::{debug, info, warn};

use crate::audio::read_audio;
use crate::engine::SeparationEngine;
use crate::error::{Result, StudioError};
use crate::types::{AudioBuffer, DemucsConfig, StemLabel};

/// Output filenames the 6-stem model is known to emit, and the label each
/// maps to. `other.wav` is intentionally absent: outputs without a mapping
/// are dropped, not errors.
const STEM_FILES: [(&str, StemLabel); 5] = [
    ("drums.wav", StemLabel::Drums),
    ("bass.wav", StemLabel::Bass),
    ("vocals.wav", StemLabel::Vocals),
    ("guitar.wav", StemLabel::Guitar),
    ("piano.wav", StemLabel::Keys),
];

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DemucsEngine {
    config: DemucsConfig,
}

impl DemucsEngine {
    pub fn new(config: DemucsConfig) -> Self {
        Self { config }
    }

    fn run_process(&self, input: &Path, scratch: &Path) -> Result<()> {
        let mut child = Command::new(&self.config.binary)
            .arg("-n")
            .arg(&self.config.model)
            .arg("-j")
            .arg(self.config.jobs.to_string())
            .arg("-o")
            .arg(scratch)
            .arg(input)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                StudioError::SeparationEngine(format!(
                    "failed to spawn {}: {e}",
                    self.config.binary
                ))
            })?;

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        return Ok(());
                    }
                    return Err(StudioError::SeparationEngine(format!(
                        "{} exited with {status}",
                        self.config.binary
                    )));
                }
                Ok(None) => {
                    if Instant::now() >= deadline {
                        child.kill().ok();
                        child.wait().ok();
                        return Err(StudioError::SeparationEngine(format!(
                            "{} timed out after {}s",
                            self.config.binary, self.config.timeout_secs
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(StudioError::SeparationEngine(format!(
                        "failed to wait on {}: {e}",
                        self.config.binary
                    )));
                }
            }
        }
    }

    fn collect_stems(
        &self,
        input: &Path,
        scratch: &Path,
    ) -> Result<BTreeMap<StemLabel, AudioBuffer>> {
        let file_stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let stem_dir = scratch.join(&self.config.model).join(file_stem);

        let mut stems = BTreeMap::new();
        for (file, label) in STEM_FILES {
            let path = stem_dir.join(file);
            if !path.exists() {
                debug!(stem = %label, path = %path.display(), "expected output missing, omitted");
                continue;
            }
            let buffer = read_audio(&path).map_err(|e| {
                StudioError::SeparationEngine(format!(
                    "failed to read model output {}: {e}",
                    path.display()
                ))
            })?;
            stems.insert(label, buffer);
        }
        Ok(stems)
    }
}

impl SeparationEngine for DemucsEngine {
    fn label(&self) -> &'static str {
        "external-model"
    }

    fn separate(&self, input: &Path) -> Result<BTreeMap<StemLabel, AudioBuffer>> {
        // Private scratch per request; dropped (and deleted) on return.
        let scratch = tempdir().map_err(|e| {
            StudioError::SeparationEngine(format!("failed to create scratch dir: {e}"))
        })?;

        info!(
            binary = %self.config.binary,
            model = %self.config.model,
            input = %input.display(),
            "invoking external separation"
        );
        self.run_process(input, scratch.path())?;

        let stems = self.collect_stems(input, scratch.path())?;
        if stems.is_empty() {
            warn!("external separation finished but produced no mapped outputs");
        }
        Ok(stems)
    }
}
