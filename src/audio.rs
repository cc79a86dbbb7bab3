use std::{fs::File, path::Path};

use anyhow::Context;
use hound::WavWriter;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::error::{Result, StudioError};
use crate::types::AudioBuffer;

/// Decodes an audio file into a planar stereo buffer at the file's rate.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path: &Path = path.as_ref();

    let file = File::open(path).map_err(|e| StudioError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| StudioError::Load {
            path: path.to_path_buf(),
            reason: format!("unsupported format: {e}"),
        })?;

    let mut format = probed.format;
    let track = format.default_track().ok_or_else(|| StudioError::Load {
        path: path.to_path_buf(),
        reason: "no default track".into(),
    })?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| StudioError::Load {
            path: path.to_path_buf(),
            reason: format!("no decoder: {e}"),
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = 0;
    let mut channels: u16 = 0;

    while let Ok(packet) = format.next_packet() {
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                return Err(StudioError::Load {
                    path: path.to_path_buf(),
                    reason: format!("decode failed: {e}"),
                })
            }
        };
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(StudioError::Load {
            path: path.to_path_buf(),
            reason: "no audio samples decoded".into(),
        });
    }

    debug!(
        path = %path.display(),
        sample_rate,
        channels,
        samples = samples.len(),
        "decoded audio"
    );

    Ok(AudioBuffer::from_interleaved(&samples, channels, sample_rate))
}

/// Encodes a stereo buffer as a 32-bit float PCM WAV file.
pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioBuffer) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV at {}", path.display()))?;
    for (&l, &r) in audio.left.iter().zip(audio.right.iter()) {
        writer.write_sample(l)?;
        writer.write_sample(r)?;
    }
    writer.finalize()?;
    Ok(())
}
