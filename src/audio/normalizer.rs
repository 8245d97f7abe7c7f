//! # Audio Normalization
//!
//! Brings any accepted upload to the canonical format the transcription
//! client reads: mono, 16 kHz, 32-bit float WAV.
//!
//! ## Rules:
//! - `.wav` sources are already canonical and are reused untouched
//! - everything else is decoded, downmixed, resampled and written next to the
//!   source as `<stem>_converted.wav`
//! - on failure no output file is left behind

use crate::audio::decoder::{self, DecodeError};
use crate::audio::validator::FormatValidator;
use crate::audio::wav;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::{Path, PathBuf};

/// Sample rate expected by the recognition service.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Suffix appended to the source stem for converted files.
pub const CONVERTED_SUFFIX: &str = "_converted";

const RESAMPLE_CHUNK: usize = 1024;

/// Where the canonical audio for a request lives.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    pub path: PathBuf,
    /// `None` when the source was reused and never inspected.
    pub sample_rate: Option<u32>,
    pub frames: usize,
    /// True when `path` is the source itself and no file was created.
    pub reused: bool,
}

/// Converts uploads into the canonical PCM format.
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    target_rate: u32,
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self {
            target_rate: TARGET_SAMPLE_RATE,
        }
    }
}

impl AudioNormalizer {
    /// Normalize the file at `source`.
    ///
    /// Blocking: decoding and resampling are CPU bound, so async callers run
    /// this on the blocking pool.
    pub fn normalize(&self, source: &Path) -> Result<NormalizedAudio, DecodeError> {
        let is_wav = source
            .extension()
            .and_then(|e| e.to_str())
            .map(FormatValidator::is_canonical)
            .unwrap_or(false);

        if is_wav {
            tracing::debug!(path = %source.display(), "Source already canonical, skipping conversion");
            return Ok(NormalizedAudio {
                path: source.to_path_buf(),
                sample_rate: None,
                frames: 0,
                reused: true,
            });
        }

        tracing::info!(path = %source.display(), "Converting audio");

        let decoded = decoder::decode_file(source)?;
        tracing::debug!(
            sample_rate = decoded.sample_rate,
            channels = decoded.source_channels,
            duration_secs = decoded.duration_secs(),
            "Decoded source audio"
        );
        let samples = if decoded.sample_rate != self.target_rate {
            resample(&decoded.samples, decoded.sample_rate, self.target_rate)?
        } else {
            decoded.samples
        };

        let output = converted_path(source);
        if let Err(e) = wav::write_mono_f32(&output, &samples, self.target_rate) {
            // A half-written file must not outlive the failure.
            let _ = std::fs::remove_file(&output);
            return Err(DecodeError::Write(e.to_string()));
        }

        tracing::info!(
            path = %output.display(),
            frames = samples.len(),
            sample_rate = self.target_rate,
            "Audio converted"
        );

        Ok(NormalizedAudio {
            path: output,
            sample_rate: Some(self.target_rate),
            frames: samples.len(),
            reused: false,
        })
    }
}

/// `<dir>/<stem>_converted.wav` for a given source path.
pub fn converted_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    source.with_file_name(format!("{}{}.wav", stem, CONVERTED_SUFFIX))
}

/// Sinc resampling of a mono signal.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let mut position = 0;

    // Keep feeding (zero padded past the end) until the delayed tail is out.
    while output.len() < expected + delay {
        let mut chunk = if position < samples.len() {
            samples[position..(position + RESAMPLE_CHUNK).min(samples.len())].to_vec()
        } else {
            Vec::new()
        };
        chunk.resize(RESAMPLE_CHUNK, 0.0);
        position += RESAMPLE_CHUNK;

        let processed = resampler
            .process(&[chunk], None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;

        match processed.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => return Err(DecodeError::Resample("resampler produced no output".to_string())),
        }
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
