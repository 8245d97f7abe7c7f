//! # Container Decoding
//!
//! Thin wrapper around symphonia. Probes the container from the file content,
//! decodes the first audio track and downmixes it to mono `f32` samples at the
//! source sample rate. Ogg Opus streams are handed to [`ogg_opus`] instead.
//! Resampling is the normalizer's job.

use std::fs::File;
use std::path::Path;

use crate::audio::ogg_opus;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Failure to turn an upload into PCM samples. Never worth retrying for the
/// same input.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("audio file is empty")]
    Empty,

    #[error("failed to read audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized audio container: {0}")]
    UnknownContainer(String),

    #[error("no audio track found")]
    NoTrack,

    #[error("no decoder available for this audio: {0}")]
    UnsupportedCodec(String),

    #[error("corrupt audio stream: {0}")]
    Corrupt(String),

    #[error("no audio samples decoded")]
    NoSamples,

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("failed to write normalized audio: {0}")]
    Write(String),
}

/// Mono samples straight out of the codec.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub source_channels: usize,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode any supported container at `path` into mono samples.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(DecodeError::Empty);
    }

    if ogg_opus::is_ogg_opus(path)? {
        return ogg_opus::decode_file(path);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // The extension only orders the probe; the content decides.
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnknownContainer(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;
    let mut source_channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedCodec(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }

        let channels = spec.channels.count().max(1);
        sample_rate.get_or_insert(spec.rate);
        source_channels = source_channels.max(channels);

        let mut buffer = SampleBuffer::<f32>::new(frames as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        if channels == 1 {
            samples.extend_from_slice(buffer.samples());
        } else {
            samples.extend(
                buffer
                    .samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    let sample_rate = match sample_rate {
        Some(rate) if rate > 0 => rate,
        _ => return Err(DecodeError::Corrupt("unknown sample rate".to_string())),
    };

    if samples.is_empty() {
        return Err(DecodeError::NoSamples);
    }

    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        channels = source_channels,
        "Decoded audio container"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        source_channels,
    })
}
