//! # Recognition Service Seam
//!
//! The narrow contract the transcription client needs from a remote
//! recognizer: send one buffer of audio, get text, "nothing heard", or a
//! failure back.

use async_trait::async_trait;
use byteorder::{LittleEndian, WriteBytesExt};
use thiserror::Error;

/// One utterance to recognize.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    /// Mono 16-bit samples.
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub language: String,
}

impl RecognitionRequest {
    /// Samples as little-endian 16-bit linear PCM bytes.
    pub fn to_l16_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 2);
        for &sample in &self.samples {
            // Writing into a Vec cannot fail.
            let _ = bytes.write_i16::<LittleEndian>(sample);
        }
        bytes
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// What the service said about the audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionResponse {
    Transcript(String),
    /// The service answered but could not understand any speech.
    NoSpeech,
}

/// The service could not produce an answer.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition connection failed: {0}")]
    Unreachable(String),

    #[error("recognition request failed: status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("recognition response malformed: {0}")]
    Protocol(String),
}

/// A remote speech-to-text backend.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Recognize one buffer. Implementations make exactly one request and
    /// never retry.
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError>;
}
