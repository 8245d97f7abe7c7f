//! # Transcription Client
//!
//! Turns a canonical PCM file into a [`TranscriptionOutcome`]:
//!
//! 1. Read the WAV into mono 16-bit samples
//! 2. Calibrate the ambient-noise threshold over the configured head window
//! 3. Buffer everything after the window
//! 4. Make one call to the recognition service
//! 5. Classify the reply (text / nothing understood / service failure)
//!
//! Reading the file and the remote call are the only blocking points. Local
//! read failures are reported as service errors too, so the caller only ever
//! sees the three outcome variants.

use crate::audio::wav;
use crate::transcription::calibration::{AmbientNoiseCalibrator, CalibratedAudio};
use crate::transcription::config::RecognitionConfig;
use crate::transcription::outcome::TranscriptionOutcome;
use crate::transcription::service::{RecognitionRequest, RecognitionResponse, RecognitionService};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct TranscriptionClient {
    service: Arc<dyn RecognitionService>,
    config: Arc<RecognitionConfig>,
    calibrator: AmbientNoiseCalibrator,
}

impl TranscriptionClient {
    pub fn new(service: Arc<dyn RecognitionService>, config: Arc<RecognitionConfig>) -> Self {
        let calibrator = AmbientNoiseCalibrator::new(&config);
        Self {
            service,
            config,
            calibrator,
        }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Transcribe the PCM WAV at `pcm_path`.
    pub async fn transcribe(&self, pcm_path: &Path) -> TranscriptionOutcome {
        let captured = match self.capture(pcm_path).await {
            Ok(captured) => captured,
            Err(message) => {
                error!(path = %pcm_path.display(), error = %message, "Failed to read audio for transcription");
                return TranscriptionOutcome::ServiceError(message);
            }
        };

        let request = RecognitionRequest {
            samples: captured.samples,
            sample_rate: captured.sample_rate,
            language: self.config.language.clone(),
        };

        info!(
            service = self.service.name(),
            energy_threshold = captured.energy_threshold,
            calibration_frames = captured.calibration_frames,
            frames = request.samples.len(),
            "Submitting audio for recognition"
        );

        match self.service.recognize(&request).await {
            Ok(RecognitionResponse::Transcript(text)) => {
                let preview: String = text.chars().take(50).collect();
                info!(chars = text.chars().count(), preview = %preview, "Transcription completed");
                TranscriptionOutcome::Recognized(text)
            }
            Ok(RecognitionResponse::NoSpeech) => {
                warn!("Recognition service could not understand the audio");
                TranscriptionOutcome::Unrecognized
            }
            Err(e) => {
                error!(service = self.service.name(), error = %e, "Recognition service failed");
                TranscriptionOutcome::ServiceError(e.to_string())
            }
        }
    }

    /// Read and calibrate on the blocking pool.
    async fn capture(&self, pcm_path: &Path) -> Result<CalibratedAudio, String> {
        let path = pcm_path.to_path_buf();
        let calibrator = self.calibrator.clone();

        let task = tokio::task::spawn_blocking(move || {
            wav::read_mono_i16(&path).map(|audio| {
                tracing::debug!(
                    duration_secs = audio.duration_secs(),
                    sample_rate = audio.sample_rate,
                    "Read PCM audio"
                );
                calibrator.calibrate(audio)
            })
        });

        match task.await {
            Ok(Ok(captured)) => Ok(captured),
            Ok(Err(e)) => Err(format!("failed to read audio: {}", e)),
            Err(e) => Err(format!("audio reader task failed: {}", e)),
        }
    }
}
