//! # Transcription Module
//!
//! Speech-to-text through a remote recognition service.
//!
//! ## Key Components:
//! - **Config**: recognition tuning (energy threshold, calibration window, language) and service wiring
//! - **Calibration**: ambient-noise threshold estimation over the head of the audio
//! - **Service**: the `RecognitionService` seam and its request/response types
//! - **Google**: the Google Speech web API implementation
//! - **Client**: read PCM → calibrate → recognize → classify into a `TranscriptionOutcome`

pub mod calibration;  // ambient-noise threshold
pub mod client;       // PCM file to outcome
pub mod config;       // RecognitionConfig
pub mod google;       // Google Speech API v2
pub mod outcome;      // TranscriptionOutcome
pub mod service;      // RecognitionService trait

pub use client::TranscriptionClient;
pub use config::RecognitionConfig;
pub use google::GoogleSpeechService;
pub use outcome::TranscriptionOutcome;
