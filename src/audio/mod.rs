//! # Audio Module
//!
//! Everything that touches audio bytes before they reach the recognition
//! service.
//!
//! ## Key Components:
//! - **Validator**: filename allow-list check, runs before anything is stored
//! - **Decoder**: symphonia container/codec decoding to mono samples
//! - **Ogg Opus**: libopus decoding for the voice-note format symphonia lacks
//! - **Normalizer**: downmix + resample to 16 kHz and write the canonical WAV
//! - **WAV I/O**: reading/writing the canonical PCM files
//!
//! ## Canonical Format:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: 32-bit IEEE float WAV on disk, 16-bit PCM on the wire

pub mod decoder;     // symphonia decoding
pub mod normalizer;  // conversion to the canonical format
pub mod ogg_opus;    // Opus in Ogg via libopus
pub mod validator;   // upload filename checks
pub mod wav;         // canonical WAV reading/writing

pub use decoder::DecodeError;
pub use normalizer::AudioNormalizer;
pub use validator::{FormatValidator, ValidationError};
