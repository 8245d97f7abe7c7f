//! # Upload Pipeline
//!
//! Everything between "bytes arrived" and "outcome known" for one upload:
//! the upload value itself, scoped temp files, stage reporting and the
//! orchestrator that ties validation, normalization and transcription
//! together.

pub mod artifacts;
pub mod observer;
pub mod orchestrator;
pub mod upload;

pub use observer::TracingObserver;
pub use orchestrator::TranscriptionPipeline;
pub use upload::UploadedAudio;
