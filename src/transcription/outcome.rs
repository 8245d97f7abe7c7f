//! Result of one transcription attempt.

/// Exactly one of these is produced per request.
///
/// `Unrecognized` is an expected outcome (valid audio, nothing understood),
/// not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    Recognized(String),
    Unrecognized,
    ServiceError(String),
}

impl TranscriptionOutcome {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionOutcome::Recognized(_) => "recognized",
            TranscriptionOutcome::Unrecognized => "unrecognized",
            TranscriptionOutcome::ServiceError(_) => "service_error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TranscriptionOutcome::ServiceError(_))
    }
}
