//! # Pipeline Observability
//!
//! The orchestrator reports progress through an injected [`PipelineObserver`]
//! instead of reaching for a global logger. The default [`TracingObserver`]
//! turns the events into structured `tracing` records.

use crate::error::AppError;
use crate::transcription::TranscriptionOutcome;
use uuid::Uuid;

/// Per-request pipeline states.
///
/// ## Lifecycle:
/// 1. **Received**: upload handed over by the transport layer
/// 2. **Validated**: filename passed the allow-list
/// 3. **Normalized**: canonical PCM file available
/// 4. **Transcribed**: recognition outcome known
/// 5. **Completed**: temp files released
///
/// Failure can happen from any state and ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    Normalized,
    Transcribed,
    Completed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Normalized => "normalized",
            PipelineStage::Transcribed => "transcribed",
            PipelineStage::Completed => "completed",
        }
    }
}

pub trait PipelineObserver: Send + Sync {
    fn stage_reached(&self, request_id: Uuid, stage: PipelineStage);

    /// `stage` is the last state reached before the failure.
    fn stage_failed(&self, request_id: Uuid, stage: PipelineStage, error: &AppError);

    fn completed(&self, request_id: Uuid, outcome: &TranscriptionOutcome);
}

/// Logs pipeline events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn stage_reached(&self, request_id: Uuid, stage: PipelineStage) {
        tracing::debug!(%request_id, stage = stage.as_str(), "Pipeline stage reached");
    }

    fn stage_failed(&self, request_id: Uuid, stage: PipelineStage, error: &AppError) {
        if error.is_client_error() {
            tracing::warn!(%request_id, stage = stage.as_str(), kind = error.kind(), error = %error, "Upload rejected");
        } else {
            tracing::error!(%request_id, stage = stage.as_str(), kind = error.kind(), error = %error, "Pipeline failed");
        }
    }

    fn completed(&self, request_id: Uuid, outcome: &TranscriptionOutcome) {
        if outcome.is_error() {
            tracing::warn!(%request_id, outcome = outcome.as_str(), "Pipeline completed without transcript");
        } else {
            tracing::info!(%request_id, outcome = outcome.as_str(), "Pipeline completed");
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ObservedEvent {
        Reached(PipelineStage),
        Failed(PipelineStage, String),
        Completed(&'static str),
    }

    /// Keeps every event for assertions.
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<ObservedEvent>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<ObservedEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl PipelineObserver for RecordingObserver {
        fn stage_reached(&self, _request_id: Uuid, stage: PipelineStage) {
            self.events.lock().unwrap().push(ObservedEvent::Reached(stage));
        }

        fn stage_failed(&self, _request_id: Uuid, stage: PipelineStage, error: &AppError) {
            self.events
                .lock()
                .unwrap()
                .push(ObservedEvent::Failed(stage, error.kind().to_string()));
        }

        fn completed(&self, _request_id: Uuid, outcome: &TranscriptionOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(ObservedEvent::Completed(outcome.as_str()));
        }
    }
}
