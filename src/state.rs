//! # Application State Management
//!
//! Shared state handed to every HTTP handler through `web::Data`.
//!
//! ## What lives here:
//! - the configuration, loaded once and never mutated afterwards (plain `Arc`)
//! - the transcription pipeline, stateless between requests (plain `Arc`)
//! - the metrics, updated by every request (`Arc<RwLock<_>>`)
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: multiple ownership (every worker holds a clone of `AppState`)
//! - **RwLock**: many readers or one writer
//!
//! A panic while a metrics lock is held poisons it. Metrics are plain
//! counters, so the locks are recovered with `PoisonError::into_inner`
//! instead of taking every later request down with them.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::pipeline::TranscriptionPipeline;
use crate::transcription::TranscriptionOutcome;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    /// Effective configuration (read-only after startup)
    pub config: Arc<AppConfig>,

    /// Validation → normalization → transcription for one upload
    pub pipeline: Arc<TranscriptionPipeline>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Uploads currently inside the pipeline
    pub active_transcriptions: u32,

    /// How finished uploads ended
    pub outcomes: OutcomeCounters,

    /// Key: endpoint (e.g., "POST /transcribe")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Per-outcome totals for the transcription endpoint.
///
/// `rejected` counts uploads refused for client reasons (4xx), `failed`
/// counts decode and internal failures before transcription.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeCounters {
    pub recognized: u64,
    pub unrecognized: u64,
    pub service_error: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Detailed performance metrics for a specific API endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

/// Holds one slot in `active_transcriptions` until dropped.
pub struct ActiveTranscription {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for ActiveTranscription {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.active_transcriptions = metrics.active_transcriptions.saturating_sub(1);
    }
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: TranscriptionPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by the metrics middleware for every request.
    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    /// Called by the metrics middleware for every 4xx/5xx response.
    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    /// Record duration and error flag for one endpoint.
    ///
    /// The first time we see an endpoint, a zeroed `EndpointMetric` is created.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark an upload as in flight. The slot is released when the guard drops.
    pub fn begin_transcription(&self) -> ActiveTranscription {
        self.metrics_write().active_transcriptions += 1;
        ActiveTranscription {
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn record_outcome(&self, outcome: &TranscriptionOutcome) {
        let mut metrics = self.metrics_write();
        match outcome {
            TranscriptionOutcome::Recognized(_) => metrics.outcomes.recognized += 1,
            TranscriptionOutcome::Unrecognized => metrics.outcomes.unrecognized += 1,
            TranscriptionOutcome::ServiceError(_) => metrics.outcomes.service_error += 1,
        }
    }

    /// Count an upload that never produced an outcome.
    pub fn record_failure(&self, error: &AppError) {
        let mut metrics = self.metrics_write();
        if error.is_client_error() {
            metrics.outcomes.rejected += 1;
        } else {
            metrics.outcomes.failed += 1;
        }
    }

    /// Consistent copy of the metrics, taken under one read lock.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of failed requests (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::pipeline::TracingObserver;
    use crate::transcription::service::testing::{StubRecognitionService, StubReply};
    use crate::transcription::{RecognitionConfig, TranscriptionClient};
    use std::path::Path;

    /// State wired to a stub recognizer and an isolated temp dir.
    pub fn state_with_stub(
        temp_dir: &Path,
        reply: StubReply,
        max_body_bytes: usize,
    ) -> (AppState, Arc<StubRecognitionService>) {
        let mut config = AppConfig::default();
        config.upload.temp_dir = temp_dir.to_path_buf();
        config.upload.max_body_bytes = max_body_bytes;

        let stub = Arc::new(StubRecognitionService::new(reply));
        let client = TranscriptionClient::new(stub.clone(), Arc::new(RecognitionConfig::default()));
        let pipeline =
            TranscriptionPipeline::new(temp_dir.to_path_buf(), client, Arc::new(TracingObserver));

        (AppState::new(config, pipeline), stub)
    }
}
