//! # Transcription Endpoint
//!
//! Transport shim in front of the pipeline: reads the multipart upload,
//! enforces the body limit, runs the pipeline and maps the outcome to JSON.
//!
//! ## Endpoint: `POST /transcribe` (also `/api/v1/transcribe`)
//!
//! ## Request:
//! Multipart form data with an audio file field named "audio"
//!
//! ## Response:
//! ```json
//! { "success": true, "text": "bom dia" }
//! { "success": true, "text": "", "message": "unrecognized" }
//! { "success": false, "error": "unsupported format" }
//! ```

use crate::error::AppError;
use crate::middleware::logging::RequestId;
use crate::pipeline::UploadedAudio;
use crate::state::AppState;
use crate::transcription::TranscriptionOutcome;
use actix_multipart::{Field, Multipart};
use actix_web::{http::header, web, HttpMessage, HttpRequest, HttpResponse};
use futures_util::stream::StreamExt;
use serde_json::json;
use uuid::Uuid;

/// Name of the multipart field carrying the file.
pub const AUDIO_FIELD: &str = "audio";

const TOO_LARGE: &str = "file too large";

pub async fn transcribe(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0)
        .unwrap_or_else(Uuid::new_v4);

    let upload = match read_upload(&req, payload, state.config.upload.max_body_bytes).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "Rejected upload before pipeline");
            state.record_failure(&e);
            return Err(e);
        }
    };

    let _active = state.begin_transcription();

    match state.pipeline.run(request_id, upload).await {
        Ok(outcome) => {
            state.record_outcome(&outcome);
            outcome_response(outcome)
        }
        Err(e) => {
            state.record_failure(&e);
            Err(e)
        }
    }
}

fn outcome_response(outcome: TranscriptionOutcome) -> Result<HttpResponse, AppError> {
    match outcome {
        TranscriptionOutcome::Recognized(text) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "text": text,
        }))),
        TranscriptionOutcome::Unrecognized => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "text": "",
            "message": "unrecognized",
        }))),
        TranscriptionOutcome::ServiceError(message) => Err(AppError::ServiceError(message)),
    }
}

/// Pull the first `audio` field out of the body.
///
/// ## Body limit:
/// Checked up front from `Content-Length`, then again while streaming so that
/// chunked uploads cannot get past it. Other fields are drained and count
/// toward the limit too.
async fn read_upload(
    req: &HttpRequest,
    mut payload: Multipart,
    max_body_bytes: usize,
) -> Result<UploadedAudio, AppError> {
    if let Some(length) = declared_length(req) {
        if length > max_body_bytes {
            return Err(AppError::PayloadTooLarge(TOO_LARGE.to_string()));
        }
    }

    let mut received = 0usize;
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field: Field = item?;

        let is_audio = upload.is_none()
            && field
                .content_disposition()
                .and_then(|cd| cd.get_name())
                .map_or(false, |name| name == AUDIO_FIELD);
        let filename = if is_audio {
            field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string)
        } else {
            None
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            received += chunk.len();
            if received > max_body_bytes {
                return Err(AppError::PayloadTooLarge(TOO_LARGE.to_string()));
            }
            if is_audio {
                bytes.extend_from_slice(&chunk);
            }
        }

        if is_audio {
            upload = Some(UploadedAudio::new(filename, bytes));
        }
    }

    upload.ok_or_else(|| AppError::BadRequest("no audio file provided".to_string()))
}

fn declared_length(req: &HttpRequest) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}
