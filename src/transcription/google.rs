//! # Google Speech Web API Client
//!
//! Implements [`RecognitionService`] against the Google Speech API v2 used by
//! Chromium's speech input.
//!
//! ## Wire format:
//! - `POST {service_url}?client=chromium&lang=..&key=..&pFilter=0|1`
//! - body: 16-bit little-endian linear PCM, `Content-Type: audio/l16; rate=N`
//! - reply: newline-delimited JSON objects, e.g.
//!   ```json
//!   {"result":[]}
//!   {"result":[{"alternative":[{"transcript":"bom dia","confidence":0.93}],"final":true}],"result_index":0}
//!   ```
//!   The first object with a non-empty `result` carries the transcript.

use crate::transcription::config::RecognitionConfig;
use crate::transcription::service::{
    RecognitionError, RecognitionRequest, RecognitionResponse, RecognitionService,
};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ResponseLine {
    result: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    #[serde(default)]
    alternative: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: Option<String>,
}

pub struct GoogleSpeechService {
    client: reqwest::Client,
    service_url: String,
    api_key: String,
    profanity_filter: bool,
}

impl GoogleSpeechService {
    pub fn new(config: &RecognitionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            service_url: config.service_url.clone(),
            api_key: config.api_key.clone(),
            profanity_filter: config.profanity_filter,
        })
    }
}

#[async_trait]
impl RecognitionService for GoogleSpeechService {
    fn name(&self) -> &str {
        "google-speech-v2"
    }

    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError> {
        let p_filter = if self.profanity_filter { "1" } else { "0" };

        tracing::info!(
            service = self.name(),
            language = %request.language,
            duration_secs = request.duration_secs(),
            "Sending audio to speech recognition"
        );

        let response = self
            .client
            .post(&self.service_url)
            .query(&[
                ("client", "chromium"),
                ("lang", request.language.as_str()),
                ("key", self.api_key.as_str()),
                ("pFilter", p_filter),
            ])
            .header(CONTENT_TYPE, format!("audio/l16; rate={}", request.sample_rate))
            .body(request.to_l16_bytes())
            .send()
            .await
            .map_err(|e| RecognitionError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RecognitionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RecognitionError::Unreachable(format!("body: {}", e)))?;

        parse_response(&body)
    }
}

/// Classify a raw service reply.
pub fn parse_response(body: &str) -> Result<RecognitionResponse, RecognitionError> {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: ResponseLine = serde_json::from_str(line)
            .map_err(|e| RecognitionError::Protocol(format!("{}: {}", e, line)))?;

        let Some(first) = parsed.result.into_iter().next() else {
            continue;
        };

        let transcript = first
            .alternative
            .into_iter()
            .next()
            .and_then(|alt| alt.transcript)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        return Ok(match transcript {
            Some(text) => RecognitionResponse::Transcript(text),
            None => RecognitionResponse::NoSpeech,
        });
    }

    Ok(RecognitionResponse::NoSpeech)
}
