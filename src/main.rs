//! # Audio Transcription API - Main Application Entry Point
//!
//! HTTP service that accepts an uploaded audio file, normalizes it to 16 kHz
//! mono PCM and returns the text a remote speech recognizer heard in it.
//!
//! ## Application Architecture:
//! - **config**: application configuration (TOML file + environment variables)
//! - **audio**: format validation, decoding and normalization
//! - **transcription**: ambient-noise calibration and the recognition service client
//! - **pipeline**: per-upload orchestration, temp-file ownership, stage reporting
//! - **state**: shared state and metrics
//! - **health**: liveness and metrics endpoints
//! - **middleware**: request logging with request ids, metrics collection
//! - **handlers**: HTTP handlers and the route table
//! - **error**: caller-facing error types and their HTTP responses

mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod pipeline;
mod state;
mod transcription;

use crate::config::AppConfig;
use crate::pipeline::{TracingObserver, TranscriptionPipeline};
use crate::state::AppState;
use crate::transcription::{GoogleSpeechService, TranscriptionClient};
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Wires the pipeline** (recognizer client, observer, scratch directory)
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** on SIGINT/SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting audio-transcription-api v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    std::fs::create_dir_all(&config.upload.temp_dir).with_context(|| {
        format!(
            "Failed to create temp directory {}",
            config.upload.temp_dir.display()
        )
    })?;

    let recognition = Arc::new(config.recognition.clone());
    let service = Arc::new(GoogleSpeechService::new(&recognition)?);
    let client = TranscriptionClient::new(service, recognition);
    info!(
        service = client.service_name(),
        language = %client.config().language,
        "Recognition client ready"
    );

    let pipeline = TranscriptionPipeline::new(
        config.upload.temp_dir.clone(),
        client,
        Arc::new(TracingObserver),
    );
    info!(temp_dir = %pipeline.temp_dir().display(), "Transcription pipeline ready");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = web::Data::new(AppState::new(config, pipeline));

    info!("Starting HTTP server on {}", bind_addr);
    info!("Endpoints: POST /transcribe, GET /health");

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            // Middleware runs in reverse order of registration for requests.
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system.
///
/// ## Environment Variables:
/// - `RUST_LOG`: controls what gets logged (e.g., "debug", "audio_transcription_api=trace")
/// - If not set, defaults to "audio_transcription_api=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_transcription_api=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing")?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
