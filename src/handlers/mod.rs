//! HTTP handlers and route table.

pub mod config;
pub mod transcribe;

pub use config::get_config;
pub use transcribe::transcribe;

use crate::error::AppError;
use crate::health;
use actix_web::{web, HttpRequest, HttpResponse};

/// Register every route. Shared by `main` and the handler tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/transcribe", web::post().to(transcribe))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(get_config)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/transcribe", web::post().to(transcribe));
}

/// Fallback for unknown routes.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(format!(
        "no route for {} {}",
        req.method(),
        req.path()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::state_with_stub;
    use crate::transcription::service::testing::StubReply;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_routes_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_with_stub(dir.path(), StubReply::NoSpeech, 1024);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes)
                .default_service(web::to(not_found)),
        )
        .await;

        for uri in ["/health", "/api/v1/health", "/api/v1/metrics", "/api/v1/config"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        }

        let resp = test::call_service(&app, test::TestRequest::get().uri("/transcrever").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "no route for GET /transcrever");
    }
}
