use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /api/v1/config`: effective configuration, secrets redacted.
pub async fn get_config(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": state.config.redacted(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::state_with_stub;
    use crate::transcription::service::testing::StubReply;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_config_is_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = state_with_stub(dir.path(), StubReply::NoSpeech, 2048);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/v1/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["config"]["upload"]["max_body_bytes"], 2048);
        assert_eq!(body["config"]["recognition"]["language"], "pt-BR");
        assert_eq!(body["config"]["recognition"]["api_key"], "***");
    }
}
