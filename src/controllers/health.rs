use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::speech::SpeechService;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(speech_service): State<Arc<SpeechService>>) -> impl IntoResponse {
    let queue = speech_service.queue_stats();
    if speech_service.is_ready() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "backend": speech_service.backend_name(),
                "queue": queue
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "backend": speech_service.backend_name(),
                "queue": queue
            })),
        )
    }
}
