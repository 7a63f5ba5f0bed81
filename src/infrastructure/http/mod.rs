pub mod request_id;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::controllers::{health, jobs::JobsController, speech::SpeechController};
use crate::domain::speech::SpeechService;
use crate::infrastructure::config::Config;

pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};

/// Assemble every route with request-id and tracing layers
pub fn build_router(
    speech_service: Arc<SpeechService>,
    speech_controller: Arc<SpeechController>,
    jobs_controller: Arc<JobsController>,
) -> Router {
    let speech_routes = Router::new()
        .route("/", get(SpeechController::root))
        .route("/emotions", get(SpeechController::emotions))
        .route("/speak", post(SpeechController::speak))
        .route("/speak_emotion", post(SpeechController::speak_emotion))
        .route("/artifacts/:artifactId", get(SpeechController::artifact))
        .with_state(speech_controller);

    let job_routes = Router::new()
        .route(
            "/jobs/:jobId",
            get(JobsController::get_job).delete(JobsController::cancel_job),
        )
        .with_state(jobs_controller);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(speech_service)
        .merge(speech_routes)
        .merge(job_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    speech_service: Arc<SpeechService>,
    speech_controller: Arc<SpeechController>,
    jobs_controller: Arc<JobsController>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(speech_service, speech_controller, jobs_controller);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
