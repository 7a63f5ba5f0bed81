use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        artifact::{ArtifactId, StoredAudio},
        job::SynthesisJob,
        speech::{
            EmotionsResponse, JobResponse, ServiceInfo, SpeakEmotionRequest, SpeakOutcome,
            SpeakQuery, SpeakRequest, SpeechService, SpeechServiceApi, SynthesisRequest,
        },
    },
    error::{AppError, AppResult},
};

pub const X_JOB_ID: HeaderName = HeaderName::from_static("x-job-id");
pub const X_ARTIFACT_ID: HeaderName = HeaderName::from_static("x-artifact-id");

pub struct SpeechController {
    speech_service: Arc<SpeechService>,
}

impl SpeechController {
    pub fn new(speech_service: Arc<SpeechService>) -> Self {
        Self { speech_service }
    }

    /// GET / - Service status, voice-control ranges and queue state
    pub async fn root(State(controller): State<Arc<SpeechController>>) -> Json<ServiceInfo> {
        Json(controller.speech_service.info())
    }

    /// GET /emotions - Available emotion presets
    pub async fn emotions(State(controller): State<Arc<SpeechController>>) -> Json<EmotionsResponse> {
        Json(controller.speech_service.emotions())
    }

    /// POST /speak - Synthesize text with explicit voice controls
    pub async fn speak(
        State(controller): State<Arc<SpeechController>>,
        Query(query): Query<SpeakQuery>,
        body: Result<Json<SpeakRequest>, JsonRejection>,
    ) -> AppResult<Response> {
        let Json(request) = body?;
        let request = controller.speech_service.prepare(request)?;
        controller.submit(request, query).await
    }

    /// POST /speak_emotion - Synthesize text with an emotion preset
    pub async fn speak_emotion(
        State(controller): State<Arc<SpeechController>>,
        Query(query): Query<SpeakQuery>,
        body: Result<Json<SpeakEmotionRequest>, JsonRejection>,
    ) -> AppResult<Response> {
        let Json(request) = body?;
        let request = controller.speech_service.prepare_emotion(request)?;
        controller.submit(request, query).await
    }

    /// GET /artifacts/{id} - Previously generated audio
    pub async fn artifact(
        State(controller): State<Arc<SpeechController>>,
        Path(artifact_id): Path<Uuid>,
    ) -> AppResult<Response> {
        let audio = controller
            .speech_service
            .artifact(ArtifactId::from(artifact_id))
            .await?;
        let headers = audio_headers(&audio, None)?;
        Ok((StatusCode::OK, headers, Body::from(audio.bytes)).into_response())
    }

    async fn submit(&self, request: SynthesisRequest, query: SpeakQuery) -> AppResult<Response> {
        let mode = self.speech_service.delivery_mode(query.mode.as_deref())?;

        match self.speech_service.speak(request, mode).await? {
            SpeakOutcome::Accepted(job) => {
                let mut headers = HeaderMap::new();
                headers.insert(X_JOB_ID, header_value(&job.id.to_string())?);
                headers.insert(header::LOCATION, header_value(&format!("/jobs/{}", job.id))?);
                Ok((StatusCode::ACCEPTED, headers, Json(JobResponse::from(&job))).into_response())
            }
            SpeakOutcome::Completed { job, audio } => {
                let headers = audio_headers(&audio, Some(&job))?;
                Ok((StatusCode::OK, headers, Body::from(audio.bytes)).into_response())
            }
        }
    }
}

fn audio_headers(audio: &StoredAudio, job: Option<&SynthesisJob>) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(audio.media_type.as_str()),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&format!("inline; filename=\"{}\"", audio.file_name()))?,
    );
    headers.insert(X_ARTIFACT_ID, header_value(&audio.id.to_string())?);
    if let Some(job) = job {
        headers.insert(X_JOB_ID, header_value(&job.id.to_string())?);
    }
    Ok(headers)
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Internal(format!("invalid header value: {}", e)))
}
