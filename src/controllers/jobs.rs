use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        job::JobId,
        speech::{JobResponse, SpeechService, SpeechServiceApi},
    },
    error::AppResult,
};

pub struct JobsController {
    speech_service: Arc<SpeechService>,
}

impl JobsController {
    pub fn new(speech_service: Arc<SpeechService>) -> Self {
        Self { speech_service }
    }

    /// GET /jobs/{id} - Job status
    pub async fn get_job(
        State(controller): State<Arc<JobsController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<JobResponse>> {
        let job = controller.speech_service.job(JobId::from(job_id))?;
        Ok(Json(JobResponse::from(&job)))
    }

    /// DELETE /jobs/{id} - Cancel a queued job
    pub async fn cancel_job(
        State(controller): State<Arc<JobsController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<JobResponse>> {
        let job = controller.speech_service.cancel_job(JobId::from(job_id))?;
        Ok(Json(JobResponse::from(&job)))
    }
}
