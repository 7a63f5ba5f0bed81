use super::params::RawControlParams;
use crate::domain::artifact::ArtifactId;
use crate::domain::job::{JobId, JobState, QueueStats, SynthesisJob};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request for POST /speak
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_wav: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub params: RawControlParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

/// Request for POST /speak_emotion
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SpeakEmotionRequest {
    pub text: Option<String>,
    pub emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_wav: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Query string accepted by the speak endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SpeakQuery {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JobErrorDto {
    pub kind: String,
    pub message: String,
}

/// Response for job status and asynchronous submissions
#[derive(Debug, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ArtifactId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobErrorDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SynthesisJob> for JobResponse {
    fn from(job: &SynthesisJob) -> Self {
        Self {
            job_id: job.id,
            state: job.state,
            artifact_id: job.result,
            audio_url: job.result.map(|id| format!("/artifacts/{}", id)),
            error: job.error.as_ref().map(|e| JobErrorDto {
                kind: e.tag().to_string(),
                message: e.public_message(),
            }),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EmotionInfo {
    pub name: String,
    pub temperature: f32,
    pub speed: f32,
    pub top_p: f32,
    pub prefix: String,
}

/// Response for GET /emotions
#[derive(Debug, Serialize, Deserialize)]
pub struct EmotionsResponse {
    pub emotions: Vec<EmotionInfo>,
}

/// Response for GET /
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_speaker: Option<String>,
    pub delivery_mode: String,
    pub available_emotions: Vec<String>,
    pub languages: Vec<String>,
    pub voice_controls: BTreeMap<String, String>,
    pub queue: QueueStats,
}
