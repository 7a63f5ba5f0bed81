use crate::domain::artifact::ArtifactId;
use crate::domain::job::{JobId, JobState};
use super::preset::Emotion;
use crate::error::AppError;

/// Error taxonomy shared by every stage of the synthesis pipeline.
///
/// Client-caused variants carry the offending field or value so the router can
/// echo it back. Server-caused variants carry detail that is logged but never
/// sent to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpeechError {
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    #[error("invalid voice reference: {0}")]
    InvalidVoiceReference(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("artifact {0} has expired")]
    ArtifactExpired(ArtifactId),
    #[error("artifact {0} not found")]
    ArtifactNotFound(ArtifactId),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("job {job_id} is {state} and can no longer be cancelled")]
    NotCancellable { job_id: JobId, state: JobState },
    #[error("job cancelled")]
    Cancelled,
}

impl SpeechError {
    pub fn invalid_parameter(field: &str, reason: impl Into<String>) -> Self {
        SpeechError::InvalidParameter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable tag used in job status payloads
    pub fn tag(&self) -> &'static str {
        match self {
            SpeechError::InvalidParameter { .. } => "invalid_parameter",
            SpeechError::UnknownPreset(_) => "unknown_preset",
            SpeechError::InvalidVoiceReference(_) => "invalid_voice_reference",
            SpeechError::BackendUnavailable(_) => "backend_unavailable",
            SpeechError::SynthesisFailed(_) => "synthesis_failed",
            SpeechError::ArtifactExpired(_) => "artifact_expired",
            SpeechError::ArtifactNotFound(_) => "artifact_not_found",
            SpeechError::JobNotFound(_) => "job_not_found",
            SpeechError::NotCancellable { .. } => "not_cancellable",
            SpeechError::Cancelled => "cancelled",
        }
    }

    /// Whether the failure originates on the server/backend side
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            SpeechError::BackendUnavailable(_)
                | SpeechError::SynthesisFailed(_)
                | SpeechError::ArtifactExpired(_)
        )
    }

    /// Message safe to show to a caller
    pub fn public_message(&self) -> String {
        match self {
            SpeechError::BackendUnavailable(_) => {
                "Speech backend is temporarily unavailable".to_string()
            }
            SpeechError::SynthesisFailed(_) => "Speech synthesis failed".to_string(),
            SpeechError::ArtifactExpired(_) => "Audio is no longer available".to_string(),
            SpeechError::UnknownPreset(tag) => format!(
                "Unknown emotion '{}'. Available: {}",
                tag,
                Emotion::names().join(", ")
            ),
            other => other.to_string(),
        }
    }
}

impl From<SpeechError> for AppError {
    fn from(err: SpeechError) -> Self {
        if err.is_server_error() {
            tracing::error!(error = %err, kind = err.tag(), "Speech pipeline failure");
        }

        let message = err.public_message();
        match err {
            SpeechError::InvalidParameter { .. }
            | SpeechError::UnknownPreset(_)
            | SpeechError::InvalidVoiceReference(_) => AppError::BadRequest(message),
            SpeechError::ArtifactNotFound(_) | SpeechError::JobNotFound(_) => {
                AppError::NotFound(message)
            }
            SpeechError::NotCancellable { .. } | SpeechError::Cancelled => {
                AppError::Conflict(message)
            }
            SpeechError::BackendUnavailable(_) => AppError::ServiceUnavailable(message),
            SpeechError::SynthesisFailed(_) | SpeechError::ArtifactExpired(_) => {
                AppError::Internal(message)
            }
        }
    }
}
