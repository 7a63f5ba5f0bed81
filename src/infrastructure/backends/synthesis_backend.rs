use crate::domain::artifact::AudioArtifact;
use crate::domain::speech::params::SPEED;
use crate::domain::speech::{SpeechError, SynthesisRequest, VoiceKind};
use async_trait::async_trait;
use std::ops::RangeInclusive;

/// Failures a backend may report. Provider-specific errors are translated
/// into one of these before leaving the adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid voice reference: {0}")]
    InvalidVoiceReference(String),
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
}

impl From<BackendError> for SpeechError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => SpeechError::BackendUnavailable(msg),
            BackendError::InvalidVoiceReference(msg) => SpeechError::InvalidVoiceReference(msg),
            BackendError::InvalidParameter { field, reason } => {
                SpeechError::InvalidParameter { field, reason }
            }
            BackendError::SynthesisFailed(msg) => SpeechError::SynthesisFailed(msg),
        }
    }
}

/// Uniform interface over a speech-synthesis engine.
/// Abstracts the underlying provider (ElevenLabs, AWS Polly, a local model)
///
/// Implementations are responsible for:
/// - Mapping `ControlParams` onto provider parameter names
/// - Provider-specific voice selection
/// - Cleaning up any temporary files they create
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Kind of voice reference this backend expects
    fn voice_kind(&self) -> VoiceKind;

    /// How many calls the backend can serve at once. A single in-memory
    /// model reports 1.
    fn max_concurrency(&self) -> usize;

    /// Speeds the provider accepts. Requests outside it are rejected at
    /// validation, before they are queued.
    fn speed_range(&self) -> RangeInclusive<f32> {
        SPEED.min as f32..=SPEED.max as f32
    }

    /// Synthesize the request's (already annotated) text
    ///
    /// # Errors
    /// `Unavailable` on network or model load failure, `InvalidVoiceReference`
    /// when the voice cannot be found, `InvalidParameter` when the provider
    /// rejects a control value, `SynthesisFailed` for engine errors
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, BackendError>;
}
