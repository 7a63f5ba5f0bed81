use super::synthesis_backend::{BackendError, SynthesisBackend};
use crate::domain::artifact::{AudioArtifact, MediaType};
use crate::domain::speech::{SynthesisRequest, VoiceKind, VoiceRef};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";
pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";

/// `voice_settings.speed` values the API accepts
pub const SPEED_RANGE: RangeInclusive<f32> = 0.7..=1.2;

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub default_voice_id: String,
    pub max_concurrency: usize,
    pub request_timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            default_voice_id: DEFAULT_VOICE_ID.to_string(),
            max_concurrency: 4,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    speed: f32,
}

/// ElevenLabs text-to-speech over its REST API
pub struct ElevenLabsBackend {
    client: reqwest::Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsBackend {
    pub fn new(config: ElevenLabsConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn voice_id<'a>(&'a self, voice: &'a VoiceRef) -> Result<&'a str, BackendError> {
        match voice {
            VoiceRef::VoiceId(id) => Ok(id.as_str()),
            VoiceRef::BackendDefault => Ok(self.config.default_voice_id.as_str()),
            VoiceRef::SpeakerFile(path) => Err(BackendError::InvalidVoiceReference(format!(
                "ElevenLabs expects a voice id, got speaker file {}",
                path.display()
            ))),
        }
    }

    fn map_status(status: StatusCode, voice_id: &str, body: &str) -> BackendError {
        let detail = format!("ElevenLabs returned {}: {}", status, truncate(body, 300));
        match status {
            StatusCode::NOT_FOUND => BackendError::InvalidVoiceReference(format!(
                "voice `{}` not found",
                voice_id
            )),
            StatusCode::UNPROCESSABLE_ENTITY if names_voice(body, voice_id) => {
                BackendError::InvalidVoiceReference(format!("voice `{}` rejected: {}", voice_id, truncate(body, 300)))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY if body.contains("speed") => {
                BackendError::InvalidParameter {
                    field: "speed".to_string(),
                    reason: format!("rejected by ElevenLabs: {}", truncate(body, 300)),
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                BackendError::Unavailable(detail)
            }
            s if s.is_server_error() => BackendError::Unavailable(detail),
            _ => BackendError::SynthesisFailed(detail),
        }
    }
}

#[async_trait]
impl SynthesisBackend for ElevenLabsBackend {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn voice_kind(&self) -> VoiceKind {
        VoiceKind::VoiceId
    }

    fn max_concurrency(&self) -> usize {
        self.config.max_concurrency.max(1)
    }

    fn speed_range(&self) -> RangeInclusive<f32> {
        SPEED_RANGE
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, BackendError> {
        let start_time = std::time::Instant::now();
        let voice_id = self.voice_id(&request.voice)?;
        if !SPEED_RANGE.contains(&request.params.speed) {
            return Err(BackendError::InvalidParameter {
                field: "speed".to_string(),
                reason: format!(
                    "ElevenLabs accepts {} to {}, got {}",
                    SPEED_RANGE.start(),
                    SPEED_RANGE.end(),
                    request.params.speed
                ),
            });
        }
        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(voice_id)
        );

        tracing::info!(
            voice_id = voice_id,
            model = %self.config.model_id,
            language = %request.language,
            text_length = request.text.len(),
            "Calling ElevenLabs text-to-speech"
        );

        let body = SpeechBody {
            text: &request.text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                speed: request.params.speed,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, MediaType::Mpeg.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, voice_id = voice_id, "ElevenLabs request failed");
                BackendError::Unavailable(format!("ElevenLabs request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, voice_id = voice_id, "ElevenLabs rejected the request");
            return Err(Self::map_status(status, voice_id, &text));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| BackendError::Unavailable(format!("failed to read ElevenLabs audio: {}", e)))?;

        if audio.is_empty() {
            return Err(BackendError::SynthesisFailed(
                "ElevenLabs returned an empty body".to_string(),
            ));
        }

        tracing::info!(
            provider = "elevenlabs",
            voice_id = voice_id,
            latency_ms = start_time.elapsed().as_millis(),
            audio_size_bytes = audio.len(),
            "TTS synthesis completed"
        );

        Ok(AudioArtifact::new(audio.to_vec(), MediaType::Mpeg))
    }
}

/// Whether an error body is about the requested voice rather than its settings
fn names_voice(body: &str, voice_id: &str) -> bool {
    body.contains("voice_not_found")
        || body.contains("voice_id")
        || (!voice_id.is_empty() && body.contains(voice_id))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
