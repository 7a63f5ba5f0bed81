use super::dto::{
    EmotionInfo, EmotionsResponse, ServiceInfo, SpeakEmotionRequest, SpeakRequest,
};
use super::error::SpeechError;
use super::language::Language;
use super::params::{validate, validate_over, validate_text, ControlParams, PARAM_SPECS};
use super::pipeline::SynthesisPipeline;
use super::preset::Emotion;
use super::request::{SynthesisRequest, VoiceKind, VoiceRef};
use crate::domain::artifact::{ArtifactId, StoredAudio};
use crate::domain::job::{JobId, JobQueue, JobState, QueueConfig, QueueStats, SynthesisJob};
use crate::infrastructure::backends::SynthesisBackend;
use crate::infrastructure::store::OutputStore;
use async_trait::async_trait;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Whether a submission waits for its audio or returns the job handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Sync,
    Async,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Sync => "sync",
            DeliveryMode::Async => "async",
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sync" => Ok(DeliveryMode::Sync),
            "async" => Ok(DeliveryMode::Async),
            other => Err(SpeechError::invalid_parameter(
                "mode",
                format!("expected `sync` or `async`, got `{}`", other),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechServiceConfig {
    pub max_text_chars: usize,
    /// Speaker reference used by speaker-file backends when the request has none
    pub default_speaker: String,
    pub delivery_mode: DeliveryMode,
    pub max_concurrency: usize,
    pub synthesis_timeout: Duration,
    pub job_ttl: Duration,
    pub cache_enabled: bool,
}

impl Default for SpeechServiceConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 10_000,
            default_speaker: "test.wav".to_string(),
            delivery_mode: DeliveryMode::Sync,
            max_concurrency: 4,
            synthesis_timeout: Duration::from_secs(120),
            job_ttl: Duration::from_secs(3600),
            cache_enabled: false,
        }
    }
}

#[derive(Debug)]
pub enum SpeakOutcome {
    /// Asynchronous submission: the job was queued
    Accepted(SynthesisJob),
    /// Synchronous submission: the job is Done and its audio is attached
    Completed { job: SynthesisJob, audio: StoredAudio },
}

/// Orchestrates validation, queueing and artifact delivery
pub struct SpeechService {
    backend_name: &'static str,
    voice_kind: VoiceKind,
    speed_range: RangeInclusive<f32>,
    queue: JobQueue,
    store: Arc<OutputStore>,
    config: SpeechServiceConfig,
}

impl SpeechService {
    /// Must be called from within a tokio runtime
    pub fn new(
        backend: Arc<dyn SynthesisBackend>,
        store: Arc<OutputStore>,
        config: SpeechServiceConfig,
    ) -> Self {
        let concurrency = config
            .max_concurrency
            .min(backend.max_concurrency())
            .max(1);
        let pipeline = Arc::new(SynthesisPipeline::new(
            backend.clone(),
            store.clone(),
            config.cache_enabled,
        ));
        let queue = JobQueue::new(
            pipeline,
            QueueConfig {
                concurrency,
                timeout: config.synthesis_timeout,
                job_ttl: config.job_ttl,
            },
        );

        tracing::info!(
            backend = backend.name(),
            concurrency = concurrency,
            delivery_mode = config.delivery_mode.as_str(),
            cache_enabled = config.cache_enabled,
            "Speech service initialized"
        );

        Self {
            backend_name: backend.name(),
            voice_kind: backend.voice_kind(),
            speed_range: backend.speed_range(),
            queue,
            store,
            config,
        }
    }

    /// Validate a /speak body. Explicit parameters win over the emotion preset.
    pub fn prepare(&self, request: SpeakRequest) -> Result<SynthesisRequest, SpeechError> {
        let text = validate_text(request.text.as_deref(), self.config.max_text_chars)?;
        let language = parse_language(request.language.as_deref())?;
        let emotion = request
            .emotion
            .as_deref()
            .map(Emotion::from_str)
            .transpose()?;

        let (params, text) = match emotion {
            Some(emotion) => {
                let preset = emotion.preset();
                let params = validate_over(preset.apply(Default::default()), &request.params)?;
                (params, preset.annotate(&text))
            }
            None => (validate(&request.params)?, text),
        };
        self.check_backend_limits(&params)?;

        let voice = self.resolve_voice(request.speaker_wav.as_deref(), request.voice_id.as_deref())?;

        Ok(SynthesisRequest {
            text,
            voice,
            language,
            params,
            emotion,
        })
    }

    /// Validate a /speak_emotion body
    pub fn prepare_emotion(
        &self,
        request: SpeakEmotionRequest,
    ) -> Result<SynthesisRequest, SpeechError> {
        let text = validate_text(request.text.as_deref(), self.config.max_text_chars)?;
        let tag = request
            .emotion
            .as_deref()
            .ok_or_else(|| SpeechError::invalid_parameter("emotion", "emotion is required"))?;
        let emotion = Emotion::from_str(tag)?;
        let language = parse_language(request.language.as_deref())?;
        let voice = self.resolve_voice(request.speaker_wav.as_deref(), request.voice_id.as_deref())?;

        let preset = emotion.preset();
        let params = preset.apply(Default::default());
        self.check_backend_limits(&params)?;

        Ok(SynthesisRequest {
            text: preset.annotate(&text),
            voice,
            language,
            params,
            emotion: Some(emotion),
        })
    }

    /// Reject values inside the general range that this backend cannot honour
    fn check_backend_limits(&self, params: &ControlParams) -> Result<(), SpeechError> {
        if self.speed_range.contains(&params.speed) {
            return Ok(());
        }
        Err(SpeechError::invalid_parameter(
            "speed",
            format!(
                "the {} backend supports {} to {}, got {}",
                self.backend_name,
                self.speed_range.start(),
                self.speed_range.end(),
                params.speed
            ),
        ))
    }

    fn resolve_voice(
        &self,
        speaker_wav: Option<&str>,
        voice_id: Option<&str>,
    ) -> Result<VoiceRef, SpeechError> {
        match self.voice_kind {
            VoiceKind::SpeakerFile => {
                if let Some(id) = voice_id {
                    return Err(SpeechError::InvalidVoiceReference(format!(
                        "voice_id `{}` is not supported by the {} backend, use speaker_wav",
                        id, self.backend_name
                    )));
                }
                let name = speaker_wav.unwrap_or(&self.config.default_speaker);
                let path = self.store.resolve_speaker(name)?;
                Ok(VoiceRef::SpeakerFile(path))
            }
            VoiceKind::VoiceId => {
                if let Some(name) = speaker_wav {
                    return Err(SpeechError::InvalidVoiceReference(format!(
                        "speaker_wav `{}` is not supported by the {} backend, use voice_id",
                        name, self.backend_name
                    )));
                }
                match voice_id.map(str::trim) {
                    Some("") => Err(SpeechError::InvalidVoiceReference(
                        "voice_id cannot be empty".to_string(),
                    )),
                    Some(id) => Ok(VoiceRef::VoiceId(id.to_string())),
                    None => Ok(VoiceRef::BackendDefault),
                }
            }
        }
    }

    /// The configured delivery mode, unless the caller overrides it
    pub fn delivery_mode(&self, requested: Option<&str>) -> Result<DeliveryMode, SpeechError> {
        match requested {
            Some(mode) => mode.parse(),
            None => Ok(self.config.delivery_mode),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn queued_jobs(&self) -> Vec<JobId> {
        self.queue.queued()
    }

    pub fn is_ready(&self) -> bool {
        self.queue.is_accepting()
    }

    pub fn info(&self) -> ServiceInfo {
        let default_speaker = match self.voice_kind {
            VoiceKind::SpeakerFile => Some(self.config.default_speaker.clone()),
            VoiceKind::VoiceId => None,
        };

        ServiceInfo {
            message: "Voicebox speech synthesis API".to_string(),
            status: if self.is_ready() { "running" } else { "degraded" }.to_string(),
            backend: self.backend_name.to_string(),
            default_speaker,
            delivery_mode: self.config.delivery_mode.as_str().to_string(),
            available_emotions: Emotion::names().into_iter().map(String::from).collect(),
            languages: Language::ALL.iter().map(|l| l.as_str().to_string()).collect(),
            voice_controls: PARAM_SPECS
                .iter()
                .map(|spec| (spec.name.to_string(), spec.summary()))
                .collect(),
            queue: self.queue.stats(),
        }
    }

    pub fn emotions(&self) -> EmotionsResponse {
        EmotionsResponse {
            emotions: Emotion::ALL
                .iter()
                .map(|emotion| {
                    let preset = emotion.preset();
                    EmotionInfo {
                        name: emotion.as_str().to_string(),
                        temperature: preset.temperature,
                        speed: preset.speed,
                        top_p: preset.top_p,
                        prefix: preset.prefix.to_string(),
                    }
                })
                .collect(),
        }
    }

    /// Periodically drop finished jobs and expired artifacts
    pub fn spawn_maintenance(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let jobs = service.queue.purge_finished();
                let artifacts = service.store.purge_expired().await;
                if jobs > 0 || artifacts > 0 {
                    tracing::info!(
                        purged_jobs = jobs,
                        purged_artifacts = artifacts,
                        "Maintenance sweep completed"
                    );
                }
            }
        })
    }
}

fn parse_language(code: Option<&str>) -> Result<Language, SpeechError> {
    match code {
        Some(code) => code.parse(),
        None => Ok(Language::default()),
    }
}

#[async_trait]
pub trait SpeechServiceApi: Send + Sync {
    /// Submit a validated request.
    ///
    /// In `Sync` mode this waits for the job and returns its audio; a failed
    /// or cancelled job surfaces its error. In `Async` mode the queued job is
    /// returned immediately.
    async fn speak(
        &self,
        request: SynthesisRequest,
        mode: DeliveryMode,
    ) -> Result<SpeakOutcome, SpeechError>;

    fn job(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError>;

    /// Cancel a queued job
    fn cancel_job(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError>;

    async fn artifact(&self, artifact_id: ArtifactId) -> Result<StoredAudio, SpeechError>;

    /// Write a stored artifact to `destination`
    async fn export(&self, artifact_id: ArtifactId, destination: &Path) -> Result<u64, SpeechError>;
}

#[async_trait]
impl SpeechServiceApi for SpeechService {
    async fn speak(
        &self,
        request: SynthesisRequest,
        mode: DeliveryMode,
    ) -> Result<SpeakOutcome, SpeechError> {
        tracing::info!(
            backend = self.backend_name,
            voice = %request.voice.describe(),
            language = %request.language,
            emotion = ?request.emotion,
            text_length = request.text.len(),
            mode = mode.as_str(),
            "Speech request accepted"
        );

        let job_id = self.queue.submit(request)?;
        if mode == DeliveryMode::Async {
            return Ok(SpeakOutcome::Accepted(self.queue.get(job_id)?));
        }

        let job = self.queue.wait(job_id).await?;
        match (job.state, job.result) {
            (JobState::Done, Some(artifact_id)) => {
                let audio = self.store.retrieve(artifact_id).await?;
                Ok(SpeakOutcome::Completed { job, audio })
            }
            _ => Err(job.error.clone().unwrap_or_else(|| {
                SpeechError::SynthesisFailed(format!("job {} ended without audio", job.id))
            })),
        }
    }

    fn job(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError> {
        self.queue.get(job_id)
    }

    fn cancel_job(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError> {
        self.queue.cancel(job_id)
    }

    async fn artifact(&self, artifact_id: ArtifactId) -> Result<StoredAudio, SpeechError> {
        Ok(self.store.retrieve(artifact_id).await?)
    }

    async fn export(&self, artifact_id: ArtifactId, destination: &Path) -> Result<u64, SpeechError> {
        Ok(self.store.export(artifact_id, destination).await?)
    }
}
