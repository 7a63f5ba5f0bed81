use super::synthesis_backend::{BackendError, SynthesisBackend};
use crate::domain::artifact::{AudioArtifact, MediaType};
use crate::domain::speech::{ControlParams, Language, SynthesisRequest, VoiceKind, VoiceRef};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything a model needs to render one utterance
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub text: String,
    pub speaker_wav: PathBuf,
    pub language: Language,
    pub params: ControlParams,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model could not be loaded: {0}")]
    Load(String),
    #[error("speaker reference not found: {0}")]
    MissingSpeaker(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

impl From<ModelError> for BackendError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Load(msg) => BackendError::Unavailable(msg),
            ModelError::MissingSpeaker(msg) => BackendError::InvalidVoiceReference(msg),
            ModelError::Inference(msg) => BackendError::SynthesisFailed(msg),
        }
    }
}

/// A loaded, non-reentrant speech model. Calls block the current thread.
pub trait SpeechModel: Send {
    fn name(&self) -> &str;

    /// Render `input` as a WAV file at `output`
    fn render(&mut self, input: &ModelInput, output: &Path) -> Result<(), ModelError>;
}

/// Backend that owns a single in-process model instance.
///
/// The model is guarded by an async mutex and every render runs on the
/// blocking pool while holding it, so there is exactly one call in flight.
/// Output goes to a scoped temp directory that is removed when the call
/// returns, whatever the outcome.
pub struct LocalModelBackend {
    model: Arc<Mutex<Box<dyn SpeechModel>>>,
    temp_root: Option<PathBuf>,
}

impl LocalModelBackend {
    pub fn new(model: Box<dyn SpeechModel>) -> Self {
        Self {
            model: Arc::new(Mutex::new(model)),
            temp_root: None,
        }
    }

    /// Create render directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    fn speaker_for(voice: &VoiceRef) -> Result<PathBuf, BackendError> {
        match voice {
            VoiceRef::SpeakerFile(path) if path.is_file() => Ok(path.clone()),
            VoiceRef::SpeakerFile(path) => Err(BackendError::InvalidVoiceReference(format!(
                "speaker file {} does not exist",
                path.display()
            ))),
            VoiceRef::VoiceId(id) => Err(BackendError::InvalidVoiceReference(format!(
                "local model expects a speaker file, got voice id `{}`",
                id
            ))),
            VoiceRef::BackendDefault => Err(BackendError::InvalidVoiceReference(
                "local model requires a speaker reference file".to_string(),
            )),
        }
    }
}

fn render_scoped(
    model: &mut dyn SpeechModel,
    input: &ModelInput,
    temp_root: Option<&Path>,
) -> Result<Vec<u8>, ModelError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("voicebox-render-");
    let render_dir = match temp_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(|e| ModelError::Inference(format!("failed to create render directory: {}", e)))?;

    let output = render_dir.path().join("output.wav");
    model.render(input, &output)?;

    let bytes = std::fs::read(&output)
        .map_err(|e| ModelError::Inference(format!("model produced no readable output: {}", e)))?;
    if bytes.is_empty() {
        return Err(ModelError::Inference("model produced an empty file".to_string()));
    }
    Ok(bytes)
}

#[async_trait]
impl SynthesisBackend for LocalModelBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn voice_kind(&self) -> VoiceKind {
        VoiceKind::SpeakerFile
    }

    fn max_concurrency(&self) -> usize {
        1
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, BackendError> {
        let start_time = std::time::Instant::now();
        let input = ModelInput {
            text: request.text.clone(),
            speaker_wav: Self::speaker_for(&request.voice)?,
            language: request.language,
            params: request.params,
        };
        let temp_root = self.temp_root.clone();

        let mut model = self.model.clone().lock_owned().await;
        let model_name = model.name().to_string();

        tracing::info!(
            model = %model_name,
            speaker = %input.speaker_wav.display(),
            language = %input.language,
            text_length = input.text.len(),
            "Starting local model synthesis"
        );

        let bytes = tokio::task::spawn_blocking(move || {
            render_scoped(&mut **model, &input, temp_root.as_deref())
        })
        .await
        .map_err(|e| BackendError::SynthesisFailed(format!("model task aborted: {}", e)))?
        .map_err(|e| {
            tracing::error!(model = %model_name, error = %e, "Local model synthesis failed");
            BackendError::from(e)
        })?;

        tracing::info!(
            provider = "local",
            model = %model_name,
            latency_ms = start_time.elapsed().as_millis(),
            audio_size_bytes = bytes.len(),
            "TTS synthesis completed"
        );

        Ok(AudioArtifact::new(bytes, MediaType::Wav))
    }
}
