use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use voicebox::domain::artifact::{AudioArtifact, MediaType};
use voicebox::domain::speech::{SynthesisRequest, VoiceKind};
use voicebox::infrastructure::backends::{BackendError, SynthesisBackend};

pub const FAKE_WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

/// In-process backend that records every request it receives.
///
/// Text containing `explode` fails with an engine error and text containing
/// `offline` reports the backend as unavailable. When gated, every call
/// waits for a permit from the test.
pub struct FakeBackend {
    kind: VoiceKind,
    max_concurrency: usize,
    gate: Option<Arc<Semaphore>>,
    seen: Mutex<Vec<SynthesisRequest>>,
}

impl FakeBackend {
    pub fn new(kind: VoiceKind) -> Self {
        Self {
            kind,
            max_concurrency: 1,
            gate: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.seen.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl SynthesisBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn voice_kind(&self) -> VoiceKind {
        self.kind
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, BackendError> {
        self.seen.lock().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| BackendError::Unavailable(e.to_string()))?
                .forget();
        }

        if request.text.contains("explode") {
            return Err(BackendError::SynthesisFailed(
                "CUDA out of memory in decoder layer 7".to_string(),
            ));
        }
        if request.text.contains("offline") {
            return Err(BackendError::Unavailable("connection refused by 10.0.0.7".to_string()));
        }

        Ok(AudioArtifact::new(FAKE_WAV.to_vec(), MediaType::Wav))
    }
}
