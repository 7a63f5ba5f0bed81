use super::language::Language;
use super::params::ControlParams;
use super::preset::Emotion;
use serde::Serialize;
use std::path::PathBuf;

/// Which kind of voice reference a backend understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceKind {
    /// Reference audio used for voice cloning (local models)
    SpeakerFile,
    /// Vendor voice identifier (cloud APIs)
    VoiceId,
}

/// Resolved voice for a synthesis request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VoiceRef {
    SpeakerFile(PathBuf),
    VoiceId(String),
    /// Let the backend pick its configured or language-appropriate voice
    BackendDefault,
}

impl VoiceRef {
    pub fn describe(&self) -> String {
        match self {
            VoiceRef::SpeakerFile(path) => path.display().to_string(),
            VoiceRef::VoiceId(id) => id.clone(),
            VoiceRef::BackendDefault => "default".to_string(),
        }
    }
}

/// A validated request, immutable once accepted by the queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    /// Text sent to the backend, including any emotion annotation
    pub text: String,
    pub voice: VoiceRef,
    pub language: Language,
    pub params: ControlParams,
    pub emotion: Option<Emotion>,
}

impl SynthesisRequest {
    /// Key identifying requests that would produce the same audio
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}
