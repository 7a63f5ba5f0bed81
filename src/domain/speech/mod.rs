pub mod dto;
pub mod error;
pub mod language;
pub mod params;
pub mod pipeline;
pub mod preset;
pub mod request;
pub mod service;

pub use dto::{
    EmotionInfo, EmotionsResponse, JobResponse, ServiceInfo, SpeakEmotionRequest, SpeakQuery,
    SpeakRequest,
};
pub use error::SpeechError;
pub use language::Language;
pub use params::{validate, validate_over, validate_text, ControlParams, RawControlParams};
pub use pipeline::SynthesisPipeline;
pub use preset::{resolve_preset, Emotion, EmotionPreset};
pub use request::{SynthesisRequest, VoiceKind, VoiceRef};
pub use service::{DeliveryMode, SpeakOutcome, SpeechService, SpeechServiceApi, SpeechServiceConfig};
