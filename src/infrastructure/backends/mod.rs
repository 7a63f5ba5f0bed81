pub mod elevenlabs_backend;
pub mod local_model_backend;
pub mod polly_backend;
pub mod synthesis_backend;
pub mod xtts_worker_model;

pub use elevenlabs_backend::{ElevenLabsBackend, ElevenLabsConfig};
pub use local_model_backend::{LocalModelBackend, ModelError, ModelInput, SpeechModel};
pub use polly_backend::PollyBackend;
pub use synthesis_backend::{BackendError, SynthesisBackend};
pub use xtts_worker_model::{XttsWorkerConfig, XttsWorkerModel};
