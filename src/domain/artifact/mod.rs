pub mod model;

pub use model::{ArtifactId, AudioArtifact, MediaType, StoredAudio};
