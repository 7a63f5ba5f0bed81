use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle to a generated audio artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ArtifactId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Audio container produced by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Wav,
    Mpeg,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Wav => "audio/wav",
            MediaType::Mpeg => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Wav => "wav",
            MediaType::Mpeg => "mp3",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "wav" => Some(MediaType::Wav),
            "mp3" => Some(MediaType::Mpeg),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshly synthesized audio, before the output store takes ownership of it
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub id: ArtifactId,
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub created_at: DateTime<Utc>,
}

impl AudioArtifact {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            id: ArtifactId::new(),
            bytes,
            media_type,
            created_at: Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.media_type.extension())
    }
}

/// Audio read back from the output store
#[derive(Debug, Clone)]
pub struct StoredAudio {
    pub id: ArtifactId,
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
    pub created_at: DateTime<Utc>,
}

impl StoredAudio {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.media_type.extension())
    }
}
