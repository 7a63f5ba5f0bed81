use crate::domain::artifact::{ArtifactId, AudioArtifact, MediaType, StoredAudio};
use crate::domain::speech::SpeechError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use uuid::Uuid;

/// How many evicted handles are remembered so that late lookups can be told
/// apart from handles that never existed
const TOMBSTONE_LIMIT: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact {0} not found")]
    NotFound(ArtifactId),
    #[error("artifact {0} has expired")]
    Expired(ArtifactId),
    #[error("invalid speaker reference: {0}")]
    InvalidSpeaker(String),
    #[error("output store I/O error: {0}")]
    Io(String),
}

impl From<StoreError> for SpeechError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SpeechError::ArtifactNotFound(id),
            StoreError::Expired(id) => SpeechError::ArtifactExpired(id),
            StoreError::InvalidSpeaker(msg) => SpeechError::InvalidVoiceReference(msg),
            StoreError::Io(msg) => SpeechError::SynthesisFailed(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub output_dir: PathBuf,
    pub speakers_dir: PathBuf,
    pub capacity: usize,
    pub ttl: Duration,
}

struct StoredEntry {
    path: PathBuf,
    media_type: MediaType,
    created_at: DateTime<Utc>,
    stored_at: Instant,
}

#[derive(Default)]
struct StoreIndex {
    entries: HashMap<ArtifactId, StoredEntry>,
    /// Creation order, oldest first
    order: VecDeque<ArtifactId>,
    tombstones: HashSet<ArtifactId>,
    tombstone_order: VecDeque<ArtifactId>,
}

impl StoreIndex {
    fn remove(&mut self, id: ArtifactId) -> Option<StoredEntry> {
        let entry = self.entries.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        self.bury(id);
        Some(entry)
    }

    fn bury(&mut self, id: ArtifactId) {
        if self.tombstones.insert(id) {
            self.tombstone_order.push_back(id);
        }
        while self.tombstone_order.len() > TOMBSTONE_LIMIT {
            if let Some(oldest) = self.tombstone_order.pop_front() {
                self.tombstones.remove(&oldest);
            }
        }
    }

    fn missing(&self, id: ArtifactId) -> StoreError {
        if self.tombstones.contains(&id) {
            StoreError::Expired(id)
        } else {
            StoreError::NotFound(id)
        }
    }
}

/// Owns generated audio on disk and the speaker reference directory.
///
/// Artifacts are bounded by capacity (oldest created evicted first) and by
/// TTL. Lookups of an evicted or expired handle fail with `Expired`, lookups of
/// a handle that was never issued fail with `NotFound`. Artifacts left in the
/// output directory by an earlier run are adopted on open and fall under the
/// same bounds.
pub struct OutputStore {
    config: StoreConfig,
    index: Mutex<StoreIndex>,
}

impl OutputStore {
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|e| {
                StoreError::Io(format!(
                    "cannot create output directory {}: {}",
                    config.output_dir.display(),
                    e
                ))
            })?;

        let config = StoreConfig {
            capacity: config.capacity.max(1),
            ..config
        };
        let (index, stale) = reindex(&config).await?;
        for path in &stale {
            remove_file(path).await;
        }

        tracing::info!(
            output_dir = %config.output_dir.display(),
            speakers_dir = %config.speakers_dir.display(),
            capacity = config.capacity,
            ttl_secs = config.ttl.as_secs(),
            adopted = index.entries.len(),
            removed = stale.len(),
            "Output store ready"
        );

        Ok(Self {
            config,
            index: Mutex::new(index),
        })
    }

    pub async fn store(&self, artifact: AudioArtifact) -> Result<ArtifactId, StoreError> {
        let path = self.config.output_dir.join(artifact.file_name());
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(|e| StoreError::Io(format!("cannot write {}: {}", path.display(), e)))?;

        let evicted = {
            let mut index = self.index.lock();
            index.entries.insert(
                artifact.id,
                StoredEntry {
                    path,
                    media_type: artifact.media_type,
                    created_at: artifact.created_at,
                    stored_at: Instant::now(),
                },
            );
            index.order.push_back(artifact.id);

            let mut evicted = Vec::new();
            while index.order.len() > self.config.capacity {
                let Some(oldest) = index.order.front().copied() else {
                    break;
                };
                if let Some(entry) = index.remove(oldest) {
                    evicted.push((oldest, entry.path));
                }
            }
            evicted
        };

        for (id, path) in evicted {
            tracing::debug!(artifact_id = %id, "Evicting artifact over capacity");
            remove_file(&path).await;
        }

        tracing::debug!(
            artifact_id = %artifact.id,
            size_bytes = artifact.bytes.len(),
            "Artifact stored"
        );
        Ok(artifact.id)
    }

    pub async fn retrieve(&self, id: ArtifactId) -> Result<StoredAudio, StoreError> {
        let (path, media_type, created_at) = {
            let mut index = self.index.lock();
            let live = match index.entries.get(&id) {
                Some(entry) if entry.stored_at.elapsed() < self.config.ttl => {
                    Some((entry.path.clone(), entry.media_type, entry.created_at))
                }
                Some(_) => None,
                None => return Err(index.missing(id)),
            };
            match live {
                Some(found) => found,
                None => {
                    let stale = index.remove(id).map(|entry| entry.path);
                    drop(index);
                    if let Some(path) = stale {
                        self.discard(path);
                    }
                    return Err(StoreError::Expired(id));
                }
            }
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(StoredAudio {
                id,
                bytes,
                media_type,
                created_at,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(artifact_id = %id, "Artifact file disappeared from disk");
                self.index.lock().remove(id);
                Err(StoreError::Expired(id))
            }
            Err(e) => Err(StoreError::Io(format!("cannot read {}: {}", path.display(), e))),
        }
    }

    /// Remove an artifact. Returns whether it was present.
    pub async fn evict(&self, id: ArtifactId) -> bool {
        let removed = self.index.lock().remove(id);
        match removed {
            Some(entry) => {
                remove_file(&entry.path).await;
                true
            }
            None => false,
        }
    }

    /// Whether `id` is stored and still within its TTL
    pub fn contains(&self, id: ArtifactId) -> bool {
        self.index
            .lock()
            .entries
            .get(&id)
            .is_some_and(|entry| entry.stored_at.elapsed() < self.config.ttl)
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every artifact older than the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<PathBuf> = {
            let mut index = self.index.lock();
            let ttl = self.config.ttl;
            let ids: Vec<ArtifactId> = index
                .entries
                .iter()
                .filter(|(_, entry)| entry.stored_at.elapsed() >= ttl)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| index.remove(id).map(|entry| entry.path))
                .collect()
        };

        for path in &expired {
            remove_file(path).await;
        }
        expired.len()
    }

    /// Copy a stored artifact to `destination`, creating parent folders
    pub async fn export(&self, id: ArtifactId, destination: &Path) -> Result<u64, StoreError> {
        let audio = self.retrieve(id).await?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(destination, &audio.bytes)
            .await
            .map_err(|e| StoreError::Io(format!("cannot write {}: {}", destination.display(), e)))?;
        Ok(audio.bytes.len() as u64)
    }

    /// Resolve a speaker reference name to a file inside the speakers directory
    pub fn resolve_speaker(&self, name: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(name.trim());
        let is_plain = !name.trim().is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(StoreError::InvalidSpeaker(format!(
                "speaker_wav `{}` must be a file name inside the speakers directory",
                name
            )));
        }

        let path = self.config.speakers_dir.join(relative);
        if !path.is_file() {
            return Err(StoreError::InvalidSpeaker(format!(
                "speaker_wav `{}` not found",
                name
            )));
        }
        Ok(path)
    }

    /// Remove a stale file in the background so no lock is held across I/O
    fn discard(&self, path: PathBuf) {
        tokio::spawn(async move { remove_file(&path).await });
    }
}

/// Rebuild the index from `{uuid}.{ext}` files already in the output directory.
/// Returns the index plus the files that are past their TTL or over capacity.
async fn reindex(config: &StoreConfig) -> Result<(StoreIndex, Vec<PathBuf>), StoreError> {
    let io_error = |e: std::io::Error| {
        StoreError::Io(format!(
            "cannot scan output directory {}: {}",
            config.output_dir.display(),
            e
        ))
    };

    let mut found = Vec::new();
    let mut dir = tokio::fs::read_dir(&config.output_dir).await.map_err(io_error)?;
    while let Some(entry) = dir.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        let Some((id, media_type)) = artifact_file(&path) else {
            continue;
        };
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        found.push((modified, id, media_type, path));
    }
    found.sort_by_key(|(modified, ..)| *modified);

    let now = Instant::now();
    let mut index = StoreIndex::default();
    let mut stale = Vec::new();
    for (modified, id, media_type, path) in found {
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age >= config.ttl {
            index.bury(id);
            stale.push(path);
            continue;
        }
        index.entries.insert(
            id,
            StoredEntry {
                path,
                media_type,
                created_at: DateTime::<Utc>::from(modified),
                stored_at: now.checked_sub(age).unwrap_or(now),
            },
        );
        index.order.push_back(id);
    }

    while index.order.len() > config.capacity {
        let Some(oldest) = index.order.front().copied() else {
            break;
        };
        if let Some(entry) = index.remove(oldest) {
            stale.push(entry.path);
        }
    }

    Ok((index, stale))
}

fn artifact_file(path: &Path) -> Option<(ArtifactId, MediaType)> {
    let media_type = MediaType::from_extension(path.extension()?.to_str()?)?;
    let id = Uuid::parse_str(path.file_stem()?.to_str()?).ok()?;
    Some((ArtifactId::from(id), media_type))
}

async fn remove_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact file");
        }
    }
}
