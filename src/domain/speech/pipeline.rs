use super::error::SpeechError;
use super::request::SynthesisRequest;
use crate::domain::artifact::ArtifactId;
use crate::domain::job::JobExecutor;
use crate::infrastructure::backends::SynthesisBackend;
use crate::infrastructure::store::OutputStore;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Backend call followed by storage of the produced audio.
///
/// With the cache enabled, a request whose fingerprint matches an artifact
/// that is still stored and within its TTL completes without calling the
/// backend.
pub struct SynthesisPipeline {
    backend: Arc<dyn SynthesisBackend>,
    store: Arc<OutputStore>,
    cache: Option<Cache<String, ArtifactId>>,
}

impl SynthesisPipeline {
    pub fn new(backend: Arc<dyn SynthesisBackend>, store: Arc<OutputStore>, cache_enabled: bool) -> Self {
        let cache = if cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(100)
                    .time_to_idle(Duration::from_secs(30 * 60))
                    .build(),
            )
        } else {
            None
        };

        Self {
            backend,
            store,
            cache,
        }
    }

    async fn cached(&self, fingerprint: &str) -> Option<ArtifactId> {
        let cache = self.cache.as_ref()?;
        let artifact_id = cache.get(fingerprint).await?;
        if self.store.contains(artifact_id) {
            Some(artifact_id)
        } else {
            cache.invalidate(fingerprint).await;
            None
        }
    }
}

#[async_trait]
impl JobExecutor for SynthesisPipeline {
    async fn execute(&self, request: Arc<SynthesisRequest>) -> Result<ArtifactId, SpeechError> {
        let fingerprint = request.fingerprint();

        if let Some(artifact_id) = self.cached(&fingerprint).await {
            tracing::info!(
                artifact_id = %artifact_id,
                text_length = request.text.len(),
                "TTS cache hit - reusing stored audio"
            );
            return Ok(artifact_id);
        }

        let artifact = self.backend.synthesize(&request).await?;
        let artifact_id = self.store.store(artifact).await?;

        if let Some(cache) = &self.cache {
            cache.insert(fingerprint, artifact_id).await;
        }
        Ok(artifact_id)
    }
}
