use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use voicebox::controllers::{jobs::JobsController, speech::SpeechController};
use voicebox::domain::speech::{DeliveryMode, SpeechService, SpeechServiceConfig, VoiceKind};
use voicebox::infrastructure::http::build_router;
use voicebox::infrastructure::store::{OutputStore, StoreConfig};

pub mod api_client;
pub mod fake_backend;

use api_client::TestClient;
use fake_backend::FakeBackend;

/// How the server under test is wired
pub struct TestOptions {
    pub voice_kind: VoiceKind,
    pub delivery_mode: DeliveryMode,
    /// When set, every backend call waits for a permit from the test
    pub gate: Option<Arc<Semaphore>>,
    pub artifact_ttl: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            voice_kind: VoiceKind::SpeakerFile,
            delivery_mode: DeliveryMode::Sync,
            gate: None,
            artifact_ttl: Duration::from_secs(300),
        }
    }
}

pub struct TestContext {
    pub client: TestClient,
    pub backend: Arc<FakeBackend>,
    #[allow(dead_code)]
    pub service: Arc<SpeechService>,
    _dir: TempDir,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            TestContext::start(TestOptions::default())
                .await
                .expect("Failed to start test server")
        }
    }
}

impl TestContext {
    /// Boot the real router on an ephemeral port with a fake backend
    pub async fn start(options: TestOptions) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let speakers_dir = dir.path().join("speakers");
        std::fs::create_dir_all(&speakers_dir)?;
        std::fs::write(speakers_dir.join("test.wav"), b"RIFF")?;
        std::fs::write(speakers_dir.join("narrator.wav"), b"RIFF")?;

        let store = Arc::new(
            OutputStore::open(StoreConfig {
                output_dir: dir.path().join("output"),
                speakers_dir,
                capacity: 32,
                ttl: options.artifact_ttl,
            })
            .await?,
        );

        let mut backend = FakeBackend::new(options.voice_kind);
        if let Some(gate) = options.gate {
            backend = backend.gated(gate);
        }
        let backend = Arc::new(backend);

        let service = Arc::new(SpeechService::new(
            backend.clone(),
            store,
            SpeechServiceConfig {
                delivery_mode: options.delivery_mode,
                synthesis_timeout: Duration::from_secs(10),
                ..SpeechServiceConfig::default()
            },
        ));
        let app = build_router(
            service.clone(),
            Arc::new(SpeechController::new(service.clone())),
            Arc::new(JobsController::new(service.clone())),
        );

        // Start server
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready
        tokio::time::sleep(Duration::from_millis(100)).await;

        Ok(Self {
            client: TestClient::new(&base_url),
            backend,
            service,
            _dir: dir,
        })
    }

    /// Poll a job until it is done or failed
    pub async fn wait_for_job(&self, job_id: &str) -> Result<serde_json::Value> {
        for _ in 0..200 {
            let response = self.client.get(&format!("/jobs/{}", job_id)).await?;
            if let Some(body) = &response.body {
                let state = body.get("state").and_then(|s| s.as_str());
                if matches!(state, Some("done") | Some("failed")) {
                    return Ok(body.clone());
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!("job {} did not finish in time", job_id)
    }
}
