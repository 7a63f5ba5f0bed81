use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voicebox::controllers::{jobs::JobsController, speech::SpeechController};
use voicebox::domain::speech::SpeechService;
use voicebox::infrastructure::backends::{
    ElevenLabsBackend, LocalModelBackend, PollyBackend, SynthesisBackend, XttsWorkerModel,
};
use voicebox::infrastructure::config::{BackendKind, Config, LogFormat};
use voicebox::infrastructure::http::start_http_server;
use voicebox::infrastructure::store::OutputStore;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        backend = ?config.backend,
        "Starting Voicebox on {}:{}",
        config.host,
        config.port
    );

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Synthesis backend (loaded once, start-up fails if it cannot be)
    let backend = build_backend(&config).await?;
    tracing::info!(backend = backend.name(), "Synthesis backend ready");

    // 2. Output store
    let store = Arc::new(OutputStore::open(config.store_config()).await?);

    // 3. Services
    let speech_service = Arc::new(SpeechService::new(
        backend,
        store,
        config.service_config(),
    ));
    speech_service.spawn_maintenance(MAINTENANCE_INTERVAL);

    // 4. Controllers
    let speech_controller = Arc::new(SpeechController::new(speech_service.clone()));
    let jobs_controller = Arc::new(JobsController::new(speech_service.clone()));

    // Start HTTP server with all routes
    start_http_server(
        Arc::new(config),
        speech_service,
        speech_controller,
        jobs_controller,
    )
    .await?;

    Ok(())
}

async fn build_backend(config: &Config) -> Result<Arc<dyn SynthesisBackend>, Box<dyn std::error::Error>> {
    let backend: Arc<dyn SynthesisBackend> = match config.backend {
        BackendKind::Local => {
            tracing::info!(
                python = %config.tts_python.display(),
                model = %config.tts_model_name,
                device = %config.tts_device,
                "Loading local speech model"
            );
            let xtts_config = config.xtts_config();
            let model = tokio::task::spawn_blocking(move || XttsWorkerModel::load(xtts_config)).await??;
            Arc::new(LocalModelBackend::new(Box::new(model)))
        }
        BackendKind::ElevenLabs => {
            let elevenlabs_config = config
                .elevenlabs_config()
                .ok_or("ELEVENLABS_API_KEY is required when BACKEND=elevenlabs")?;
            Arc::new(ElevenLabsBackend::new(elevenlabs_config)?)
        }
        BackendKind::Polly => {
            tracing::info!("Initializing AWS Polly client with region: {}", config.aws_region);

            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(config.aws_region.clone()))
                .load()
                .await;

            tracing::info!(region = ?aws_config.region(), "AWS configuration loaded");

            let polly_client = Arc::new(aws_sdk_polly::Client::new(&aws_config));
            Arc::new(PollyBackend::new(polly_client, config.max_concurrency))
        }
    };
    Ok(backend)
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "voicebox=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "voicebox=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
