use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use voicebox::domain::speech::{
    DeliveryMode, RawControlParams, SpeakOutcome, SpeakRequest, SpeechService, SpeechServiceApi,
    SpeechServiceConfig,
};
use voicebox::infrastructure::backends::{
    elevenlabs_backend::{DEFAULT_BASE_URL, DEFAULT_MODEL_ID, DEFAULT_VOICE_ID},
    ElevenLabsBackend, ElevenLabsConfig,
};
use voicebox::infrastructure::store::{OutputStore, StoreConfig};

/// Synthesize one utterance with ElevenLabs and save it to disk
#[derive(Parser, Debug)]
#[command(name = "speak-once")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Text to speak
    #[arg(short = 't', long = "text", default_value = "Hi! This is Eleven from Stranger Things.")]
    text: String,

    /// ElevenLabs voice id
    #[arg(long = "voice-id", default_value = DEFAULT_VOICE_ID)]
    voice_id: String,

    /// ElevenLabs model id
    #[arg(long = "model-id", default_value = DEFAULT_MODEL_ID)]
    model_id: String,

    /// Where to write the MP3 (parent folders are created)
    #[arg(short = 'o', long = "output", default_value = "output_audio_files/elevenlabs_output.mp3")]
    output: PathBuf,

    /// Language code
    #[arg(short = 'l', long = "language", default_value = "en")]
    language: String,

    /// Speaking rate, 0.5 to 2.0
    #[arg(long = "speed")]
    speed: Option<f64>,

    /// Emotion preset applied to the text
    #[arg(short = 'e', long = "emotion")]
    emotion: Option<String>,

    /// Seconds to wait for the synthesis call
    #[arg(long = "timeout", default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicebox=info".into()),
        )
        .init();

    let api_key = std::env::var("ELEVENLABS_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .context("ELEVENLABS_API_KEY is not set (checked the environment and .env)")?;

    let backend = ElevenLabsBackend::new(ElevenLabsConfig {
        base_url: std::env::var("ELEVENLABS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        model_id: cli.model_id.clone(),
        max_concurrency: 1,
        ..ElevenLabsConfig::new(api_key)
    })
    .context("failed to initialize the ElevenLabs client")?;

    let scratch = tempfile::tempdir().context("failed to create a scratch directory")?;
    let store = Arc::new(
        OutputStore::open(StoreConfig {
            output_dir: scratch.path().join("artifacts"),
            speakers_dir: scratch.path().to_path_buf(),
            capacity: 1,
            ttl: Duration::from_secs(3600),
        })
        .await?,
    );

    let service = SpeechService::new(
        Arc::new(backend),
        store,
        SpeechServiceConfig {
            max_concurrency: 1,
            synthesis_timeout: Duration::from_secs(cli.timeout_secs),
            ..SpeechServiceConfig::default()
        },
    );

    let request = service.prepare(SpeakRequest {
        text: Some(cli.text),
        voice_id: Some(cli.voice_id.clone()),
        language: Some(cli.language),
        params: RawControlParams {
            speed: cli.speed.map(serde_json::Value::from),
            ..RawControlParams::default()
        },
        emotion: cli.emotion,
        ..SpeakRequest::default()
    })?;

    tracing::info!(voice_id = %cli.voice_id, model_id = %cli.model_id, "Generating audio");

    let audio = match service.speak(request, DeliveryMode::Sync).await? {
        SpeakOutcome::Completed { audio, .. } => audio,
        SpeakOutcome::Accepted(job) => anyhow::bail!("job {} did not complete", job.id),
    };

    let written = service
        .export(audio.id, &cli.output)
        .await
        .with_context(|| format!("failed to save audio to {}", cli.output.display()))?;

    println!("Audio saved to {} ({} bytes)", cli.output.display(), written);
    Ok(())
}
