use crate::domain::speech::{DeliveryMode, SpeechServiceConfig};
use crate::infrastructure::backends::{
    elevenlabs_backend::{DEFAULT_BASE_URL, DEFAULT_MODEL_ID, DEFAULT_VOICE_ID},
    xtts_worker_model::{DEFAULT_DEVICE, DEFAULT_MODEL_NAME, DEFAULT_PYTHON},
    ElevenLabsConfig, XttsWorkerConfig,
};
use crate::infrastructure::store::StoreConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub backend: BackendKind,
    // ElevenLabs
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_base_url: String,
    pub elevenlabs_model_id: String,
    pub default_voice_id: String,
    // AWS Polly
    pub aws_region: String,
    // Local model
    pub tts_python: PathBuf,
    pub tts_model_name: String,
    pub tts_device: String,
    // Files
    pub speakers_dir: PathBuf,
    pub default_speaker_wav: String,
    pub output_dir: PathBuf,
    // Queue
    pub max_concurrency: usize,
    pub synthesis_timeout_secs: u64,
    pub delivery_mode: DeliveryMode,
    pub job_ttl_secs: u64,
    // Store
    pub artifact_capacity: usize,
    pub artifact_ttl_secs: u64,
    // Requests
    pub max_text_chars: usize,
    pub tts_cache_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Which synthesis engine the service drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    ElevenLabs,
    Polly,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "xtts" => Ok(BackendKind::Local),
            "elevenlabs" => Ok(BackendKind::ElevenLabs),
            "polly" => Ok(BackendKind::Polly),
            other => Err(format!(
                "unknown BACKEND `{}`, expected local, elevenlabs or polly",
                other
            )),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let backend: BackendKind = env::var("BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse()?;

        let elevenlabs_api_key = env::var("ELEVENLABS_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        if backend == BackendKind::ElevenLabs && elevenlabs_api_key.is_none() {
            return Err("ELEVENLABS_API_KEY is required when BACKEND=elevenlabs".into());
        }

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8000)?,
            log_format: env::var("LOG_FORMAT")
                .map(|s| match s.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })
                .unwrap_or(LogFormat::Pretty),
            backend,
            elevenlabs_api_key,
            elevenlabs_base_url: env::var("ELEVENLABS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            elevenlabs_model_id: env::var("ELEVENLABS_MODEL_ID")
                .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
            default_voice_id: env::var("DEFAULT_VOICE_ID")
                .unwrap_or_else(|_| DEFAULT_VOICE_ID.to_string()),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "eu-west-1".to_string()),
            tts_python: env::var("TTS_PYTHON")
                .unwrap_or_else(|_| DEFAULT_PYTHON.to_string())
                .into(),
            tts_model_name: env::var("TTS_MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string()),
            tts_device: env::var("TTS_DEVICE")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_else(|_| DEFAULT_DEVICE.to_string()),
            speakers_dir: env::var("SPEAKERS_DIR")
                .unwrap_or_else(|_| ".".to_string())
                .into(),
            default_speaker_wav: env::var("DEFAULT_SPEAKER_WAV")
                .unwrap_or_else(|_| "test.wav".to_string()),
            output_dir: env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "output".to_string())
                .into(),
            max_concurrency: parse_var("MAX_CONCURRENCY", 4)?,
            synthesis_timeout_secs: parse_var("SYNTHESIS_TIMEOUT_SECS", 120)?,
            delivery_mode: env::var("DELIVERY_MODE")
                .unwrap_or_else(|_| "sync".to_string())
                .parse()?,
            job_ttl_secs: parse_var("JOB_TTL_SECS", 3600)?,
            artifact_capacity: parse_var("ARTIFACT_CAPACITY", 256)?,
            artifact_ttl_secs: parse_var("ARTIFACT_TTL_SECS", 1800)?,
            max_text_chars: parse_var("MAX_TEXT_CHARS", 10_000)?,
            tts_cache_enabled: parse_flag("TTS_CACHE_ENABLED"),
        };

        if config.max_concurrency == 0 {
            return Err("MAX_CONCURRENCY must be at least 1".into());
        }
        if !matches!(config.tts_device.as_str(), "auto" | "cpu" | "cuda") {
            return Err(format!(
                "invalid TTS_DEVICE `{}`, expected auto, cpu or cuda",
                config.tts_device
            )
            .into());
        }

        Ok(config)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            output_dir: self.output_dir.clone(),
            speakers_dir: self.speakers_dir.clone(),
            capacity: self.artifact_capacity,
            ttl: Duration::from_secs(self.artifact_ttl_secs),
        }
    }

    pub fn service_config(&self) -> SpeechServiceConfig {
        SpeechServiceConfig {
            max_text_chars: self.max_text_chars,
            default_speaker: self.default_speaker_wav.clone(),
            delivery_mode: self.delivery_mode,
            max_concurrency: self.max_concurrency,
            synthesis_timeout: Duration::from_secs(self.synthesis_timeout_secs),
            job_ttl: Duration::from_secs(self.job_ttl_secs),
            cache_enabled: self.tts_cache_enabled,
        }
    }

    pub fn elevenlabs_config(&self) -> Option<ElevenLabsConfig> {
        let api_key = self.elevenlabs_api_key.clone()?;
        Some(ElevenLabsConfig {
            base_url: self.elevenlabs_base_url.clone(),
            model_id: self.elevenlabs_model_id.clone(),
            default_voice_id: self.default_voice_id.clone(),
            max_concurrency: self.max_concurrency,
            ..ElevenLabsConfig::new(api_key)
        })
    }

    pub fn xtts_config(&self) -> XttsWorkerConfig {
        XttsWorkerConfig {
            python: self.tts_python.clone(),
            model_name: self.tts_model_name.clone(),
            device: self.tts_device.clone(),
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("invalid {} `{}`: {}", key, raw, e).into()),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &str) -> bool {
    env::var(key)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
