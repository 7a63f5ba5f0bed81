use super::synthesis_backend::{BackendError, SynthesisBackend};
use crate::domain::artifact::{AudioArtifact, MediaType};
use crate::domain::speech::{Language, SynthesisRequest, VoiceKind, VoiceRef};
use async_trait::async_trait;
use aws_sdk_polly::{
    error::{DisplayErrorContext, SdkError},
    operation::synthesize_speech::SynthesizeSpeechError,
    types::{Engine, OutputFormat, TextType, VoiceId},
    Client as PollyClient,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Escaped text per request. Polly caps a request at 3000 billed characters
/// and 6000 characters of SSML in total.
const MAX_BATCH_SIZE: usize = 3000;

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("valid regex"));

/// AWS Polly implementation of the synthesis backend (neural engine, MP3)
pub struct PollyBackend {
    polly_client: Arc<PollyClient>,
    max_concurrency: usize,
}

impl PollyBackend {
    pub fn new(polly_client: Arc<PollyClient>, max_concurrency: usize) -> Self {
        Self {
            polly_client,
            max_concurrency,
        }
    }

    /// Neural voice used when the request names none
    fn default_voice_for(language: Language) -> Option<&'static str> {
        match language {
            Language::English => Some("Joanna"),
            Language::Spanish => Some("Lupe"),
            Language::French => Some("Lea"),
            Language::German => Some("Vicki"),
            Language::Italian => Some("Bianca"),
            Language::Portuguese => Some("Ines"),
            Language::Polish => Some("Ola"),
            Language::Dutch => Some("Laura"),
            Language::Arabic => Some("Hala"),
            Language::Chinese => Some("Zhiyu"),
            Language::Japanese => Some("Takumi"),
            Language::Korean => Some("Seoyeon"),
            Language::Turkish => Some("Burcu"),
            Language::Russian | Language::Czech | Language::Hungarian | Language::Hindi => None,
        }
    }

    fn voice_for(request: &SynthesisRequest) -> Result<String, BackendError> {
        match &request.voice {
            VoiceRef::VoiceId(id) => Ok(id.clone()),
            VoiceRef::BackendDefault => Self::default_voice_for(request.language)
                .map(str::to_string)
                .ok_or_else(|| {
                    BackendError::InvalidVoiceReference(format!(
                        "no default Polly voice for language `{}`, pass a voice_id",
                        request.language
                    ))
                }),
            VoiceRef::SpeakerFile(path) => Err(BackendError::InvalidVoiceReference(format!(
                "Polly expects a voice id, got speaker file {}",
                path.display()
            ))),
        }
    }

    async fn call_polly(&self, ssml: &str, voice: &str) -> Result<Vec<u8>, BackendError> {
        tracing::debug!(voice = voice, ssml_length = ssml.len(), "Calling AWS Polly synthesize_speech");

        let result = self
            .polly_client
            .synthesize_speech()
            .text(ssml)
            .text_type(TextType::Ssml)
            .voice_id(VoiceId::from(voice))
            .output_format(OutputFormat::Mp3)
            .engine(Engine::Neural)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    voice = voice,
                    "AWS Polly synthesize_speech failed"
                );
                map_sdk_error(e)
            })?;

        let audio_stream = result.audio_stream.collect().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to collect audio stream from Polly response");
            BackendError::Unavailable(format!("failed to read Polly audio stream: {}", e))
        })?;

        Ok(audio_stream.into_bytes().to_vec())
    }
}

#[async_trait]
impl SynthesisBackend for PollyBackend {
    fn name(&self) -> &'static str {
        "polly"
    }

    fn voice_kind(&self) -> VoiceKind {
        VoiceKind::VoiceId
    }

    fn max_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioArtifact, BackendError> {
        let start_time = std::time::Instant::now();
        let voice = Self::voice_for(request)?;
        let batches = split_into_batches(&request.text, MAX_BATCH_SIZE);

        tracing::info!(
            voice = %voice,
            language = %request.language,
            batch_count = batches.len(),
            text_length = request.text.len(),
            "Starting AWS Polly synthesis"
        );

        // MP3 frames concatenate cleanly, so batches are merged in order
        let mut merged_audio = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            let ssml = to_ssml(batch, request.params.speed);
            let audio = self.call_polly(&ssml, &voice).await?;
            merged_audio.extend(audio);

            tracing::debug!(
                batch_index = index,
                total_audio_size = merged_audio.len(),
                "Batch synthesized and merged"
            );
        }

        tracing::info!(
            provider = "polly",
            voice = %voice,
            latency_ms = start_time.elapsed().as_millis(),
            batch_count = batches.len(),
            audio_size_bytes = merged_audio.len(),
            "TTS synthesis completed"
        );

        Ok(AudioArtifact::new(merged_audio, MediaType::Mpeg))
    }
}

fn map_sdk_error(err: SdkError<SynthesizeSpeechError>) -> BackendError {
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(context) => {
            let service_error = context.err();
            if service_error.is_engine_not_supported_exception()
                || service_error.is_language_not_supported_exception()
            {
                BackendError::InvalidVoiceReference(detail)
            } else if service_error.is_service_failure_exception() {
                BackendError::Unavailable(detail)
            } else {
                BackendError::SynthesisFailed(detail)
            }
        }
        SdkError::ConstructionFailure(_) => BackendError::SynthesisFailed(detail),
        _ => BackendError::Unavailable(detail),
    }
}

/// Wrap text in SSML so that `speed` can be expressed as a prosody rate
fn to_ssml(text: &str, speed: f32) -> String {
    let rate = (speed * 100.0).round() as u32;
    format!(
        "<speak><prosody rate=\"{}%\">{}</prosody></speak>",
        rate,
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Bytes `c` occupies once escaped for SSML
fn escaped_width(c: char) -> usize {
    match c {
        '&' => "&amp;".len(),
        '<' | '>' => "&lt;".len(),
        '"' | '\'' => "&quot;".len(),
        other => other.len_utf8(),
    }
}

fn escaped_len(text: &str) -> usize {
    text.chars().map(escaped_width).sum()
}

/// Split text into batches whose escaped form is at most `max_len` bytes,
/// preferring sentence boundaries and falling back to char boundaries for
/// unbroken runs. Batches are returned unescaped.
fn split_into_batches(text: &str, max_len: usize) -> Vec<String> {
    if escaped_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut sentences = Vec::new();
    let mut last_end = 0;
    for mat in SENTENCE_END.find_iter(text) {
        sentences.push(&text[last_end..mat.end()]);
        last_end = mat.end();
    }
    if last_end < text.len() {
        sentences.push(&text[last_end..]);
    }

    let mut batches = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for sentence in sentences {
        let sentence_len = escaped_len(sentence);
        if !current.is_empty() && current_len + sentence_len > max_len {
            batches.push(current.trim().to_string());
            current.clear();
            current_len = 0;
        }

        if sentence_len <= max_len {
            current.push_str(sentence);
            current_len += sentence_len;
            continue;
        }

        for c in sentence.chars() {
            let width = escaped_width(c);
            if current_len + width > max_len {
                batches.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(c);
            current_len += width;
        }
    }

    if !current.trim().is_empty() {
        batches.push(current.trim().to_string());
    }
    batches
}
