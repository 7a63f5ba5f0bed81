use super::local_model_backend::{ModelError, ModelInput, SpeechModel};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_MODEL_NAME: &str = "tts_models/multilingual/multi-dataset/xtts_v2";
pub const DEFAULT_DEVICE: &str = "auto";

const WORKER_SCRIPT: &str = include_str!("xtts_worker.py");

#[derive(Debug, Clone)]
pub struct XttsWorkerConfig {
    /// Python interpreter with the Coqui `TTS` package installed
    pub python: PathBuf,
    pub model_name: String,
    /// `auto`, `cpu` or `cuda`
    pub device: String,
}

impl Default for XttsWorkerConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from(DEFAULT_PYTHON),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            device: DEFAULT_DEVICE.to_string(),
        }
    }
}

/// One render command, written as a single JSON line
#[derive(Debug, Serialize)]
struct RenderCommand<'a> {
    text: &'a str,
    speaker_wav: &'a Path,
    language: &'a str,
    file_path: &'a Path,
    speed: f32,
    temperature: f32,
    length_penalty: f32,
    repetition_penalty: f32,
    top_k: u32,
    top_p: f32,
}

impl<'a> RenderCommand<'a> {
    fn new(input: &'a ModelInput, output: &'a Path) -> Self {
        Self {
            text: &input.text,
            speaker_wav: &input.speaker_wav,
            language: input.language.as_str(),
            file_path: output,
            speed: input.params.speed,
            temperature: input.params.temperature,
            length_penalty: input.params.length_penalty,
            repetition_penalty: input.params.repetition_penalty,
            top_k: input.params.top_k,
            top_p: input.params.top_p,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum WorkerReply {
    Ready {
        #[serde(default)]
        device: String,
    },
    #[serde(rename = "ok")]
    Done,
    Error {
        message: String,
    },
}

/// XTTS v2 running in a dedicated Python worker process.
///
/// The worker loads the model once at start-up and then serves render
/// commands over its stdin/stdout for the lifetime of this value. A worker
/// that dies is not restarted; later renders report the model as unavailable.
pub struct XttsWorkerModel {
    model_name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl XttsWorkerModel {
    /// Start the worker and block until the model is loaded.
    pub fn load(config: XttsWorkerConfig) -> Result<Self, ModelError> {
        let mut command = Command::new(&config.python);
        command
            .arg("-u")
            .arg("-c")
            .arg(WORKER_SCRIPT)
            .arg(&config.model_name)
            .arg(&config.device);
        Self::spawn(command, config.model_name)
    }

    fn spawn(mut command: Command, model_name: String) -> Result<Self, ModelError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ModelError::Load(format!("cannot launch speech worker: {}", e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(ModelError::Load("speech worker pipes are unavailable".to_string()));
        };

        let mut model = Self {
            model_name,
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        match model.read_reply()? {
            WorkerReply::Ready { device } => {
                tracing::info!(
                    model = %model.model_name,
                    device = %device,
                    pid = model.child.id(),
                    "XTTS worker ready"
                );
                Ok(model)
            }
            WorkerReply::Error { message } => Err(ModelError::Load(message)),
            WorkerReply::Done => Err(ModelError::Load(
                "speech worker answered before loading the model".to_string(),
            )),
        }
    }

    fn read_reply(&mut self) -> Result<WorkerReply, ModelError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| ModelError::Load(format!("speech worker pipe failed: {}", e)))?;

        if read == 0 {
            let reason = match self.child.try_wait() {
                Ok(Some(status)) => format!("speech worker exited with {}", status),
                _ => "speech worker closed its output".to_string(),
            };
            return Err(ModelError::Load(reason));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            ModelError::Inference(format!("unreadable worker reply `{}`: {}", line.trim(), e))
        })
    }
}

impl SpeechModel for XttsWorkerModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn render(&mut self, input: &ModelInput, output: &Path) -> Result<(), ModelError> {
        if !input.speaker_wav.is_file() {
            return Err(ModelError::MissingSpeaker(
                input.speaker_wav.display().to_string(),
            ));
        }

        let mut line = serde_json::to_string(&RenderCommand::new(input, output))
            .map_err(|e| ModelError::Inference(format!("cannot encode render command: {}", e)))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| ModelError::Load(format!("speech worker is gone: {}", e)))?;

        match self.read_reply()? {
            WorkerReply::Done => Ok(()),
            WorkerReply::Error { message } => Err(ModelError::Inference(message)),
            WorkerReply::Ready { .. } => Err(ModelError::Inference(
                "speech worker sent a second ready line".to_string(),
            )),
        }
    }
}

impl Drop for XttsWorkerModel {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
