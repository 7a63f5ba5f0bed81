use crate::domain::artifact::ArtifactId;
use crate::domain::speech::{SpeechError, SynthesisRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque job handle returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Allowed edges: Queued -> Running, Queued -> Failed (cancellation only),
    /// Running -> Done, Running -> Failed.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Running)
                | (JobState::Queued, JobState::Failed)
                | (JobState::Running, JobState::Done)
                | (JobState::Running, JobState::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub id: JobId,
    pub request: Arc<SynthesisRequest>,
    pub state: JobState,
    pub result: Option<ArtifactId>,
    pub error: Option<SpeechError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SynthesisJob {
    pub fn new(request: SynthesisRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            request: Arc::new(request),
            state: JobState::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: JobState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobState::Running)
    }

    pub fn complete(&mut self, artifact: ArtifactId) -> Result<(), TransitionError> {
        self.transition(JobState::Done)?;
        self.result = Some(artifact);
        Ok(())
    }

    /// Running jobs fail with the backend's error
    pub fn fail(&mut self, error: SpeechError) -> Result<(), TransitionError> {
        if self.state != JobState::Running {
            return Err(TransitionError {
                from: self.state,
                to: JobState::Failed,
            });
        }
        self.transition(JobState::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// Only queued jobs can be cancelled
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if self.state != JobState::Queued {
            return Err(TransitionError {
                from: self.state,
                to: JobState::Failed,
            });
        }
        self.transition(JobState::Failed)?;
        self.error = Some(SpeechError::Cancelled);
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(SpeechError::Cancelled))
    }
}
