use super::model::{JobId, JobState, SynthesisJob};
use crate::domain::artifact::ArtifactId;
use crate::domain::speech::{SpeechError, SynthesisRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};

/// Runs one accepted request to completion (backend call plus storage)
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn execute(&self, request: Arc<SynthesisRequest>) -> Result<ArtifactId, SpeechError>;
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of jobs in the Running state at once
    pub concurrency: usize,
    /// Deadline for a single backend call
    pub timeout: Duration,
    /// How long finished jobs remain queryable
    pub job_ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub finished: usize,
    pub concurrency_limit: usize,
}

struct JobEntry {
    job: SynthesisJob,
    state_tx: watch::Sender<JobState>,
    finished_at: Option<Instant>,
}

struct QueueShared {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    config: QueueConfig,
}

/// FIFO job queue with a concurrency limiter.
///
/// A single dispatcher task takes job ids in arrival order and acquires a
/// semaphore permit for each before moving it to Running, so dispatch order
/// is submission order and at most `concurrency` jobs run at once. A job that
/// exceeds its deadline is marked Failed, but its backend call keeps the
/// permit until it actually returns.
pub struct JobQueue {
    shared: Arc<QueueShared>,
    dispatch_tx: mpsc::UnboundedSender<JobId>,
}

impl JobQueue {
    /// Must be called from within a tokio runtime
    pub fn new(executor: Arc<dyn JobExecutor>, config: QueueConfig) -> Self {
        let config = QueueConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(QueueShared {
            jobs: Mutex::new(HashMap::new()),
            config,
        });

        tokio::spawn(dispatch_loop(shared.clone(), executor, dispatch_rx, semaphore));

        Self {
            shared,
            dispatch_tx,
        }
    }

    /// Accept a request. Returns immediately with the job handle.
    pub fn submit(&self, request: SynthesisRequest) -> Result<JobId, SpeechError> {
        let job = SynthesisJob::new(request);
        let job_id = job.id;
        let (state_tx, _) = watch::channel(JobState::Queued);

        self.shared.jobs.lock().insert(
            job_id,
            JobEntry {
                job,
                state_tx,
                finished_at: None,
            },
        );

        if self.dispatch_tx.send(job_id).is_err() {
            self.shared.jobs.lock().remove(&job_id);
            return Err(SpeechError::BackendUnavailable(
                "job dispatcher has stopped".to_string(),
            ));
        }

        tracing::debug!(job_id = %job_id, "Job queued");
        Ok(job_id)
    }

    pub fn get(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError> {
        self.shared
            .jobs
            .lock()
            .get(&job_id)
            .map(|entry| entry.job.clone())
            .ok_or(SpeechError::JobNotFound(job_id))
    }

    /// Suspend until the job reaches Done or Failed
    pub async fn wait(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError> {
        let mut state_rx = {
            let jobs = self.shared.jobs.lock();
            let entry = jobs.get(&job_id).ok_or(SpeechError::JobNotFound(job_id))?;
            entry.state_tx.subscribe()
        };

        let reached_terminal = state_rx
            .wait_for(|state| state.is_terminal())
            .await
            .is_ok();
        if !reached_terminal {
            return Err(SpeechError::JobNotFound(job_id));
        }

        self.get(job_id)
    }

    /// Cancel a job that is still Queued. Running jobs are never preempted.
    pub fn cancel(&self, job_id: JobId) -> Result<SynthesisJob, SpeechError> {
        let mut jobs = self.shared.jobs.lock();
        let entry = jobs
            .get_mut(&job_id)
            .ok_or(SpeechError::JobNotFound(job_id))?;

        entry
            .job
            .cancel()
            .map_err(|e| SpeechError::NotCancellable {
                job_id,
                state: e.from,
            })?;
        entry.finished_at = Some(Instant::now());
        entry.state_tx.send_replace(entry.job.state);

        tracing::info!(job_id = %job_id, "Job cancelled while queued");
        Ok(entry.job.clone())
    }

    pub fn stats(&self) -> QueueStats {
        let jobs = self.shared.jobs.lock();
        let mut stats = QueueStats {
            queued: 0,
            running: 0,
            finished: 0,
            concurrency_limit: self.shared.config.concurrency,
        };
        for entry in jobs.values() {
            match entry.job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Running => stats.running += 1,
                JobState::Done | JobState::Failed => stats.finished += 1,
            }
        }
        stats
    }

    /// Ids of jobs still waiting for a permit, oldest first
    pub fn queued(&self) -> Vec<JobId> {
        let jobs = self.shared.jobs.lock();
        let mut queued: Vec<&SynthesisJob> = jobs
            .values()
            .map(|entry| &entry.job)
            .filter(|job| job.state == JobState::Queued)
            .collect();
        queued.sort_by_key(|job| job.created_at);
        queued.into_iter().map(|job| job.id).collect()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.shared.config.concurrency
    }

    pub fn is_accepting(&self) -> bool {
        !self.dispatch_tx.is_closed()
    }

    /// Drop finished jobs older than the job TTL. Returns how many were removed.
    pub fn purge_finished(&self) -> usize {
        let ttl = self.shared.config.job_ttl;
        let mut jobs = self.shared.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished_at {
            Some(finished_at) => finished_at.elapsed() < ttl,
            None => true,
        });
        before - jobs.len()
    }
}

impl QueueShared {
    /// Queued -> Running. Returns `None` if the job was cancelled meanwhile.
    fn start(&self, job_id: JobId) -> Option<Arc<SynthesisRequest>> {
        let mut jobs = self.jobs.lock();
        let entry = jobs.get_mut(&job_id)?;
        if entry.job.start().is_err() {
            return None;
        }
        entry.state_tx.send_replace(JobState::Running);
        Some(entry.job.request.clone())
    }

    fn finish(&self, job_id: JobId, outcome: Result<ArtifactId, SpeechError>, elapsed: Duration) {
        let mut jobs = self.jobs.lock();
        let Some(entry) = jobs.get_mut(&job_id) else {
            tracing::warn!(job_id = %job_id, "Finished job is no longer tracked");
            return;
        };

        let transition = match outcome {
            Ok(artifact_id) => {
                tracing::info!(
                    job_id = %job_id,
                    artifact_id = %artifact_id,
                    latency_ms = elapsed.as_millis(),
                    "Job done"
                );
                entry.job.complete(artifact_id)
            }
            Err(error) => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %error,
                    latency_ms = elapsed.as_millis(),
                    "Job failed"
                );
                entry.job.fail(error)
            }
        };

        if let Err(e) = transition {
            tracing::error!(job_id = %job_id, error = %e, "Rejected job transition");
            return;
        }
        entry.finished_at = Some(Instant::now());
        entry.state_tx.send_replace(entry.job.state);
    }
}

async fn dispatch_loop(
    shared: Arc<QueueShared>,
    executor: Arc<dyn JobExecutor>,
    mut dispatch_rx: mpsc::UnboundedReceiver<JobId>,
    semaphore: Arc<Semaphore>,
) {
    while let Some(job_id) = dispatch_rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let Some(request) = shared.start(job_id) else {
            tracing::debug!(job_id = %job_id, "Skipping job that left the queue");
            continue;
        };

        tracing::info!(job_id = %job_id, "Job running");
        tokio::spawn(run_job(shared.clone(), executor.clone(), job_id, request, permit));
    }

    tracing::info!("Job dispatcher stopped");
}

async fn run_job(
    shared: Arc<QueueShared>,
    executor: Arc<dyn JobExecutor>,
    job_id: JobId,
    request: Arc<SynthesisRequest>,
    permit: OwnedSemaphorePermit,
) {
    let started = Instant::now();
    let deadline = shared.config.timeout;

    // The permit lives with the call, not with the job, so a timed-out call
    // still occupies its slot until the backend returns.
    let call = tokio::spawn(async move {
        let _permit = permit;
        executor.execute(request).await
    });

    let outcome = match tokio::time::timeout(deadline, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(SpeechError::SynthesisFailed(format!(
            "synthesis task aborted: {}",
            join_error
        ))),
        Err(_) => {
            tracing::warn!(
                job_id = %job_id,
                deadline_secs = deadline.as_secs_f64(),
                "Synthesis deadline exceeded, discarding the late result"
            );
            Err(SpeechError::SynthesisFailed(format!(
                "synthesis exceeded deadline of {:?}",
                deadline
            )))
        }
    };

    shared.finish(job_id, outcome, started.elapsed());
}
