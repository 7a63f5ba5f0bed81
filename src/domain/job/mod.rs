pub mod model;
pub mod queue;

pub use model::{JobId, JobState, SynthesisJob, TransitionError};
pub use queue::{JobExecutor, JobQueue, QueueConfig, QueueStats};
