//! File conversion jobs and their state machine.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::converter::normalize_format;

/// Lifecycle of a file conversion job.
///
/// ```text
/// pending -> processing -> completed
///                       -> failed
/// ```
///
/// Completed and failed are terminal. There is no processing to
/// processing edge: a claim is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file conversion job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileJob {
    pub id: u64,
    pub user: Option<String>,
    pub input_file: PathBuf,
    pub output_file: Option<PathBuf>,
    pub input_format: String,
    pub output_format: String,
    /// Bytes at submission; re-measured from the bytes actually read
    /// when the job completes.
    pub size_input: u64,
    pub size_output: Option<u64>,
    /// Wall-clock seconds around the converter call. Successful jobs
    /// only.
    pub duration_secs: Option<f64>,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Submission payload for a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFileJob {
    pub user: Option<String>,
    pub input_file: PathBuf,
    pub input_format: String,
    pub output_format: String,
    pub size_input: u64,
}

/// Terminal result of processing a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        output_file: PathBuf,
        size_input: u64,
        size_output: u64,
        duration_secs: f64,
    },
    Failed {
        error_message: String,
    },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("file job not found: {0}")]
    NotFound(u64),

    /// The job was not in the expected state. `from` carries the
    /// status actually observed, so a race loser sees who won.
    #[error("invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Persistence collaborator for file jobs.
///
/// `transition` is the atomicity seam: implementations must apply the
/// compare-and-set under their own synchronization so that exactly one
/// caller can move a job from `pending` to `processing`.
pub trait JobStore: Send + Sync {
    /// Load a point-in-time snapshot of a job.
    fn load(&self, id: u64) -> Result<FileJob, JobError>;

    /// Atomically move a job from `expected` to `next`.
    fn transition(&self, id: u64, expected: JobStatus, next: JobStatus)
    -> Result<FileJob, JobError>;

    /// Write a terminal outcome for a job currently in `processing`,
    /// stamping `completed_at`.
    fn finish(&self, id: u64, outcome: JobOutcome) -> Result<FileJob, JobError>;
}

/// In-memory reference implementation of [`JobStore`].
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<IndexMap<u64, FileJob>>,
    next_id: AtomicU64,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job in `pending`, assigning its id and creation time.
    /// Formats are stored normalized.
    pub fn create(&self, new: NewFileJob) -> FileJob {
        let job = FileJob {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            user: new.user,
            input_file: new.input_file,
            output_file: None,
            input_format: normalize_format(&new.input_format),
            output_format: normalize_format(&new.output_format),
            size_input: new.size_input,
            size_output: None,
            duration_secs: None,
            status: JobStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        job
    }

    /// Snapshot of every job in creation order.
    pub fn jobs(&self) -> Vec<FileJob> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }
}

impl JobStore for MemoryJobStore {
    fn load(&self, id: u64) -> Result<FileJob, JobError> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    fn transition(
        &self,
        id: u64,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<FileJob, JobError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        // Compare-and-set under the store lock. A loser reports the
        // status that beat it, not the one it expected.
        if job.status != expected || !expected.can_transition(next) {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to: next,
            });
        }
        job.status = next;
        Ok(job.clone())
    }

    fn finish(&self, id: u64, outcome: JobOutcome) -> Result<FileJob, JobError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        let to = outcome.status();
        if job.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                from: job.status,
                to,
            });
        }
        match outcome {
            JobOutcome::Completed {
                output_file,
                size_input,
                size_output,
                duration_secs,
            } => {
                job.output_file = Some(output_file);
                job.size_input = size_input;
                job.size_output = Some(size_output);
                job.duration_secs = Some(duration_secs);
            }
            JobOutcome::Failed { error_message } => {
                job.error_message = Some(error_message);
            }
        }
        job.status = to;
        job.completed_at = Some(Utc::now());
        Ok(job.clone())
    }
}
