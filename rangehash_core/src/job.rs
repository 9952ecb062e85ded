//! Hash jobs and their state machine

use crate::content_hasher::HashCounters;
use crate::recording::RecordingSummary;
use crate::request::RequestSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle state of a job
///
/// `Init -> Running -> {Done | Error}`. `RequestError` is never stored on a
/// job; it is what a lookup of a bad id reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Init,
    Running,
    Done,
    Error,
    RequestError,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Init => 0,
            JobStatus::Running => 1,
            JobStatus::Done | JobStatus::Error | JobStatus::RequestError => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return next == self;
        }
        next != JobStatus::RequestError && next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Init => "Init",
            JobStatus::Running => "Running",
            JobStatus::Done => "Done",
            JobStatus::Error => "Error",
            JobStatus::RequestError => "RequestError",
        };
        f.write_str(name)
    }
}

/// Shared cancellation flag for a running job
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One submitted hash request and everything it produced
#[derive(Debug, Clone)]
pub struct Job {
    id: Option<String>,
    spec: Arc<RequestSpec>,
    status: JobStatus,
    digest: Option<Vec<u8>>,
    counters: Option<HashCounters>,
    recording: Option<RecordingSummary>,
    block_file: Option<PathBuf>,
    error: Option<String>,
    requested_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(spec: Arc<RequestSpec>) -> Self {
        Self {
            id: None,
            spec,
            status: JobStatus::Init,
            digest: None,
            counters: None,
            recording: None,
            block_file: None,
            error: None,
            requested_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    pub(crate) fn shared_spec(&self) -> Arc<RequestSpec> {
        Arc::clone(&self.spec)
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }

    pub fn counters(&self) -> Option<&HashCounters> {
        self.counters.as_ref()
    }

    pub fn recording(&self) -> Option<&RecordingSummary> {
        self.recording.as_ref()
    }

    pub fn record_file(&self) -> Option<&std::path::Path> {
        self.recording.as_ref().map(|r| r.path.as_path())
    }

    pub fn block_file(&self) -> Option<&std::path::Path> {
        self.block_file.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Artifact files this job owns
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.record_file()
            .map(|p| p.to_path_buf())
            .into_iter()
            .chain(self.block_file.clone())
            .collect()
    }

    /// Delete the job's artifact files, ignoring ones already gone
    pub fn delete_artifacts(&self) {
        for path in self.artifacts() {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Deleted {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to delete {}: {e}", path.display()),
            }
        }
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn set_block_file(&mut self, path: PathBuf) {
        self.block_file = Some(path);
    }

    pub(crate) fn set_recording(&mut self, recording: RecordingSummary) {
        self.recording = Some(recording);
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn done(&mut self, digest: Option<Vec<u8>>, counters: HashCounters) {
        self.digest = digest;
        self.counters = Some(counters);
        self.status = JobStatus::Done;
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.status = JobStatus::Error;
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            descriptor: self.spec.descriptor().to_string(),
            variant: self.spec.variant().to_string(),
            algorithm: self.spec.algorithm().to_string(),
            status: self.status,
            bytes_hashed: self.counters.as_ref().map(|c| c.bytes_hashed),
            files_hashed: self.counters.as_ref().map(|c| c.files_hashed),
            elapsed_ms: self.counters.as_ref().map(|c| c.elapsed_ms),
            error: self.error.clone(),
            requested_at: self.requested_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Serializable snapshot of a job, for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Option<String>,
    pub descriptor: String,
    pub variant: String,
    pub algorithm: String,
    pub status: JobStatus,
    pub bytes_hashed: Option<u64>,
    pub files_hashed: Option<u64>,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Init.can_advance_to(JobStatus::Running));
        assert!(JobStatus::Init.can_advance_to(JobStatus::Error));
        assert!(JobStatus::Running.can_advance_to(JobStatus::Running));
        assert!(JobStatus::Running.can_advance_to(JobStatus::Done));
    }

    #[test]
    fn test_terminal_states_never_regress() {
        for terminal in [JobStatus::Done, JobStatus::Error] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_advance_to(JobStatus::Running));
            assert!(!terminal.can_advance_to(JobStatus::Init));
        }
        assert!(!JobStatus::Done.can_advance_to(JobStatus::Error));
        assert!(!JobStatus::Running.can_advance_to(JobStatus::Init));
        assert!(!JobStatus::Init.can_advance_to(JobStatus::RequestError));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Running.to_string(), "Running");
        assert_eq!(
            serde_json::to_string(&JobStatus::Done).unwrap(),
            "\"Done\""
        );
    }
}
