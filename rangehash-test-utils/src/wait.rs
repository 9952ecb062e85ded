//! Polling helpers for background jobs

use rangehash_core::{Job, JobRunner, SessionId};
use std::thread;
use std::time::{Duration, Instant};

/// Poll a background job until it is terminal
///
/// Panics if the job is unknown or still running after `timeout`.
pub fn wait_for_terminal(runner: &JobRunner, session: &SessionId, id: &str, timeout: Duration) -> Job {
    let deadline = Instant::now() + timeout;
    loop {
        let job = runner
            .status(session, id)
            .unwrap_or_else(|e| panic!("polling job {id}: {e}"));
        if job.status().is_terminal() {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {id} still {} after {timeout:?}",
            job.status()
        );
        thread::sleep(Duration::from_millis(5));
    }
}
