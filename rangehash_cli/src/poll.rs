//! Waiting on hash jobs from the async CLI

use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rangehash_core::{Job, JobRunner, RequestSpec, SessionId, Submission};
use std::time::Duration;

/// Interval between status polls of a background job
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message);
    spinner
}

/// Submit `spec` and wait for the job to become terminal
///
/// Inline jobs run on the blocking pool so the spinner keeps ticking.
/// Background jobs are polled by id through the runner's registry.
pub async fn run_to_completion(
    runner: &JobRunner,
    session: &SessionId,
    spec: RequestSpec,
    show_progress: bool,
) -> Result<Job> {
    let label = spec.descriptor().to_string();
    let progress = show_progress.then(|| spinner(format!("Hashing {}", label.bold())));

    let submit_runner = runner.clone();
    let submit_session = session.clone();
    let submission =
        tokio::task::spawn_blocking(move || submit_runner.submit(spec, &submit_session))
            .await
            .context("Hash worker panicked")?
            .context("Failed to submit hash job")?;

    let job = match submission {
        Submission::Completed(job) => job,
        Submission::Queued(handle) => {
            log::debug!("Polling background job {}", handle.id());
            wait_for_terminal(runner, handle.session(), handle.id(), progress.as_ref()).await?
        }
    };

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    Ok(job)
}

/// Poll a background job until it is terminal
pub async fn wait_for_terminal(
    runner: &JobRunner,
    session: &SessionId,
    id: &str,
    progress: Option<&ProgressBar>,
) -> Result<Job> {
    loop {
        let job = runner
            .status(session, id)
            .with_context(|| format!("Lost track of job {id}"))?;
        if job.status().is_terminal() {
            return Ok(job);
        }
        if let Some(progress) = progress {
            progress.set_message(format!("{}: {}", id.bold(), job.status()));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
