//! Errors from rendering a job's result

use crate::job::JobStatus;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The job ended in `Error`; carries the job's stored message
    #[error("{message}")]
    JobFailed { message: String },

    /// The job has not reached a terminal state yet
    #[error("Hash not finished, status: {status}")]
    NotFinished { status: JobStatus },

    /// The job finished but its output file is gone
    #[error(
        "The result file of the previous hashing operation has been deleted: {}",
        describe_output(.path)
    )]
    MissingOutput { path: Option<PathBuf> },
}

impl RenderError {
    pub fn job_failed(message: impl Into<String>) -> Self {
        Self::JobFailed {
            message: message.into(),
        }
    }

    pub fn missing_output(path: Option<&std::path::Path>) -> Self {
        Self::MissingOutput {
            path: path.map(|p| p.to_path_buf()),
        }
    }
}

fn describe_output(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "no hash output generated".to_string(),
    }
}
