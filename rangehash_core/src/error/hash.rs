//! Errors raised while a job is running
//!
//! None of these escape a job: the runner turns them into the job's
//! `Error` status and keeps the message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashError {
    /// The requested digest algorithm is not available
    #[error("Invalid hashing algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Content iteration or digesting failed
    #[error("Error hashing: {message}")]
    Runtime { message: String },

    /// An output artifact could not be created
    #[error("Cannot create {what} file: {message}")]
    Artifact { what: &'static str, message: String },

    /// The job was removed while it was running
    #[error("Hash cancelled")]
    Cancelled,
}

impl HashError {
    pub fn unsupported_algorithm(algorithm: &str) -> Self {
        Self::UnsupportedAlgorithm {
            algorithm: algorithm.to_string(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn artifact(what: &'static str, source: &std::io::Error) -> Self {
        Self::Artifact {
            what,
            message: source.to_string(),
        }
    }
}

impl From<std::io::Error> for HashError {
    fn from(source: std::io::Error) -> Self {
        Self::runtime(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_keeps_message() {
        let error: HashError = std::io::Error::other("short read on page.html").into();
        assert_eq!(error.to_string(), "Error hashing: short read on page.html");
    }

    #[test]
    fn test_artifact_error() {
        let source = std::io::Error::other("read-only file system");
        let error = HashError::artifact("block", &source);
        assert_eq!(
            error.to_string(),
            "Cannot create block file: read-only file system"
        );
    }
}
