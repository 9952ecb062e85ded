//! Errors from looking up jobs and artifacts by id

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No request id was supplied
    #[error("Must supply req_id")]
    MissingId,

    /// No job is registered under the id
    #[error("No such background hash: {id}")]
    UnknownJob { id: String },

    /// No artifact is registered under the file id
    #[error("Unknown file: {file_id}")]
    UnknownFile { file_id: String },
}

impl RequestError {
    pub fn unknown_job(id: &str) -> Self {
        Self::UnknownJob { id: id.to_string() }
    }

    pub fn unknown_file(file_id: &str) -> Self {
        Self::UnknownFile {
            file_id: file_id.to_string(),
        }
    }
}
