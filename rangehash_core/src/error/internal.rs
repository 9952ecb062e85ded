//! Internal library error types

use thiserror::Error;

/// Internal library errors
#[derive(Error, Debug)]
pub enum InternalError {
    /// No unused request id could be drawn
    #[error("Couldn't find an unused request id in {attempts} tries")]
    IdSpaceExhausted { attempts: usize },

    /// The background worker thread could not be started
    #[error("Error starting background hash thread: {message}")]
    WorkerSpawn { message: String },

    /// A reserved request id was used twice or never reserved
    #[error("Request id '{id}' was not reserved")]
    UnreservedId { id: String },
}

impl InternalError {
    /// Create an id space exhausted error
    pub fn id_space_exhausted(attempts: usize) -> Self {
        Self::IdSpaceExhausted { attempts }
    }

    /// Create a worker spawn error
    pub fn worker_spawn(message: impl Into<String>) -> Self {
        Self::WorkerSpawn {
            message: message.into(),
        }
    }

    pub fn unreserved_id(id: &str) -> Self {
        Self::UnreservedId { id: id.to_string() }
    }
}
