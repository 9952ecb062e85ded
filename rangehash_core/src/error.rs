//! Error types for the rangehash core library
//!
//! Errors are grouped by where they surface: request validation, job
//! execution, registry lookups, result rendering and library internals.

use thiserror::Error;

pub mod hash;
pub mod internal;
pub mod io;
pub mod render;
pub mod request;
pub mod validation;

pub use self::hash::HashError;
pub use self::io::IoError;
pub use self::render::RenderError;
pub use self::request::RequestError;
pub use self::validation::ValidationError;
pub use internal::InternalError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the rangehash core library
///
/// - Validation errors never reach the job registry; they are returned
///   before a job exists.
/// - Hash errors are captured inside a job and stored as its message.
/// - Request errors come from status lookups of unknown or missing ids.
/// - Render errors come from formatting a job that cannot be rendered.
/// - Internal errors indicate a library bug or an exhausted id space.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Request validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Errors raised while a job is hashing
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Registry lookup errors
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Result rendering errors
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Internal library errors
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}
