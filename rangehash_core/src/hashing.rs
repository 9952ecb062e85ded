//! Digest primitives used by hash jobs
//!
//! Algorithms are looked up by name through a process-wide registry. A
//! `DigestSession` binds one algorithm to a job's nonces and optional
//! recording sink; the content hasher only ever talks to the session.

use crate::{Result, error::HashError};
use std::sync::Arc;

mod algorithms;
mod registry;
mod session;
mod traits;

pub use registry::AlgorithmRegistry;
pub use session::DigestSession;
pub use traits::{HashAlgorithmImpl, StreamingHasher};

/// Algorithm used when a request does not name one
pub const DEFAULT_ALGORITHM: &str = "SHA-1";

/// Look up a digest algorithm by name
///
/// Names are matched case-insensitively against the canonical name and its
/// aliases, so `SHA-256`, `sha256` and `SHA256` all resolve to the same
/// implementation.
pub fn new_digest(name: &str) -> Result<Arc<dyn HashAlgorithmImpl>> {
    AlgorithmRegistry::global()
        .get(name)
        .ok_or_else(|| HashError::unsupported_algorithm(name).into())
}
