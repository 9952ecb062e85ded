//! Streaming content through digests
//!
//! A `ContentHasher` walks a resolved `ContentRange` and feeds it through a
//! `DigestSession`, either into one digest for the whole range or into one
//! digest per url. `StreamingContentHasher` is the bundled implementation.

use crate::content::ContentRange;
use crate::error::HashError;
use crate::hashing::{DigestSession, StreamingHasher};
use crate::job::CancelToken;
use crate::request::SingleDigestMode;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::time::Instant;

/// Default read size when streaming content
pub const DEFAULT_STEP_SIZE: usize = 4096;

/// What a hashing pass covered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCounters {
    pub bytes_hashed: u64,
    pub files_hashed: u64,
    pub elapsed_ms: u64,
}

/// Receives per-url results of a block hashing pass
pub trait BlockSink {
    fn block_done(&mut self, url: &str, digest: &[u8]) -> io::Result<()>;

    /// Called when a url could not be read; the pass continues
    fn block_failed(&mut self, url: &str, error: &io::Error) -> io::Result<()>;
}

pub trait ContentHasher: Send + Sync {
    /// One digest over the whole range
    fn hash_single(
        &self,
        range: &dyn ContentRange,
        mode: SingleDigestMode,
        session: &mut DigestSession<'_>,
        cancel: &CancelToken,
    ) -> Result<(Vec<u8>, HashCounters), HashError>;

    /// One digest per url, reported to `sink` in range order
    fn hash_blocks(
        &self,
        range: &dyn ContentRange,
        session: &mut DigestSession<'_>,
        sink: &mut dyn BlockSink,
        cancel: &CancelToken,
    ) -> Result<HashCounters, HashError>;
}

/// Reads each url in fixed-size steps, checking for cancellation between steps
#[derive(Debug, Clone)]
pub struct StreamingContentHasher {
    step_size: usize,
}

impl StreamingContentHasher {
    pub fn new(step_size: usize) -> Self {
        Self {
            step_size: step_size.max(1),
        }
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }

    fn stream(
        &self,
        range: &dyn ContentRange,
        url: &str,
        session: &mut DigestSession<'_>,
        digest: &mut dyn StreamingHasher,
        cancel: &CancelToken,
    ) -> Result<u64, StreamFailure> {
        let mut reader = range.open(url).map_err(StreamFailure::Read)?;
        let mut buffer = vec![0u8; self.step_size];
        let mut total = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(StreamFailure::Hash(HashError::Cancelled));
            }
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StreamFailure::Read(e)),
            };
            session
                .feed(digest, &buffer[..n])
                .map_err(|e| StreamFailure::Hash(HashError::runtime(e.to_string())))?;
            total += n as u64;
        }

        trace!("Hashed {total} bytes of {url}");
        Ok(total)
    }
}

impl Default for StreamingContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_SIZE)
    }
}

/// Reading a url failed, or the pass itself must stop
enum StreamFailure {
    Read(io::Error),
    Hash(HashError),
}

impl ContentHasher for StreamingContentHasher {
    fn hash_single(
        &self,
        range: &dyn ContentRange,
        mode: SingleDigestMode,
        session: &mut DigestSession<'_>,
        cancel: &CancelToken,
    ) -> Result<(Vec<u8>, HashCounters), HashError> {
        let started = Instant::now();
        let entries = range.entries()?;
        let mut digest = session.begin()?;
        let mut counters = HashCounters::default();

        for url in &entries {
            if cancel.is_cancelled() {
                return Err(HashError::Cancelled);
            }
            match mode {
                SingleDigestMode::Content => {
                    counters.bytes_hashed += self
                        .stream(range, url, session, digest.as_mut(), cancel)
                        .map_err(|failure| match failure {
                            StreamFailure::Read(e) => HashError::runtime(format!("{url}: {e}")),
                            StreamFailure::Hash(e) => e,
                        })?;
                }
                SingleDigestMode::Name => {
                    session.feed(digest.as_mut(), url.as_bytes())?;
                    counters.bytes_hashed += url.len() as u64;
                }
            }
            counters.files_hashed += 1;
        }

        counters.elapsed_ms = elapsed_ms(started);
        debug!(
            "Single digest over {} urls, {} bytes in {} ms",
            counters.files_hashed, counters.bytes_hashed, counters.elapsed_ms
        );
        Ok((digest.finalize(), counters))
    }

    fn hash_blocks(
        &self,
        range: &dyn ContentRange,
        session: &mut DigestSession<'_>,
        sink: &mut dyn BlockSink,
        cancel: &CancelToken,
    ) -> Result<HashCounters, HashError> {
        let started = Instant::now();
        let entries = range.entries()?;
        let mut counters = HashCounters::default();

        for url in &entries {
            let mut digest = session.begin()?;
            match self.stream(range, url, session, digest.as_mut(), cancel) {
                Ok(bytes) => {
                    sink.block_done(url, &digest.finalize())?;
                    counters.bytes_hashed += bytes;
                    counters.files_hashed += 1;
                }
                Err(StreamFailure::Read(e)) => {
                    warn!("Error hashing {url}: {e}");
                    sink.block_failed(url, &e)?;
                }
                Err(StreamFailure::Hash(e)) => return Err(e),
            }
        }

        counters.elapsed_ms = elapsed_ms(started);
        debug!(
            "Block digests for {} urls, {} bytes in {} ms",
            counters.files_hashed, counters.bytes_hashed, counters.elapsed_ms
        );
        Ok(counters)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
