//! rangehash core library
//!
//! Computes digests over named ranges of preserved content, either on the
//! caller's thread or as background jobs that are polled by request id.
//! Results are rendered as key/value records or as block-hash files.
//!
//! The usual flow is:
//!
//! 1. `RequestSpec::validate` checks the request parameters and resolves
//!    the content range.
//! 2. `JobRunner::submit` runs it inline or queues it on a worker thread.
//! 3. `JobRunner::status` polls a queued job.
//! 4. `ResultFormatter::render` turns a finished job into a result, and
//!    `ArtifactIndex::stream_artifact` streams its files back.

pub mod artifacts;
pub mod config;
pub mod content;
pub mod content_hasher;
pub mod error;
pub mod format;
pub mod hashing;
pub mod job;
pub mod recording;
pub mod registry;
pub mod request;
pub mod runner;

pub use artifacts::{ArtifactIndex, ArtifactReader};
pub use config::HasherConfig;
pub use content::{ContentRange, ContentResolver, DirectoryResolver, RangeDescriptor};
pub use content_hasher::{BlockSink, ContentHasher, HashCounters, StreamingContentHasher};
pub use error::{Error, Result};
pub use format::{Payload, RenderedResult, ResultFormatter, ResultRecord, elapsed_string};
pub use hashing::{DEFAULT_ALGORITHM, HashAlgorithmImpl, new_digest};
pub use job::{CancelToken, Job, JobStatus, JobSummary};
pub use recording::{RecordingSink, RecordingSummary};
pub use registry::{JobRegistries, JobRegistry, RegistryScope, SessionId};
pub use request::{HashParams, HashVariant, RequestSpec, ResultDelivery, ResultEncoding};
pub use runner::{JobHandle, JobRunner, Submission};
