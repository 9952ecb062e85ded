//! Running hash jobs
//!
//! `JobRunner::submit` executes a validated request either on the calling
//! thread or on a dedicated worker thread. A worker owns its `Job` for the
//! whole run and publishes snapshots into the session's registry; nothing
//! else writes to a running job.

use crate::artifacts::new_artifact;
use crate::config::HasherConfig;
use crate::content_hasher::{ContentHasher, HashCounters, StreamingContentHasher};
use crate::error::{HashError, InternalError, RequestError};
use crate::format::{BlockFileWriter, BlockHeader};
use crate::hashing::{DigestSession, new_digest};
use crate::job::{CancelToken, Job};
use crate::recording::RecordingSink;
use crate::registry::{JobRegistries, JobRegistry, SessionId};
use crate::request::{RequestSpec, VariantKind};
use crate::Result;
use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;
use std::thread;

/// Outcome of `JobRunner::submit`
#[derive(Debug)]
pub enum Submission {
    /// The job ran inline and is terminal
    Completed(Job),
    /// The job runs in the background; poll it by id
    Queued(JobHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
    session: SessionId,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }
}

/// Executes hash jobs and tracks background ones
#[derive(Clone)]
pub struct JobRunner {
    config: Arc<HasherConfig>,
    content_hasher: Arc<dyn ContentHasher>,
    registries: Arc<JobRegistries>,
}

impl JobRunner {
    /// Runner with the streaming content hasher and registries scoped by `config`
    pub fn new(config: HasherConfig) -> Self {
        let content_hasher = Arc::new(StreamingContentHasher::new(config.step_size));
        let registries = Arc::new(JobRegistries::new(config.registry_scope()));
        Self::with_parts(config, content_hasher, registries)
    }

    pub fn with_parts(
        config: HasherConfig,
        content_hasher: Arc<dyn ContentHasher>,
        registries: Arc<JobRegistries>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            content_hasher,
            registries,
        }
    }

    pub fn config(&self) -> &HasherConfig {
        &self.config
    }

    pub fn registries(&self) -> &Arc<JobRegistries> {
        &self.registries
    }

    /// Run `spec` inline, or register it and start a worker when it is
    /// asynchronous
    pub fn submit(&self, spec: RequestSpec, session: &SessionId) -> Result<Submission> {
        let spec = Arc::new(spec);

        if !spec.is_asynchronous() {
            let mut job = Job::new(spec);
            self.execute(&mut job, &CancelToken::new(), None);
            return Ok(Submission::Completed(job));
        }

        let registry = self.registries.for_session(session);
        let (mut job, cancel) = registry.register(Job::new(spec))?;
        let id = job.id().unwrap_or_default().to_string();

        let runner = self.clone();
        let worker_registry = Arc::clone(&registry);
        let spawned = thread::Builder::new()
            .name(format!("hash-{id}"))
            .spawn(move || runner.execute(&mut job, &cancel, Some(&worker_registry)));

        if let Err(e) = spawned {
            warn!("Failed to start worker for job {id}: {e}");
            let _ = registry.remove(&id);
            return Err(InternalError::worker_spawn(e.to_string()).into());
        }

        debug!("Queued job {id} for session {session}");
        Ok(Submission::Queued(JobHandle {
            id,
            session: session.clone(),
        }))
    }

    /// Snapshot of a background job
    pub fn status(&self, session: &SessionId, id: &str) -> std::result::Result<Job, RequestError> {
        if id.is_empty() {
            return Err(RequestError::MissingId);
        }
        match self.registries.existing(session) {
            Some(registry) => registry.get(id),
            None => Err(RequestError::unknown_job(id)),
        }
    }

    /// Snapshots of the session's background jobs
    pub fn list(&self, session: &SessionId) -> Vec<Job> {
        self.registries
            .existing(session)
            .map(|registry| registry.list())
            .unwrap_or_default()
    }

    /// Remove a background job, cancelling it if it is still running
    pub fn remove(&self, session: &SessionId, id: &str) -> std::result::Result<Job, RequestError> {
        if id.is_empty() {
            return Err(RequestError::MissingId);
        }
        match self.registries.existing(session) {
            Some(registry) => registry.remove(id),
            None => Err(RequestError::unknown_job(id)),
        }
    }

    pub fn end_session(&self, session: &SessionId) -> usize {
        self.registries.end_session(session)
    }

    fn execute(&self, job: &mut Job, cancel: &CancelToken, registry: Option<&JobRegistry>) {
        let label = job.id().unwrap_or("inline").to_string();
        job.start();
        debug!("Job {label} running: {}", job.spec().descriptor());
        let mut registered = publish(registry, job);

        match self.run(job, cancel) {
            Ok((digest, counters)) => {
                debug!(
                    "Job {label} done: {} files, {} bytes",
                    counters.files_hashed, counters.bytes_hashed
                );
                job.done(digest, counters);
            }
            Err(e) => {
                warn!("Job {label} failed: {e}");
                job.fail(e.to_string());
            }
        }

        registered = registered && publish(registry, job);
        if registry.is_some() && !registered {
            debug!("Job {label} was removed while running, deleting its artifacts");
            job.delete_artifacts();
        }
    }

    fn run(
        &self,
        job: &mut Job,
        cancel: &CancelToken,
    ) -> std::result::Result<(Option<Vec<u8>>, HashCounters), HashError> {
        let spec = job.shared_spec();
        let algorithm = new_digest(spec.algorithm())
            .map_err(|_| HashError::unsupported_algorithm(spec.algorithm()))?;
        let mut recorder = if spec.record_filtered() {
            let (file, path) =
                new_artifact(&self.config.temp_dir()).map_err(|e| HashError::artifact("record", &e))?;
            Some(RecordingSink::from_file(
                file,
                path,
                self.config.recording_limit(),
            ))
        } else {
            None
        };

        let mut session = DigestSession::new(algorithm, spec.challenge(), spec.verifier());
        if let Some(sink) = recorder.as_mut() {
            session = session.with_recorder(sink);
        }

        let outcome = match spec.variant().kind() {
            VariantKind::Single(mode) => self
                .content_hasher
                .hash_single(spec.range().as_ref(), mode, &mut session, cancel)
                .map(|(digest, counters)| (Some(digest), counters)),
            VariantKind::Block => self
                .hash_to_block_file(job, &spec, &mut session, cancel)
                .map(|counters| (None, counters)),
        };
        drop(session);

        if let Some(sink) = recorder {
            let path = sink.path().to_path_buf();
            match sink.finish() {
                Ok(summary) => job.set_recording(summary),
                Err(e) => {
                    let _ = std::fs::remove_file(&path);
                    return Err(HashError::artifact("record", &e));
                }
            }
        }
        outcome
    }

    fn hash_to_block_file(
        &self,
        job: &mut Job,
        spec: &RequestSpec,
        session: &mut DigestSession<'_>,
        cancel: &CancelToken,
    ) -> std::result::Result<HashCounters, HashError> {
        let (file, path) = new_artifact(&self.config.temp_dir())
            .map_err(|e| HashError::artifact("block", &e))?;
        job.set_block_file(path);

        let range = spec.range().as_ref();
        let header = BlockHeader {
            machine: self.config.machine_name(),
            timestamp: Utc::now(),
            unit_name: range.unit_name().to_string(),
            algorithm: session.algorithm().name().to_string(),
            encoding: spec.encoding(),
            challenge: spec.challenge().map(<[u8]>::to_vec),
            verifier: spec.verifier().map(<[u8]>::to_vec),
        };
        let mut writer =
            BlockFileWriter::create(file, &header).map_err(|e| HashError::artifact("block", &e))?;

        match self
            .content_hasher
            .hash_blocks(range, session, &mut writer, cancel)
        {
            Ok(counters) => {
                writer.finish()?;
                Ok(counters)
            }
            Err(e) => {
                if let Err(write_err) = writer.finish_with_error(&e.to_string()) {
                    warn!("Failed to write error to block file: {write_err}");
                }
                Err(e)
            }
        }
    }
}

fn publish(registry: Option<&JobRegistry>, job: &Job) -> bool {
    registry.is_none_or(|registry| registry.publish(job))
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("config", &self.config)
            .field("registries", &self.registries)
            .finish_non_exhaustive()
    }
}
