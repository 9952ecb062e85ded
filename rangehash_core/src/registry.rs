//! Job registries
//!
//! A `JobRegistry` maps request ids to job snapshots. Async workers own
//! their `Job` and publish copies here; readers only ever see snapshots and
//! never wait on a running job. `JobRegistries` decides whether all callers
//! share one registry or each session gets its own.

use crate::error::{InternalError, RequestError};
use crate::job::{CancelToken, Job};
use crate::Result;
use log::{debug, warn};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Length of a generated request id
pub const REQUEST_ID_LENGTH: usize = 5;

/// Random draws made before id allocation gives up
pub const MAX_ID_ATTEMPTS: usize = 100_000;

type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

fn random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REQUEST_ID_LENGTH)
        .map(char::from)
        .collect()
}

struct Entry {
    job: Job,
    cancel: CancelToken,
}

#[derive(Default)]
struct State {
    jobs: HashMap<String, Entry>,
    reserved: HashSet<String>,
}

impl State {
    fn is_taken(&self, id: &str) -> bool {
        self.jobs.contains_key(id) || self.reserved.contains(id)
    }

    fn draw_id(&mut self, generator: &IdGenerator) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = generator();
            if !self.is_taken(&id) {
                return Ok(id);
            }
        }
        Err(InternalError::id_space_exhausted(MAX_ID_ATTEMPTS).into())
    }

    fn insert(&mut self, id: String, mut job: Job) -> (Job, CancelToken) {
        job.set_id(id.clone());
        let cancel = CancelToken::new();
        self.jobs.insert(
            id,
            Entry {
                job: job.clone(),
                cancel: cancel.clone(),
            },
        );
        (job, cancel)
    }
}

/// Keyed store of job snapshots
pub struct JobRegistry {
    state: RwLock<State>,
    generator: IdGenerator,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::with_generator(random_id)
    }

    /// Registry drawing ids from `generator` instead of the random source
    pub fn with_generator(generator: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            state: RwLock::new(State::default()),
            generator: Box::new(generator),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve an id no current or reserved job uses
    pub fn allocate_id(&self) -> Result<String> {
        let mut state = self.write();
        let id = state.draw_id(&self.generator)?;
        state.reserved.insert(id.clone());
        Ok(id)
    }

    /// Store `job` under an id from `allocate_id`
    pub fn put(&self, id: &str, job: Job) -> Result<(Job, CancelToken)> {
        let mut state = self.write();
        if !state.reserved.remove(id) {
            return Err(InternalError::unreserved_id(id).into());
        }
        Ok(state.insert(id.to_string(), job))
    }

    /// Allocate an id and store `job` under it in one step
    pub fn register(&self, job: Job) -> Result<(Job, CancelToken)> {
        let mut state = self.write();
        let id = state.draw_id(&self.generator)?;
        debug!("Registered job {id}");
        Ok(state.insert(id, job))
    }

    /// Snapshot of the job registered under `id`
    pub fn get(&self, id: &str) -> std::result::Result<Job, RequestError> {
        if id.is_empty() {
            return Err(RequestError::MissingId);
        }
        self.read()
            .jobs
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| RequestError::unknown_job(id))
    }

    /// Snapshots of every job, oldest request first
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().jobs.values().map(|e| e.job.clone()).collect();
        jobs.sort_by_key(|job| job.requested_at());
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the stored snapshot of `job`
    ///
    /// Returns false when the job is no longer registered or the update
    /// would move its status backwards; the stored snapshot is unchanged.
    pub fn publish(&self, job: &Job) -> bool {
        let Some(id) = job.id() else {
            return false;
        };
        let mut state = self.write();
        let Some(entry) = state.jobs.get_mut(id) else {
            debug!("Job {id} was removed, dropping update");
            return false;
        };
        if !entry.job.status().can_advance_to(job.status()) {
            warn!(
                "Rejected update of job {id} from {} to {}",
                entry.job.status(),
                job.status()
            );
            return false;
        }
        entry.job = job.clone();
        true
    }

    /// Remove a job, cancel it if still running and delete its artifacts
    pub fn remove(&self, id: &str) -> std::result::Result<Job, RequestError> {
        if id.is_empty() {
            return Err(RequestError::MissingId);
        }
        let entry = self
            .write()
            .jobs
            .remove(id)
            .ok_or_else(|| RequestError::unknown_job(id))?;
        Ok(Self::discard(entry))
    }

    /// Remove every job; returns how many there were
    pub fn clear(&self) -> usize {
        let entries: Vec<Entry> = self.write().jobs.drain().map(|(_, e)| e).collect();
        let count = entries.len();
        for entry in entries {
            Self::discard(entry);
        }
        count
    }

    fn discard(entry: Entry) -> Job {
        if !entry.job.status().is_terminal() {
            debug!("Cancelling job {}", entry.job.id().unwrap_or_default());
            entry.cancel.cancel();
        }
        entry.job.delete_artifacts();
        entry.job
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.len())
            .finish_non_exhaustive()
    }
}

/// Whether jobs are visible process-wide or only to the submitting session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryScope {
    Global,
    Session,
}

impl RegistryScope {
    pub fn from_global_flag(global: bool) -> Self {
        if global {
            RegistryScope::Global
        } else {
            RegistryScope::Session
        }
    }
}

/// Identifies the caller a session-scoped registry belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chooses the registry a session's jobs live in
#[derive(Debug)]
pub struct JobRegistries {
    scope: RegistryScope,
    global: Arc<JobRegistry>,
    sessions: RwLock<HashMap<SessionId, Arc<JobRegistry>>>,
}

impl JobRegistries {
    pub fn new(scope: RegistryScope) -> Self {
        Self::with_global(scope, JobRegistry::new())
    }

    /// Use `global` as the shared registry
    pub fn with_global(scope: RegistryScope, global: JobRegistry) -> Self {
        Self {
            scope,
            global: Arc::new(global),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> RegistryScope {
        self.scope
    }

    /// Registry for `session`, created on first use in session scope
    pub fn for_session(&self, session: &SessionId) -> Arc<JobRegistry> {
        if let Some(registry) = self.existing(session) {
            return registry;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session.clone()).or_insert_with(|| {
            debug!("Created job registry for session {session}");
            Arc::new(JobRegistry::new())
        }))
    }

    /// Registry `session` already has, without creating one
    pub fn existing(&self, session: &SessionId) -> Option<Arc<JobRegistry>> {
        if self.scope == RegistryScope::Global {
            return Some(Arc::clone(&self.global));
        }
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .map(Arc::clone)
    }

    /// Drop a session's registry, cancelling its jobs and deleting their
    /// artifacts. Returns the number of jobs removed; always 0 in global
    /// scope, where jobs outlive sessions.
    pub fn end_session(&self, session: &SessionId) -> usize {
        if self.scope == RegistryScope::Global {
            return 0;
        }
        let registry = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session);
        let removed = registry.map_or(0, |r| r.clear());
        debug!("Ended session {session}, removed {removed} jobs");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::content::DirectoryResolver;
    use crate::request::{HashParams, RequestSpec};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn job(root: &std::path::Path) -> Job {
        std::fs::create_dir_all(root.join("unit")).unwrap();
        let params = HashParams {
            auid: Some("unit".to_string()),
            ..Default::default()
        };
        let spec = RequestSpec::validate(&params, &DirectoryResolver::new(root)).unwrap();
        Job::new(Arc::new(spec))
    }

    fn sequence(ids: &'static [&'static str]) -> impl Fn() -> String + Send + Sync {
        let next = AtomicUsize::new(0);
        move || ids[next.fetch_add(1, Ordering::SeqCst) % ids.len()].to_string()
    }

    #[test]
    fn test_random_ids_are_alphanumeric() {
        let id = random_id();
        assert_eq!(id.len(), REQUEST_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_allocate_skips_reserved_ids() {
        let registry = JobRegistry::with_generator(sequence(&["aaaaa", "aaaaa", "bbbbb"]));
        assert_eq!(registry.allocate_id().unwrap(), "aaaaa");
        assert_eq!(registry.allocate_id().unwrap(), "bbbbb");
    }

    #[test]
    fn test_exhausted_id_space() {
        let registry = JobRegistry::with_generator(|| "same1".to_string());
        registry.allocate_id().unwrap();

        let err = registry.allocate_id().unwrap_err();
        assert!(matches!(
            err,
            Error::Internal(InternalError::IdSpaceExhausted {
                attempts: MAX_ID_ATTEMPTS
            })
        ));
    }

    #[test]
    fn test_put_requires_a_reserved_id() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::with_generator(sequence(&["resv1"]));

        let id = registry.allocate_id().unwrap();
        let (stored, _cancel) = registry.put(&id, job(dir.path())).unwrap();
        assert_eq!(stored.id(), Some("resv1"));
        assert_eq!(registry.get(&id).unwrap().id(), Some("resv1"));

        let err = registry.put(&id, job(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Internal(InternalError::UnreservedId { ref id }) if id == "resv1"));

        let err = registry.put("ZZZZZ", job(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Internal(InternalError::UnreservedId { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_errors() {
        let registry = JobRegistry::new();
        assert_eq!(registry.get("").unwrap_err(), RequestError::MissingId);
        assert_eq!(
            registry.get("nope1").unwrap_err().to_string(),
            "No such background hash: nope1"
        );
        assert!(registry.remove("nope1").is_err());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_session_scope_isolates_sessions() {
        let registries = JobRegistries::new(RegistryScope::Session);
        let alice = SessionId::new("alice");
        let bob = SessionId::new("bob");

        let a = registries.for_session(&alice);
        assert!(Arc::ptr_eq(&a, &registries.for_session(&alice)));
        assert!(!Arc::ptr_eq(&a, &registries.for_session(&bob)));
        assert_eq!(registries.end_session(&alice), 0);
        assert!(!Arc::ptr_eq(&a, &registries.for_session(&alice)));
    }

    #[test]
    fn test_existing_never_creates_a_registry() {
        let registries = JobRegistries::new(RegistryScope::Session);
        let carol = SessionId::new("carol");

        assert!(registries.existing(&carol).is_none());
        assert!(registries.existing(&carol).is_none());

        let created = registries.for_session(&carol);
        let found = registries.existing(&carol).unwrap();
        assert!(Arc::ptr_eq(&created, &found));
    }

    #[test]
    fn test_global_scope_shares_one_registry() {
        let registries = JobRegistries::new(RegistryScope::Global);
        let a = registries.for_session(&SessionId::new("alice"));
        let b = registries.for_session(&SessionId::new("bob"));
        assert!(Arc::ptr_eq(&a, &b));
        let unseen = registries.existing(&SessionId::new("carol")).unwrap();
        assert!(Arc::ptr_eq(&a, &unseen));
        assert_eq!(RegistryScope::from_global_flag(false), RegistryScope::Session);
    }

    proptest! {
        #[test]
        fn prop_allocated_ids_are_unique(count in 1usize..200) {
            let registry = JobRegistry::new();
            let mut seen = HashSet::new();
            for _ in 0..count {
                let id = registry.allocate_id().unwrap();
                prop_assert_eq!(id.len(), REQUEST_ID_LENGTH);
                prop_assert!(seen.insert(id));
            }
        }
    }
}
