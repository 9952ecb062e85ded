//! Shared fixtures for integration tests

#![allow(dead_code)]

use rangehash_core::{HasherConfig, HashParams, JobRunner, SessionId};
use std::time::Duration;
use tempfile::TempDir;

pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Runner writing artifacts into its own temp dir
pub fn runner_with(config: HasherConfig) -> (TempDir, JobRunner) {
    let artifacts = tempfile::tempdir().unwrap();
    let config = HasherConfig {
        temp_dir: Some(artifacts.path().to_path_buf()),
        machine_name: Some("test-box".to_string()),
        ..config
    };
    (artifacts, JobRunner::new(config))
}

pub fn runner() -> (TempDir, JobRunner) {
    runner_with(HasherConfig::default())
}

pub fn session() -> SessionId {
    SessionId::new("test-session")
}

pub fn params(unit: &str, hash_type: &str) -> HashParams {
    HashParams {
        auid: Some(unit.to_string()),
        hash_type: Some(hash_type.to_string()),
        ..Default::default()
    }
}

/// Number of artifact files left in `dir`
pub fn artifact_count(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}
