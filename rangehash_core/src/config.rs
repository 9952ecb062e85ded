//! Hasher configuration

use crate::content_hasher::DEFAULT_STEP_SIZE;
use crate::error::ValidationError;
use crate::recording::{DEFAULT_RECORDING_LIMIT, limit_from_config};
use crate::registry::RegistryScope;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings shared by every job a runner executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HasherConfig {
    /// Bytes of the hashed stream kept by a recording; negative keeps all
    pub truncate_filtered_stream: i64,
    /// One registry for all sessions instead of one per session
    pub global_background_requests: bool,
    /// Delete an artifact once it has been streamed
    pub auto_delete_hash_files: bool,
    /// Name written into block-hash headers
    pub machine_name: Option<String>,
    pub step_size: usize,
    /// Directory for artifacts; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            truncate_filtered_stream: DEFAULT_RECORDING_LIMIT,
            global_background_requests: true,
            auto_delete_hash_files: true,
            machine_name: None,
            step_size: DEFAULT_STEP_SIZE,
            temp_dir: None,
        }
    }
}

impl HasherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.step_size == 0 {
            return Err(ValidationError::invalid_configuration(
                "step_size must be positive",
            ));
        }
        if let Some(dir) = &self.temp_dir
            && !dir.is_dir()
        {
            return Err(ValidationError::invalid_configuration(&format!(
                "temp_dir {} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    pub fn recording_limit(&self) -> Option<u64> {
        limit_from_config(self.truncate_filtered_stream)
    }

    pub fn registry_scope(&self) -> RegistryScope {
        RegistryScope::from_global_flag(self.global_background_requests)
    }

    /// Configured machine name, else `$HOSTNAME`, else `localhost`
    pub fn machine_name(&self) -> String {
        self.machine_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
