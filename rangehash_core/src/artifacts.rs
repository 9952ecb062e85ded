//! Temporary artifact files and streaming them back
//!
//! Block-hash and recording files are created with `new_artifact` and live
//! until their job is removed or, with auto-delete on, until they have been
//! streamed once. `ArtifactIndex` hands out opaque file ids for them so
//! callers never see or pass raw paths.

use crate::Result;
use crate::error::{IoError, RenderError, RequestError};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub const ARTIFACT_PREFIX: &str = "HashCUS";
pub const ARTIFACT_SUFFIX: &str = ".tmp";

/// Create a new artifact file in `dir`; the caller owns its lifetime
pub fn new_artifact(dir: &Path) -> io::Result<(File, PathBuf)> {
    let (file, path) = tempfile::Builder::new()
        .prefix(ARTIFACT_PREFIX)
        .suffix(ARTIFACT_SUFFIX)
        .tempfile_in(dir)?
        .keep()?;
    debug!("Created artifact {}", path.display());
    Ok((file, path))
}

/// Per-session map from opaque file ids to artifact paths
#[derive(Debug)]
pub struct ArtifactIndex {
    auto_delete: bool,
    state: RwLock<IndexState>,
}

#[derive(Debug, Default)]
struct IndexState {
    next: u64,
    by_id: HashMap<String, PathBuf>,
    by_path: HashMap<PathBuf, String>,
}

impl ArtifactIndex {
    pub fn new(auto_delete: bool) -> Self {
        Self {
            auto_delete,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// File id for `path`, reusing the id it already has
    pub fn register(&self, path: &Path) -> String {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = state.by_path.get(path) {
            return id.clone();
        }
        state.next += 1;
        let id = format!("f{}", state.next);
        state.by_id.insert(id.clone(), path.to_path_buf());
        state.by_path.insert(path.to_path_buf(), id.clone());
        id
    }

    pub fn path(&self, file_id: &str) -> Option<PathBuf> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(file_id)
            .cloned()
    }

    fn forget(&self, file_id: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = state.by_id.remove(file_id) {
            state.by_path.remove(&path);
        }
    }

    /// Open the artifact behind `file_id` for reading
    ///
    /// With auto-delete on, the id is forgotten and the file is deleted when
    /// the returned reader is dropped.
    pub fn stream_artifact(&self, file_id: &str) -> Result<ArtifactReader> {
        if file_id.is_empty() {
            return Err(RequestError::MissingId.into());
        }
        let path = self
            .path(file_id)
            .ok_or_else(|| RequestError::unknown_file(file_id))?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.forget(file_id);
                return Err(RenderError::missing_output(Some(&path)).into());
            }
            Err(e) => return Err(IoError::artifact(&path, e).into()),
        };
        if self.auto_delete {
            self.forget(file_id);
        }
        debug!("Streaming artifact {file_id} from {}", path.display());
        Ok(ArtifactReader {
            reader: BufReader::new(file),
            path,
            delete_on_drop: self.auto_delete,
        })
    }
}

/// Reader over one artifact
pub struct ArtifactReader {
    reader: BufReader<File>,
    path: PathBuf,
    delete_on_drop: bool,
}

impl ArtifactReader {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for ArtifactReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Drop for ArtifactReader {
    fn drop(&mut self) {
        if self.delete_on_drop
            && let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to delete {}: {e}", self.path.display());
        }
    }
}
