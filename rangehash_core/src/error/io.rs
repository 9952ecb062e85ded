//! I/O errors on artifact files

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An I/O failure, with the artifact path when the caller knows it
#[derive(Error, Debug)]
#[error("{}", describe(self))]
pub struct IoError {
    pub path: Option<PathBuf>,
    #[source]
    pub source: io::Error,
}

impl IoError {
    pub fn from_std(source: io::Error) -> Self {
        Self { path: None, source }
    }

    /// Failure opening or reading the artifact at `path`
    pub fn artifact(path: &Path, source: io::Error) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            source,
        }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

fn describe(error: &IoError) -> String {
    match &error.path {
        Some(path) => format!("I/O error on {}: {}", path.display(), error.source),
        None => format!("I/O error: {}", error.source),
    }
}
