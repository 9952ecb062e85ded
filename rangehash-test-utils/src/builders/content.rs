//! Builder for on-disk content trees

use rangehash_core::DirectoryResolver;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Deterministic non-trivial bytes of the given length
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Builds a directory tree of units for `DirectoryResolver`
///
/// ```ignore
/// let (root, resolver) = ContentBuilder::new()
///     .file("journal", "issue1/a.pdf", b"first")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ContentBuilder {
    files: Vec<(String, String, Vec<u8>)>,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, unit_id: &str, url: &str, content: &[u8]) -> Self {
        self.files
            .push((unit_id.to_string(), url.to_string(), content.to_vec()));
        self
    }

    /// Add a file of `len` patterned bytes
    pub fn sized_file(self, unit_id: &str, url: &str, len: usize) -> Self {
        self.file(unit_id, url, &patterned_bytes(len))
    }

    /// Write the tree into a fresh temp dir
    ///
    /// Panics on I/O failure; intended for tests only.
    pub fn build(self) -> (TempDir, DirectoryResolver) {
        let root = tempfile::tempdir().expect("create content root");
        self.write_into(root.path());
        let resolver = DirectoryResolver::new(root.path());
        (root, resolver)
    }

    pub fn write_into(&self, root: &Path) {
        for (unit_id, url, content) in &self.files {
            let path = root.join(unit_id).join(url);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create content directory");
            }
            fs::write(&path, content).expect("write content file");
        }
    }
}
