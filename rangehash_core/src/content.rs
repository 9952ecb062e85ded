//! Content ranges and how they are resolved
//!
//! A `RangeDescriptor` names a unit of preserved content plus an optional
//! url prefix and bounds. A `ContentResolver` turns a descriptor into a
//! `ContentRange`, which lists the urls to hash and opens them for reading.
//!
//! `DirectoryResolver` is the bundled resolver: each unit is a directory
//! under a root, and urls are `/`-separated paths relative to the unit.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Lower bound marking a range that covers exactly one url
pub const SINGLE_NODE_LOWER_BOUND: &str = ".";

/// Names a range of content within one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub unit_id: String,
    /// Url prefix; `None` covers the whole unit
    pub url: Option<String>,
    /// Inclusive lower bound, appended to `url` before comparing
    pub lower: Option<String>,
    /// Inclusive upper bound, appended to `url` before comparing
    pub upper: Option<String>,
}

impl RangeDescriptor {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            url: None,
            lower: None,
            upper: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_bounds(mut self, lower: Option<String>, upper: Option<String>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// The same descriptor narrowed to its url alone
    pub fn single_node(&self) -> Self {
        Self {
            unit_id: self.unit_id.clone(),
            url: self.url.clone(),
            lower: Some(SINGLE_NODE_LOWER_BOUND.to_string()),
            upper: None,
        }
    }

    pub fn is_single_node(&self) -> bool {
        self.lower.as_deref() == Some(SINGLE_NODE_LOWER_BOUND)
    }

    /// Whether `url` falls inside this range
    pub fn includes(&self, url: &str) -> bool {
        let prefix = self.url.as_deref().unwrap_or("");

        if self.is_single_node() {
            return url == prefix;
        }
        if !url.starts_with(prefix) {
            return false;
        }
        if let Some(lower) = &self.lower
            && url < format!("{prefix}{lower}").as_str()
        {
            return false;
        }
        if let Some(upper) = &self.upper
            && url > format!("{prefix}{upper}").as_str()
        {
            return false;
        }
        true
    }
}

impl fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unit_id)?;
        if let Some(url) = &self.url {
            write!(f, " {url}")?;
        }
        if self.is_single_node() {
            write!(f, " [single node]")?;
        } else if self.lower.is_some() || self.upper.is_some() {
            write!(
                f,
                " [{} - {}]",
                self.lower.as_deref().unwrap_or(""),
                self.upper.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

/// A resolved range of content
pub trait ContentRange: Send + Sync {
    fn descriptor(&self) -> &RangeDescriptor;

    /// Human readable name of the unit the range belongs to
    fn unit_name(&self) -> &str;

    /// Urls in the range, in hashing order
    fn entries(&self) -> io::Result<Vec<String>>;

    /// Open one url of the range for reading
    fn open(&self, url: &str) -> io::Result<Box<dyn Read + Send + '_>>;
}

/// Resolves descriptors to content ranges
pub trait ContentResolver: Send + Sync {
    /// `None` when the unit does not exist or the range selects nothing
    fn resolve(&self, descriptor: &RangeDescriptor) -> Option<Arc<dyn ContentRange>>;
}

/// Resolver over a directory tree: `<root>/<unit_id>/<url>`
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_dir(&self, unit_id: &str) -> Option<PathBuf> {
        let mut components = Path::new(unit_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.root.join(unit_id)),
            _ => None,
        }
    }
}

impl ContentResolver for DirectoryResolver {
    fn resolve(&self, descriptor: &RangeDescriptor) -> Option<Arc<dyn ContentRange>> {
        let unit_dir = self.unit_dir(&descriptor.unit_id)?;
        if !unit_dir.is_dir() {
            debug!("No unit directory for {}", descriptor.unit_id);
            return None;
        }

        let range = DirectoryRange {
            unit_dir,
            descriptor: descriptor.clone(),
        };

        // A url that selects nothing does not name a range
        if descriptor.url.is_some() {
            match range.entries() {
                Ok(entries) if !entries.is_empty() => {}
                Ok(_) => return None,
                Err(e) => {
                    debug!("Failed to list {descriptor}: {e}");
                    return None;
                }
            }
        }

        Some(Arc::new(range))
    }
}

struct DirectoryRange {
    unit_dir: PathBuf,
    descriptor: RangeDescriptor,
}

impl ContentRange for DirectoryRange {
    fn descriptor(&self) -> &RangeDescriptor {
        &self.descriptor
    }

    fn unit_name(&self) -> &str {
        &self.descriptor.unit_id
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        let mut urls = Vec::new();
        for entry in WalkDir::new(&self.unit_dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.unit_dir) else {
                continue;
            };
            let url = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if self.descriptor.includes(&url) {
                trace!("Range {} includes {url}", self.descriptor);
                urls.push(url);
            }
        }
        urls.sort();
        Ok(urls)
    }

    fn open(&self, url: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        if !self.descriptor.includes(url) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{url} is outside {}", self.descriptor),
            ));
        }
        Ok(Box::new(File::open(self.unit_dir.join(url))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn unit_tree() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let unit = root.path().join("journal-2014");
        fs::create_dir_all(unit.join("issues/1")).unwrap();
        fs::create_dir_all(unit.join("issues/2")).unwrap();
        fs::write(unit.join("index.html"), b"<html>index</html>").unwrap();
        fs::write(unit.join("issues/1/a.pdf"), b"first").unwrap();
        fs::write(unit.join("issues/1/b.pdf"), b"second").unwrap();
        fs::write(unit.join("issues/2/c.pdf"), b"third").unwrap();
        root
    }

    #[test]
    fn test_whole_unit_entries_are_sorted() {
        let root = unit_tree();
        let resolver = DirectoryResolver::new(root.path());
        let range = resolver
            .resolve(&RangeDescriptor::new("journal-2014"))
            .unwrap();

        assert_eq!(
            range.entries().unwrap(),
            vec![
                "index.html",
                "issues/1/a.pdf",
                "issues/1/b.pdf",
                "issues/2/c.pdf"
            ]
        );
    }

    #[test]
    fn test_url_prefix_and_bounds() {
        let root = unit_tree();
        let resolver = DirectoryResolver::new(root.path());

        let prefix = RangeDescriptor::new("journal-2014").with_url("issues/");
        let range = resolver.resolve(&prefix).unwrap();
        assert_eq!(range.entries().unwrap().len(), 3);

        let bounded = prefix.with_bounds(Some("1/b".to_string()), Some("2/".to_string()));
        let range = resolver.resolve(&bounded).unwrap();
        assert_eq!(range.entries().unwrap(), vec!["issues/1/b.pdf"]);
    }

    #[test]
    fn test_single_node() {
        let root = unit_tree();
        let resolver = DirectoryResolver::new(root.path());
        let descriptor = RangeDescriptor::new("journal-2014")
            .with_url("issues/1/a.pdf")
            .single_node();

        let range = resolver.resolve(&descriptor).unwrap();
        assert_eq!(range.entries().unwrap(), vec!["issues/1/a.pdf"]);

        let mut content = String::new();
        range
            .open("issues/1/a.pdf")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first");
        assert!(range.open("index.html").is_err());
    }

    #[test]
    fn test_unresolvable_descriptors() {
        let root = unit_tree();
        let resolver = DirectoryResolver::new(root.path());

        assert!(resolver.resolve(&RangeDescriptor::new("no-such-unit")).is_none());
        assert!(resolver.resolve(&RangeDescriptor::new("../etc")).is_none());
        assert!(
            resolver
                .resolve(&RangeDescriptor::new("journal-2014").with_url("missing/"))
                .is_none()
        );
    }

    #[test]
    fn test_display() {
        let descriptor = RangeDescriptor::new("unit").with_url("a/");
        assert_eq!(descriptor.to_string(), "unit a/");
        assert_eq!(
            descriptor.single_node().to_string(),
            "unit a/ [single node]"
        );
        let bounded = descriptor.with_bounds(Some("b".into()), None);
        assert_eq!(bounded.to_string(), "unit a/ [b - ]");
    }
}
