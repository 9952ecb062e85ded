//! In-memory content resolver for testing

use rangehash_core::content::{ContentRange, ContentResolver, RangeDescriptor};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// A latch that holds readers of gated content until it is opened
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let mut open = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*open {
            open = cvar.wait(open).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Debug, Clone)]
enum Content {
    Bytes(Vec<u8>),
    /// Listed but fails to open
    Unreadable,
    /// Blocks the first read until the gate opens
    Gated(Vec<u8>, Gate),
}

#[derive(Debug, Clone, Default)]
struct Unit {
    name: Option<String>,
    files: BTreeMap<String, Content>,
    unlistable: bool,
}

/// Mock content store keyed by unit id and url
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    units: HashMap<String, Unit>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its unit if needed
    pub fn add_file(&mut self, unit_id: &str, url: &str, content: &[u8]) -> &mut Self {
        self.unit(unit_id)
            .files
            .insert(url.to_string(), Content::Bytes(content.to_vec()));
        self
    }

    /// Add a url whose content cannot be opened
    pub fn add_unreadable(&mut self, unit_id: &str, url: &str) -> &mut Self {
        self.unit(unit_id)
            .files
            .insert(url.to_string(), Content::Unreadable);
        self
    }

    /// Add a file whose first read waits for `gate`
    pub fn add_gated(&mut self, unit_id: &str, url: &str, content: &[u8], gate: &Gate) -> &mut Self {
        self.unit(unit_id).files.insert(
            url.to_string(),
            Content::Gated(content.to_vec(), gate.clone()),
        );
        self
    }

    /// Make the unit resolve to a `FailingRange`
    pub fn make_unlistable(&mut self, unit_id: &str) -> &mut Self {
        self.unit(unit_id).unlistable = true;
        self
    }

    pub fn set_unit_name(&mut self, unit_id: &str, name: &str) -> &mut Self {
        self.unit(unit_id).name = Some(name.to_string());
        self
    }

    fn unit(&mut self, unit_id: &str) -> &mut Unit {
        self.units.entry(unit_id.to_string()).or_default()
    }
}

impl ContentResolver for MemoryResolver {
    fn resolve(&self, descriptor: &RangeDescriptor) -> Option<Arc<dyn ContentRange>> {
        let unit = self.units.get(&descriptor.unit_id)?;
        if unit.unlistable {
            return Some(Arc::new(FailingRange::new(
                descriptor.clone(),
                "unit listing failed",
            )));
        }

        let files: BTreeMap<String, Content> = unit
            .files
            .iter()
            .filter(|(url, _)| descriptor.includes(url))
            .map(|(url, content)| (url.clone(), content.clone()))
            .collect();
        if descriptor.url.is_some() && files.is_empty() {
            return None;
        }

        Some(Arc::new(MemoryRange {
            descriptor: descriptor.clone(),
            unit_name: unit
                .name
                .clone()
                .unwrap_or_else(|| descriptor.unit_id.clone()),
            files,
        }))
    }
}

struct MemoryRange {
    descriptor: RangeDescriptor,
    unit_name: String,
    files: BTreeMap<String, Content>,
}

impl ContentRange for MemoryRange {
    fn descriptor(&self) -> &RangeDescriptor {
        &self.descriptor
    }

    fn unit_name(&self) -> &str {
        &self.unit_name
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn open(&self, url: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        match self.files.get(url) {
            Some(Content::Bytes(data)) => Ok(Box::new(io::Cursor::new(data.as_slice()))),
            Some(Content::Gated(data, gate)) => Ok(Box::new(GatedReader {
                inner: io::Cursor::new(data.as_slice()),
                gate: Some(gate.clone()),
            })),
            Some(Content::Unreadable) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{url} is unreadable"),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{url} not in range"),
            )),
        }
    }
}

struct GatedReader<'a> {
    inner: io::Cursor<&'a [u8]>,
    gate: Option<Gate>,
}

impl Read for GatedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(gate) = self.gate.take() {
            gate.wait();
        }
        self.inner.read(buf)
    }
}

/// A range that resolves but cannot list its urls
#[derive(Debug, Clone)]
pub struct FailingRange {
    descriptor: RangeDescriptor,
    message: String,
}

impl FailingRange {
    pub fn new(descriptor: RangeDescriptor, message: &str) -> Self {
        Self {
            descriptor,
            message: message.to_string(),
        }
    }
}

impl ContentRange for FailingRange {
    fn descriptor(&self) -> &RangeDescriptor {
        &self.descriptor
    }

    fn unit_name(&self) -> &str {
        &self.descriptor.unit_id
    }

    fn entries(&self) -> io::Result<Vec<String>> {
        Err(io::Error::other(self.message.clone()))
    }

    fn open(&self, _url: &str) -> io::Result<Box<dyn Read + Send + '_>> {
        Err(io::Error::other(self.message.clone()))
    }
}
