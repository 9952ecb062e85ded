//! Bounded recording of the hashed byte stream
//!
//! The recording is a diagnostic sample: once `limit` bytes have been
//! written, later bytes are counted but dropped. Compare `recorded` with
//! `seen` to tell whether the sample is complete.

use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Recording limit used when the configuration does not set one
pub const DEFAULT_RECORDING_LIMIT: i64 = 100 * 1024;

/// Convert a configured limit into a byte bound; negative means unlimited
pub fn limit_from_config(value: i64) -> Option<u64> {
    u64::try_from(value).ok()
}

/// What a finished recording holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    /// Bytes written to the artifact
    pub recorded: u64,
    /// Bytes offered to the sink, recorded or not
    pub seen: u64,
}

impl RecordingSummary {
    pub fn is_truncated(&self) -> bool {
        self.recorded < self.seen
    }
}

/// Bounded writer the digest session tees content into
///
/// The underlying file is flushed and closed by `finish`, or by `Drop` on
/// any other exit path.
pub struct RecordingSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    limit: Option<u64>,
    recorded: u64,
    seen: u64,
}

impl RecordingSink {
    /// Create (or truncate) the artifact at `path`
    pub fn create(path: &Path, limit: Option<u64>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_file(file, path.to_path_buf(), limit))
    }

    /// Wrap an already opened artifact file
    pub fn from_file(file: File, path: PathBuf, limit: Option<u64>) -> Self {
        debug!("Recording hashed stream to {} (limit {limit:?})", path.display());
        Self {
            path,
            writer: Some(BufWriter::new(file)),
            limit,
            recorded: 0,
            seen: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Append as much of `data` as the limit allows
    pub fn record(&mut self, data: &[u8]) -> io::Result<()> {
        self.seen += data.len() as u64;

        let room = match self.limit {
            Some(limit) => limit.saturating_sub(self.recorded),
            None => u64::MAX,
        };
        let take = usize::try_from(room).map_or(data.len(), |room| room.min(data.len()));
        if take == 0 {
            return Ok(());
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("recording already closed"))?;
        writer.write_all(&data[..take])?;
        self.recorded += take as u64;
        Ok(())
    }

    /// Flush and close the artifact
    pub fn finish(mut self) -> io::Result<RecordingSummary> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(RecordingSummary {
            path: self.path.clone(),
            recorded: self.recorded,
            seen: self.seen,
        })
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            warn!("Failed to flush recording {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_limit_from_config() {
        assert_eq!(limit_from_config(-1), None);
        assert_eq!(limit_from_config(0), Some(0));
        assert_eq!(limit_from_config(DEFAULT_RECORDING_LIMIT), Some(102_400));
    }

    #[test]
    fn test_truncates_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.tmp");
        let mut sink = RecordingSink::create(&path, Some(10)).unwrap();

        sink.record(b"0123456").unwrap();
        sink.record(b"789abcdef").unwrap();
        sink.record(b"ghij").unwrap();

        let summary = sink.finish().unwrap();
        assert_eq!(summary.recorded, 10);
        assert_eq!(summary.seen, 20);
        assert!(summary.is_truncated());
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[test]
    fn test_unlimited_records_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.tmp");
        let mut sink = RecordingSink::create(&path, None).unwrap();

        sink.record(&[7u8; 5000]).unwrap();

        let summary = sink.finish().unwrap();
        assert!(!summary.is_truncated());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5000);
    }

    #[test]
    fn test_drop_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.tmp");
        {
            let mut sink = RecordingSink::create(&path, None).unwrap();
            sink.record(b"partial").unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"partial");
    }

    proptest! {
        #[test]
        fn prop_recorded_length_is_min_of_limit_and_input(
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 0..20),
            limit in 0u64..2000,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("rec.tmp");
            let mut sink = RecordingSink::create(&path, Some(limit)).unwrap();
            let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
            for chunk in &chunks {
                sink.record(chunk).unwrap();
            }
            let summary = sink.finish().unwrap();

            prop_assert_eq!(summary.recorded, total.min(limit));
            prop_assert_eq!(summary.seen, total);
            prop_assert_eq!(std::fs::metadata(&path).unwrap().len(), total.min(limit));
        }
    }
}
