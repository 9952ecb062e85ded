//! Rendering finished jobs
//!
//! Single-digest jobs render as a key/value record. Block-digest jobs
//! render either as that record with a link to the block-hash file, or, for
//! inline delivery, as the block-hash file itself. The block-hash file is
//! written by `BlockFileWriter` while the job runs.

use crate::artifacts::ArtifactIndex;
use crate::content_hasher::BlockSink;
use crate::error::RenderError;
use crate::job::{Job, JobStatus};
use crate::request::{ResultDelivery, ResultEncoding, VariantKind};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// Leading text of every block-hash file
pub const BLOCK_HEADER_PREFIX: &str = "# Block hashes from ";
pub const BLOCK_TRAILER: &str = "# end";
const BLOCK_ERROR_LINE: &str = "Hash error (see log)        ";

/// `"<ms> ms, <rate> bytes/ms"`
///
/// The rate is `inf` for a zero elapsed time and shown with two decimals
/// when the integer rate is below 100.
pub fn elapsed_string(bytes_hashed: u64, elapsed_ms: u64) -> String {
    let rate = match bytes_hashed.checked_div(elapsed_ms) {
        None => "inf".to_string(),
        Some(rate) if rate < 100 => format!("{:.2}", bytes_hashed as f64 / elapsed_ms as f64),
        Some(rate) => rate.to_string(),
    };
    format!("{elapsed_ms} ms, {rate} bytes/ms")
}

/// Header fields of a block-hash file
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub machine: String,
    pub timestamp: DateTime<Utc>,
    pub unit_name: String,
    pub algorithm: String,
    pub encoding: ResultEncoding,
    pub challenge: Option<Vec<u8>>,
    pub verifier: Option<Vec<u8>>,
}

impl BlockHeader {
    fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "{BLOCK_HEADER_PREFIX}{}, {}",
            self.machine,
            self.timestamp.format("%a, %d %b %Y %H:%M:%S GMT")
        )?;
        writeln!(out, "# AU: {}", self.unit_name)?;
        writeln!(out, "# Hash algorithm: {}", self.algorithm)?;
        writeln!(out, "# Encoding: {}", self.encoding)?;
        if let Some(challenge) = &self.challenge {
            writeln!(out, "# Poller nonce: {}", self.encoding.encode(challenge))?;
        }
        if let Some(verifier) = &self.verifier {
            writeln!(out, "# Voter nonce: {}", self.encoding.encode(verifier))?;
        }
        Ok(())
    }
}

/// Writes a block-hash file as digests arrive
pub struct BlockFileWriter {
    out: BufWriter<File>,
    encoding: ResultEncoding,
}

impl BlockFileWriter {
    /// Wrap `file` and write the header
    pub fn create(file: File, header: &BlockHeader) -> io::Result<Self> {
        let mut out = BufWriter::new(file);
        header.write_to(&mut out)?;
        Ok(Self {
            out,
            encoding: header.encoding,
        })
    }

    /// Write the trailer and close the file
    pub fn finish(mut self) -> io::Result<()> {
        writeln!(self.out, "{BLOCK_TRAILER}")?;
        self.out.flush()
    }

    /// Record why hashing stopped and close the file
    pub fn finish_with_error(mut self, message: &str) -> io::Result<()> {
        write!(self.out, "\nError: {message}")?;
        self.out.flush()
    }
}

impl BlockSink for BlockFileWriter {
    fn block_done(&mut self, url: &str, digest: &[u8]) -> io::Result<()> {
        writeln!(self.out, "{}   {url}", self.encoding.encode(digest))
    }

    fn block_failed(&mut self, url: &str, _error: &io::Error) -> io::Result<()> {
        writeln!(self.out, "{BLOCK_ERROR_LINE}{url}")
    }
}

/// Ordered key/value rendering of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRecord {
    fields: Vec<(String, String)>,
}

impl ResultRecord {
    fn push(&mut self, key: &str, value: impl Into<String>) {
        self.fields.push((key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Record(ResultRecord),
    /// An artifact to be streamed as the response
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub payload: Payload,
    pub content_type: &'static str,
}

/// Renders terminal jobs, registering their artifacts for streaming
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    artifacts: Arc<ArtifactIndex>,
}

impl ResultFormatter {
    pub fn new(artifacts: Arc<ArtifactIndex>) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &Arc<ArtifactIndex> {
        &self.artifacts
    }

    pub fn render(&self, job: &Job) -> Result<RenderedResult, RenderError> {
        match job.status() {
            JobStatus::Done => {}
            JobStatus::Error => {
                return Err(RenderError::job_failed(
                    job.error().unwrap_or("Unknown error"),
                ));
            }
            status => return Err(RenderError::NotFinished { status }),
        }
        let counters = job.counters().copied().unwrap_or_default();
        let spec = job.spec();

        match spec.variant().kind() {
            VariantKind::Single(_) => {
                let digest = job
                    .digest()
                    .ok_or_else(|| RenderError::missing_output(None))?;
                let mut record = ResultRecord::default();
                record.push("CUSS", spec.descriptor().to_string());
                let encoding = spec.encoding();
                if let Some(challenge) = spec.challenge() {
                    record.push("Challenge", encoding.encode(challenge));
                }
                if let Some(verifier) = spec.verifier() {
                    record.push("Verifier", encoding.encode(verifier));
                }
                record.push("Size", counters.bytes_hashed.to_string());
                record.push("Hash", encoding.encode(digest));
                record.push(
                    "Time",
                    elapsed_string(counters.bytes_hashed, counters.elapsed_ms),
                );
                self.push_stream(&mut record, job);
                Ok(text(record))
            }
            VariantKind::Block => {
                let block_file = job
                    .block_file()
                    .filter(|path| path.exists())
                    .ok_or_else(|| RenderError::missing_output(job.block_file()))?;

                if spec.delivery() == ResultDelivery::Inline {
                    return Ok(RenderedResult {
                        payload: Payload::File(block_file.to_path_buf()),
                        content_type: CONTENT_TYPE_TEXT,
                    });
                }

                let mut record = ResultRecord::default();
                if spec.is_asynchronous() {
                    record.push("Status", job.status().to_string());
                }
                record.push("CUSS", spec.descriptor().to_string());
                record.push("Files", counters.files_hashed.to_string());
                record.push("Size", counters.bytes_hashed.to_string());
                record.push(
                    "Time",
                    elapsed_string(counters.bytes_hashed, counters.elapsed_ms),
                );
                record.push("Hash file", self.artifacts.register(block_file));
                self.push_stream(&mut record, job);
                Ok(text(record))
            }
        }
    }

    fn push_stream(&self, record: &mut ResultRecord, job: &Job) {
        let Some(recording) = job.recording().filter(|r| r.path.exists()) else {
            return;
        };
        // Nonce seeds are recorded too, so compare against what the sink saw
        let key = if recording.is_truncated() {
            format!("Stream (First {} bytes)", recording.recorded)
        } else {
            "Stream".to_string()
        };
        let id = self.artifacts.register(&recording.path);
        record.push(&key, id);
    }
}

fn text(record: ResultRecord) -> RenderedResult {
    RenderedResult {
        payload: Payload::Record(record),
        content_type: CONTENT_TYPE_TEXT,
    }
}
