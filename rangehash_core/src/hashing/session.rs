//! Per-job digest session

use super::traits::{HashAlgorithmImpl, StreamingHasher};
use crate::recording::RecordingSink;
use std::io;
use std::sync::Arc;

/// One job's view of its digest algorithm
///
/// Every digest handed out by `begin` is seeded with the challenge followed
/// by the verifier. Seed bytes and bytes passed through `feed` reach both
/// the digest and, when a recorder is attached, the recording sink, so the
/// recording holds exactly what was digested.
pub struct DigestSession<'a> {
    algorithm: Arc<dyn HashAlgorithmImpl>,
    seed: Vec<u8>,
    recorder: Option<&'a mut RecordingSink>,
}

impl<'a> DigestSession<'a> {
    pub fn new(
        algorithm: Arc<dyn HashAlgorithmImpl>,
        challenge: Option<&[u8]>,
        verifier: Option<&[u8]>,
    ) -> Self {
        let mut seed = Vec::new();
        seed.extend_from_slice(challenge.unwrap_or_default());
        seed.extend_from_slice(verifier.unwrap_or_default());

        Self {
            algorithm,
            seed,
            recorder: None,
        }
    }

    /// Tee everything fed through this session into `recorder`
    pub fn with_recorder(mut self, recorder: &'a mut RecordingSink) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn algorithm(&self) -> &dyn HashAlgorithmImpl {
        self.algorithm.as_ref()
    }

    /// Start a fresh digest, already seeded with the nonces
    pub fn begin(&mut self) -> io::Result<Box<dyn StreamingHasher>> {
        let mut digest = self.algorithm.create_hasher();
        if !self.seed.is_empty() {
            digest.update(&self.seed);
            if let Some(recorder) = self.recorder.as_deref_mut() {
                recorder.record(&self.seed)?;
            }
        }
        Ok(digest)
    }

    /// Feed content bytes to `digest` and to the recorder
    pub fn feed(&mut self, digest: &mut dyn StreamingHasher, data: &[u8]) -> io::Result<()> {
        digest.update(data);
        if let Some(recorder) = self.recorder.as_deref_mut() {
            recorder.record(data)?;
        }
        Ok(())
    }
}
