//! Core traits for pluggable digest algorithms

/// Core trait that all digest algorithms must implement
pub trait HashAlgorithmImpl: Send + Sync {
    /// Canonical algorithm name, as written into block-hash headers
    fn name(&self) -> &'static str;

    /// Other names accepted when looking the algorithm up
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Length in bytes of a finished digest
    fn digest_len(&self) -> usize;

    /// Create a new streaming hasher instance
    fn create_hasher(&self) -> Box<dyn StreamingHasher>;

    /// Calculate the digest of in-memory data
    fn hash_bytes(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.create_hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Trait for streaming digest calculation
pub trait StreamingHasher: Send {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize the digest and return its raw bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;
}
