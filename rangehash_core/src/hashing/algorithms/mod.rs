//! Digest algorithm implementations

use super::registry::AlgorithmRegistry;
use super::traits::StreamingHasher;
use ::sha2::Digest;

mod md5;
mod sha1;
mod sha2;

/// Register all built-in algorithms with the registry
pub(crate) fn register_all(registry: &AlgorithmRegistry) {
    registry.register(md5::Md5Algorithm);
    registry.register(sha1::Sha1Algorithm);
    registry.register(sha2::Sha256Algorithm);
    registry.register(sha2::Sha512Algorithm);
}

/// Streaming adapter over any RustCrypto `Digest`
struct DigestHasher<D> {
    inner: D,
}

impl<D: Digest> DigestHasher<D> {
    fn new() -> Self {
        Self { inner: D::new() }
    }
}

impl<D: Digest + Send> StreamingHasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        Digest::finalize(self.inner).to_vec()
    }
}
