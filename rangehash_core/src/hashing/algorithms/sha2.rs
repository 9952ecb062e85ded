//! SHA-2 family digest algorithms

use super::DigestHasher;
use crate::hashing::traits::{HashAlgorithmImpl, StreamingHasher};
use sha2::{Sha256, Sha512};

pub struct Sha256Algorithm;

impl HashAlgorithmImpl for Sha256Algorithm {
    fn name(&self) -> &'static str {
        "SHA-256"
    }

    fn digest_len(&self) -> usize {
        32
    }

    fn create_hasher(&self) -> Box<dyn StreamingHasher> {
        Box::new(DigestHasher::<Sha256>::new())
    }
}

pub struct Sha512Algorithm;

impl HashAlgorithmImpl for Sha512Algorithm {
    fn name(&self) -> &'static str {
        "SHA-512"
    }

    fn digest_len(&self) -> usize {
        64
    }

    fn create_hasher(&self) -> Box<dyn StreamingHasher> {
        Box::new(DigestHasher::<Sha512>::new())
    }
}
