//! SHA-1 digest algorithm, the default for block hashes

use super::DigestHasher;
use crate::hashing::traits::{HashAlgorithmImpl, StreamingHasher};
use sha1::Sha1;

pub struct Sha1Algorithm;

impl HashAlgorithmImpl for Sha1Algorithm {
    fn name(&self) -> &'static str {
        "SHA-1"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["SHA", "SHA1"]
    }

    fn digest_len(&self) -> usize {
        20
    }

    fn create_hasher(&self) -> Box<dyn StreamingHasher> {
        Box::new(DigestHasher::<Sha1>::new())
    }
}
