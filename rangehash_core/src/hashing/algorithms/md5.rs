//! MD5 digest algorithm

use super::DigestHasher;
use crate::hashing::traits::{HashAlgorithmImpl, StreamingHasher};
use md5::Md5;

pub struct Md5Algorithm;

impl HashAlgorithmImpl for Md5Algorithm {
    fn name(&self) -> &'static str {
        "MD5"
    }

    fn digest_len(&self) -> usize {
        16
    }

    fn create_hasher(&self) -> Box<dyn StreamingHasher> {
        Box::new(DigestHasher::<Md5>::new())
    }
}
