//! Hash request parameters and their validation
//!
//! `HashParams` is what a caller hands in, every field optional and
//! textual. `RequestSpec::validate` checks it, resolves the content range
//! and produces an immutable spec that a `JobRunner` can execute. A failed
//! validation never creates a job.

use crate::content::{ContentRange, ContentResolver, RangeDescriptor};
use crate::error::ValidationError;
use crate::hashing::DEFAULT_ALGORITHM;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which hashing procedure a request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashVariant {
    /// One digest over the content of every url in the range
    SingleDigestByContent,
    /// One digest over the names of the urls in the range
    SingleDigestByName,
    /// One digest over the content of a single url
    SingleDigestSingleFile,
    /// One digest per url, written to a block-hash file
    BlockDigestTree,
    /// A block-hash file for a single url
    BlockDigestSingleFile,
}

/// How a variant is executed and rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Single(SingleDigestMode),
    Block,
}

/// What a single-digest variant feeds to the digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleDigestMode {
    Content,
    Name,
}

impl HashVariant {
    pub const ALL: [HashVariant; 5] = [
        HashVariant::SingleDigestByContent,
        HashVariant::SingleDigestByName,
        HashVariant::SingleDigestSingleFile,
        HashVariant::BlockDigestTree,
        HashVariant::BlockDigestSingleFile,
    ];

    /// Variant used when a request does not name one
    pub const DEFAULT: HashVariant = HashVariant::BlockDigestTree;

    pub fn kind(self) -> VariantKind {
        match self {
            HashVariant::SingleDigestByContent | HashVariant::SingleDigestSingleFile => {
                VariantKind::Single(SingleDigestMode::Content)
            }
            HashVariant::SingleDigestByName => VariantKind::Single(SingleDigestMode::Name),
            HashVariant::BlockDigestTree | HashVariant::BlockDigestSingleFile => VariantKind::Block,
        }
    }

    pub fn is_single_file(self) -> bool {
        matches!(
            self,
            HashVariant::SingleDigestSingleFile | HashVariant::BlockDigestSingleFile
        )
    }

    /// Numeric code the variant shipped as before it had names
    pub fn legacy_code(self) -> u8 {
        match self {
            HashVariant::SingleDigestByContent => 1,
            HashVariant::SingleDigestByName => 2,
            HashVariant::SingleDigestSingleFile => 3,
            HashVariant::BlockDigestTree => 4,
            HashVariant::BlockDigestSingleFile => 5,
        }
    }

    /// Symbolic name older clients send
    pub fn legacy_name(self) -> &'static str {
        match self {
            HashVariant::SingleDigestByContent => "V1Content",
            HashVariant::SingleDigestByName => "V1Name",
            HashVariant::SingleDigestSingleFile => "V1File",
            HashVariant::BlockDigestTree => "V3Tree",
            HashVariant::BlockDigestSingleFile => "V3File",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashVariant::SingleDigestByContent => "SingleDigestByContent",
            HashVariant::SingleDigestByName => "SingleDigestByName",
            HashVariant::SingleDigestSingleFile => "SingleDigestSingleFile",
            HashVariant::BlockDigestTree => "BlockDigestTree",
            HashVariant::BlockDigestSingleFile => "BlockDigestSingleFile",
        }
    }
}

impl fmt::Display for HashVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashVariant {
    type Err = ValidationError;

    /// Accepts the legacy codes `1`-`5`, the legacy names and the current names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::ALL
                .into_iter()
                .find(|v| v.legacy_code() == code)
                .ok_or_else(|| ValidationError::unknown_variant(s));
        }
        Self::ALL
            .into_iter()
            .find(|v| v.legacy_name() == s || v.name() == s)
            .ok_or_else(|| ValidationError::unknown_variant(s))
    }
}

/// Text encoding for digests and nonces in results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultEncoding {
    #[default]
    Hex,
    Base64,
}

impl ResultEncoding {
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            ResultEncoding::Hex => hex::encode_upper(bytes),
            ResultEncoding::Base64 => BASE64.encode(bytes),
        }
    }
}

impl fmt::Display for ResultEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultEncoding::Hex => f.write_str("Hex"),
            ResultEncoding::Base64 => f.write_str("Base64"),
        }
    }
}

impl FromStr for ResultEncoding {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" => Ok(ResultEncoding::Hex),
            "base64" => Ok(ResultEncoding::Base64),
            _ => Err(ValidationError::unknown_encoding(s)),
        }
    }
}

/// How the result of a finished job reaches the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultDelivery {
    /// Result page with links to the artifacts
    #[default]
    File,
    /// The block-hash artifact itself is the response
    Inline,
}

impl fmt::Display for ResultDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultDelivery::File => f.write_str("File"),
            ResultDelivery::Inline => f.write_str("Inline"),
        }
    }
}

impl FromStr for ResultDelivery {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(ResultDelivery::File),
            "inline" => Ok(ResultDelivery::Inline),
            _ => Err(ValidationError::unknown_delivery(s)),
        }
    }
}

/// Raw request parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashParams {
    pub auid: Option<String>,
    pub url: Option<String>,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub algorithm: Option<String>,
    /// Base64 poller nonce
    pub challenge: Option<String>,
    /// Base64 voter nonce
    pub verifier: Option<String>,
    pub hash_type: Option<String>,
    pub encoding: Option<String>,
    pub result_type: Option<String>,
    pub record: bool,
    pub background: bool,
}

/// A validated hash request
#[derive(Clone)]
pub struct RequestSpec {
    descriptor: RangeDescriptor,
    range: Arc<dyn ContentRange>,
    algorithm: String,
    challenge: Option<Vec<u8>>,
    verifier: Option<Vec<u8>>,
    variant: HashVariant,
    record_filtered: bool,
    asynchronous: bool,
    encoding: ResultEncoding,
    delivery: ResultDelivery,
}

impl RequestSpec {
    /// Validate `params` and resolve its content range
    pub fn validate(
        params: &HashParams,
        resolver: &dyn ContentResolver,
    ) -> Result<Self, ValidationError> {
        let variant = match present(&params.hash_type) {
            Some(value) => value.parse()?,
            None => HashVariant::DEFAULT,
        };
        let encoding = match present(&params.encoding) {
            Some(value) => value.parse()?,
            None => ResultEncoding::default(),
        };
        let delivery = match present(&params.result_type) {
            Some(value) => value.parse()?,
            None => ResultDelivery::default(),
        };
        if params.background && delivery == ResultDelivery::Inline {
            return Err(ValidationError::InlineBackground);
        }

        let unit_id = present(&params.auid).ok_or_else(|| ValidationError::missing_field("auid"))?;
        let challenge = decode_nonce("Challenge", &params.challenge)?;
        let verifier = decode_nonce("Verifier", &params.verifier)?;

        let mut descriptor = RangeDescriptor::new(unit_id).with_bounds(
            present(&params.lower).map(str::to_string),
            present(&params.upper).map(str::to_string),
        );
        if let Some(url) = present(&params.url) {
            descriptor = descriptor.with_url(url);
        }
        if variant.is_single_file() {
            if descriptor.url.is_none() {
                return Err(ValidationError::invalid_parameter(
                    "url",
                    "a single-file hash needs a url",
                ));
            }
            if descriptor.upper.is_some() || (descriptor.lower.is_some() && !descriptor.is_single_node()) {
                warn!("Upper/Lower ignored for {variant} request on {descriptor}");
            }
            descriptor = descriptor.single_node();
        }

        let range = resolver
            .resolve(&descriptor)
            .ok_or_else(|| ValidationError::unresolved_content(&descriptor))?;

        let algorithm = present(&params.algorithm)
            .unwrap_or(DEFAULT_ALGORITHM)
            .to_string();

        debug!("Validated {variant} request for {descriptor} using {algorithm}");

        Ok(Self {
            descriptor,
            range,
            algorithm,
            challenge,
            verifier,
            variant,
            record_filtered: params.record,
            asynchronous: params.background,
            encoding,
            delivery,
        })
    }

    pub fn descriptor(&self) -> &RangeDescriptor {
        &self.descriptor
    }

    pub fn range(&self) -> &Arc<dyn ContentRange> {
        &self.range
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn challenge(&self) -> Option<&[u8]> {
        self.challenge.as_deref()
    }

    pub fn verifier(&self) -> Option<&[u8]> {
        self.verifier.as_deref()
    }

    pub fn variant(&self) -> HashVariant {
        self.variant
    }

    pub fn record_filtered(&self) -> bool {
        self.record_filtered
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    pub fn encoding(&self) -> ResultEncoding {
        self.encoding
    }

    pub fn delivery(&self) -> ResultDelivery {
        self.delivery
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("descriptor", &self.descriptor)
            .field("algorithm", &self.algorithm)
            .field("challenge", &self.challenge.as_ref().map(|c| c.len()))
            .field("verifier", &self.verifier.as_ref().map(|v| v.len()))
            .field("variant", &self.variant)
            .field("record_filtered", &self.record_filtered)
            .field("asynchronous", &self.asynchronous)
            .field("encoding", &self.encoding)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn decode_nonce(field: &str, value: &Option<String>) -> Result<Option<Vec<u8>>, ValidationError> {
    match present(value) {
        Some(text) => BASE64
            .decode(text)
            .map(Some)
            .map_err(|_| ValidationError::invalid_base64(field, text)),
        None => Ok(None),
    }
}
