//! Canonical document hashing.

use super::types::Digest;
use crate::writer::TextDocumentBuilder;
use sha2::{Digest as _, Sha256};

/// Stable SHA-256 digest of document bytes.
///
/// The algorithm is fixed; changing it means a new envelope format version.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalHasher;

impl CanonicalHasher {
    /// Identifier of the hash function.
    pub const ALGORITHM: &'static str = "sha256";

    /// Digest raw bytes.
    pub fn digest(bytes: &[u8]) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest::from_bytes(hasher.finalize().into())
    }

    /// Materialize `text` as a one-page document, then digest it.
    ///
    /// Returns the digest together with the document bytes it covers.
    pub fn digest_text(text: &str) -> (Digest, Vec<u8>) {
        let bytes = TextDocumentBuilder::new(text).build();
        (Self::digest(&bytes), bytes)
    }
}
