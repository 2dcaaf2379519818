//! Signature registry collaborator.
//!
//! A registry remembers signing operations outside the document. It is only
//! consulted when no envelope can be recovered from the document itself.

use super::hasher::CanonicalHasher;
use super::types::Digest;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// A signing operation as stored by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecord {
    /// Signature over the digest of `original_content`
    pub signature: Vec<u8>,
    /// SEC1 public key of the signer
    pub public_key: Vec<u8>,
    /// Bytes that were signed, when the registry keeps them
    pub original_content: Option<Vec<u8>>,
    /// Signer name
    pub signer_name: Option<String>,
    /// Signer email
    pub signer_email: Option<String>,
    /// When the document was signed
    pub signed_at: Option<DateTime<Utc>>,
}

/// Lookup of signing records by document digest.
///
/// Implementations index each record under both the digest of the original
/// content and the digest of the signed output.
pub trait SignatureRegistry: Send + Sync {
    /// Find the record registered under `hash`.
    fn find_by_hash(&self, hash: &Digest) -> Result<Option<RegistryRecord>>;
}

/// In-memory registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: RwLock<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    records: Vec<RegistryRecord>,
    index: HashMap<Digest, usize>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record under the given digests.
    ///
    /// Records are appended; a digest registered twice points at the newest.
    pub fn register(&self, record: RegistryRecord, hashes: &[Digest]) -> Result<()> {
        let mut entries = self
            .inner
            .write()
            .map_err(|_| Error::Registry("registry lock poisoned".to_string()))?;
        let slot = entries.records.len();
        entries.records.push(record);
        for hash in hashes {
            entries.index.insert(*hash, slot);
        }
        Ok(())
    }

    /// Register a signing operation under its original and signed digests.
    pub fn register_signing(&self, record: RegistryRecord, signed_output: &[u8]) -> Result<()> {
        let mut hashes = vec![CanonicalHasher::digest(signed_output)];
        if let Some(original) = &record.original_content {
            hashes.push(CanonicalHasher::digest(original));
        }
        self.register(record, &hashes)
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.inner.read().map(|e| e.records.len()).unwrap_or(0)
    }

    /// Whether no record is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignatureRegistry for MemoryRegistry {
    fn find_by_hash(&self, hash: &Digest) -> Result<Option<RegistryRecord>> {
        let entries = self
            .inner
            .read()
            .map_err(|_| Error::Registry("registry lock poisoned".to_string()))?;
        Ok(entries
            .index
            .get(hash)
            .and_then(|&slot| entries.records.get(slot))
            .cloned())
    }
}
