//! Document signing.
//!
//! Validates the request, hashes the pristine bytes, signs the digest and
//! hands the record to the envelope writer. The digest is always taken before
//! anything is written into the document.

use super::engine::SignatureEngine;
use super::hasher::CanonicalHasher;
use super::types::{KeyPair, SignRequest, SigningRecord, FORMAT_VERSION};
use crate::config::SealOptions;
use crate::envelope::{EnvelopeWriter, WriteReport};
use crate::error::{Error, Result};
use chrono::{SubsecRound, Utc};

/// A signed document and the record embedded in it.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    /// Bytes with the envelope embedded
    pub bytes: Vec<u8>,
    /// The embedded record
    pub record: SigningRecord,
    /// Per-channel outcome
    pub report: WriteReport,
}

/// Signs documents with a caller-supplied key pair.
pub struct DocumentSigner {
    options: SealOptions,
}

impl DocumentSigner {
    /// Create a signer.
    pub fn new(options: SealOptions) -> Self {
        Self { options }
    }

    /// Sign PDF bytes.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for a missing author, empty input or oversized input
    /// - structural errors if `original` is not a readable PDF
    /// - `Error::NoChannelAccepted` if the envelope could not be stored anywhere
    pub fn sign(&self, original: &[u8], keys: &KeyPair, request: &SignRequest) -> Result<SignedDocument> {
        request.validate()?;
        if original.is_empty() {
            return Err(Error::Validation("document is empty".to_string()));
        }
        self.options.check_size(original.len())?;

        let document_hash = CanonicalHasher::digest(original);
        let signature = SignatureEngine::sign(&document_hash, keys.private_key())?;

        let record = SigningRecord {
            signature: Some(signature),
            public_key: Some(keys.public_key().to_vec()),
            document_hash: Some(document_hash),
            signing_timestamp: Some(request.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(0)),
            author: Some(request.author.trim().to_string()),
            subject: Some(request.subject.trim().to_string()).filter(|s| !s.is_empty()),
            document_id: Some(
                request
                    .document_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            ),
            format_version: FORMAT_VERSION.to_string(),
        };

        let written = EnvelopeWriter::new(self.options.clone()).write(original, &record)?;
        log::info!(
            "Signed document {} ({} {})",
            record.document_id.as_deref().unwrap_or_default(),
            CanonicalHasher::ALGORITHM,
            document_hash
        );
        Ok(SignedDocument {
            bytes: written.bytes,
            record,
            report: written.report,
        })
    }

    /// Materialize `text` as a one-page document and sign that.
    pub fn sign_text(&self, text: &str, keys: &KeyPair, request: &SignRequest) -> Result<SignedDocument> {
        request.validate()?;
        let (_, original) = CanonicalHasher::digest_text(text);
        self.sign(&original, keys, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::public_key_from_private;

    fn keys() -> KeyPair {
        KeyPair::from_private(&[0x11; 32]).unwrap()
    }

    #[test]
    fn test_sign_records_pristine_hash() {
        let original = crate::writer::TextDocumentBuilder::new("Hello World").build();
        let signed = DocumentSigner::new(SealOptions::default())
            .sign(&original, &keys(), &SignRequest::new("Ada").with_subject("Approval"))
            .unwrap();

        assert_eq!(signed.record.document_hash, Some(CanonicalHasher::digest(&original)));
        assert_ne!(signed.record.document_hash, Some(CanonicalHasher::digest(&signed.bytes)));
        assert_eq!(
            signed.record.public_key.as_deref(),
            Some(public_key_from_private(&[0x11; 32]).unwrap().as_slice())
        );
        assert!(signed.record.document_id.is_some());
        assert_eq!(signed.record.subject.as_deref(), Some("Approval"));
    }

    #[test]
    fn test_validation_before_hashing() {
        let signer = DocumentSigner::new(SealOptions::default());
        assert!(matches!(
            signer.sign(b"%PDF-1.4", &keys(), &SignRequest::new("")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            signer.sign(b"", &keys(), &SignRequest::new("Ada")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_sign_text_matches_digest_text() {
        let signed = DocumentSigner::new(SealOptions::default())
            .sign_text("Hello World", &keys(), &SignRequest::new("Ada").with_document_id("t-1"))
            .unwrap();
        assert_eq!(signed.record.document_hash, Some(CanonicalHasher::digest_text("Hello World").0));
        assert_eq!(signed.record.document_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn test_timestamp_truncated_to_seconds() {
        let signed = DocumentSigner::new(SealOptions::default())
            .sign_text("x", &keys(), &SignRequest::new("Ada"))
            .unwrap();
        let ts = signed.record.signing_timestamp.unwrap();
        assert_eq!(ts, ts.trunc_subsecs(0));
    }
}
