//! Document verification.
//!
//! Classifies a document into one of the [`VerificationResult`] states:
//!
//! 1. Digest the bytes as presented.
//! 2. Extract the envelope; without one, fall back to the registry.
//! 3. An envelope lacking its signature or key is `MissingSignature`.
//! 4. Verify against the recorded pre-signing digest.
//! 5. A valid signature over a different digest is `ValidButModified`,
//!    unless the bytes are the signed prefix followed by nothing but the
//!    signing revision (see [`pristine_prefix_len`]), or a registry holds
//!    this exact signed output.
//!
//! Only structural errors (the bytes are not a PDF) escape as `Err`.

use super::engine::SignatureEngine;
use super::hasher::CanonicalHasher;
use super::registry::SignatureRegistry;
use super::revision::pristine_prefix_len;
use super::types::{Digest, RecordSource, SignerInfo, VerificationResult};
use crate::config::SealOptions;
use crate::document::HostDocument;
use crate::envelope::EnvelopeExtractor;
use crate::error::Result;
use std::sync::Arc;

/// Verifies signed documents.
pub struct VerificationEngine {
    options: SealOptions,
    engine: SignatureEngine,
    extractor: EnvelopeExtractor,
    registry: Option<Arc<dyn SignatureRegistry>>,
}

impl VerificationEngine {
    /// Create a verifier without a registry.
    pub fn new(options: SealOptions) -> Self {
        Self {
            engine: SignatureEngine::new(options.legacy_digests),
            extractor: EnvelopeExtractor::new(&options),
            options,
            registry: None,
        }
    }

    /// Consult `registry` when the document carries no envelope.
    pub fn with_registry(mut self, registry: Arc<dyn SignatureRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Verify document bytes.
    ///
    /// # Errors
    ///
    /// Returns an error only when `bytes` cannot be read as a PDF at all.
    pub fn verify(&self, bytes: &[u8]) -> Result<VerificationResult> {
        if let Err(e) = self.options.check_size(bytes.len()) {
            return Ok(VerificationResult::Error {
                message: e.to_string(),
            });
        }
        let uploaded_hash = CanonicalHasher::digest(bytes);

        let doc = match HostDocument::from_bytes(bytes) {
            Ok(doc) => doc,
            Err(e) if e.is_structural() => return Err(e),
            Err(e) => {
                return Ok(VerificationResult::Error {
                    message: e.to_string(),
                })
            },
        };

        let result = self.classify(bytes, &doc, uploaded_hash);
        log::info!("Verification result: {}", result.state());
        Ok(result)
    }

    fn classify(&self, bytes: &[u8], doc: &HostDocument, uploaded_hash: Digest) -> VerificationResult {
        let Some(extracted) = self.extractor.extract(doc) else {
            log::debug!("No envelope in document, consulting registry");
            return self.verify_with_registry(uploaded_hash);
        };

        let record = match extracted.record() {
            Ok(record) => record,
            Err(e) => {
                return VerificationResult::Error {
                    message: format!("envelope from {} could not be decoded: {}", extracted.source, e),
                }
            },
        };
        let signer = SignerInfo::from_record(&record, extracted.source);

        let (Some(signature), Some(public_key)) = (
            record.signature.as_deref().filter(|s| !s.is_empty()),
            record.public_key.as_deref().filter(|k| !k.is_empty()),
        ) else {
            return VerificationResult::MissingSignature {
                signer,
                uploaded_hash,
            };
        };

        let expected_hash = record.document_hash.unwrap_or(uploaded_hash);
        let Some(encoding) = self.engine.verify_any(signature, &expected_hash, public_key) else {
            return VerificationResult::InvalidSignature {
                signer,
                expected_hash,
                uploaded_hash,
            };
        };

        let unmodified = expected_hash == uploaded_hash
            || pristine_prefix_len(bytes, doc, &expected_hash).is_some()
            || self.registered_output(&uploaded_hash, signature);
        if !unmodified {
            VerificationResult::ValidButModified {
                signer,
                expected_hash,
                uploaded_hash,
                encoding,
            }
        } else {
            VerificationResult::Success {
                signer,
                document_hash: expected_hash,
                encoding,
            }
        }
    }

    /// Whether a registry recorded `uploaded_hash` as the output of this signature.
    fn registered_output(&self, uploaded_hash: &Digest, signature: &[u8]) -> bool {
        let Some(registry) = &self.registry else {
            return false;
        };
        match registry.find_by_hash(uploaded_hash) {
            Ok(Some(record)) => record.signature == signature,
            Ok(None) => false,
            Err(e) => {
                log::warn!("Registry lookup failed: {}", e);
                false
            },
        }
    }

    fn verify_with_registry(&self, uploaded_hash: Digest) -> VerificationResult {
        let Some(registry) = &self.registry else {
            return VerificationResult::MissingMetadata { uploaded_hash };
        };
        let record = match registry.find_by_hash(&uploaded_hash) {
            Ok(Some(record)) => record,
            Ok(None) => return VerificationResult::MissingMetadata { uploaded_hash },
            Err(e) => {
                log::error!("Registry lookup failed: {}", e);
                return VerificationResult::Error {
                    message: format!("registry lookup failed: {}", e),
                };
            },
        };

        let signer = SignerInfo {
            name: record.signer_name.clone(),
            email: record.signer_email.clone(),
            subject: None,
            document_id: None,
            signed_at: record.signed_at,
            source: RecordSource::Registry,
        };
        if record.signature.is_empty() || record.public_key.is_empty() {
            return VerificationResult::MissingSignature {
                signer,
                uploaded_hash,
            };
        }

        let expected_hash = record
            .original_content
            .as_deref()
            .map(CanonicalHasher::digest)
            .unwrap_or(uploaded_hash);
        match self
            .engine
            .verify_any(&record.signature, &expected_hash, &record.public_key)
        {
            Some(encoding) => VerificationResult::Success {
                signer,
                document_hash: expected_hash,
                encoding,
            },
            None => VerificationResult::InvalidSignature {
                signer,
                expected_hash,
                uploaded_hash,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::{DocumentSigner, KeyPair, SignRequest, VerificationState};
    use crate::writer::TextDocumentBuilder;

    fn signed() -> (Vec<u8>, Vec<u8>) {
        let original = TextDocumentBuilder::new("Hello World").build();
        let keys = KeyPair::from_private(&[0x11; 32]).unwrap();
        let signed = DocumentSigner::new(SealOptions::default())
            .sign(&original, &keys, &SignRequest::new("Ada"))
            .unwrap();
        (original, signed.bytes)
    }

    #[test]
    fn test_success_carries_signer() {
        let (original, bytes) = signed();
        let result = VerificationEngine::new(SealOptions::default()).verify(&bytes).unwrap();
        match result {
            VerificationResult::Success {
                signer, document_hash, ..
            } => {
                assert_eq!(signer.name.as_deref(), Some("Ada"));
                assert_eq!(document_hash, CanonicalHasher::digest(&original));
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_original_bytes_without_envelope() {
        let (original, _) = signed();
        let result = VerificationEngine::new(SealOptions::default()).verify(&original).unwrap();
        assert_eq!(result.state(), VerificationState::MissingMetadata);
    }

    #[test]
    fn test_structural_error_propagates() {
        let err = VerificationEngine::new(SealOptions::default())
            .verify(b"not a pdf at all")
            .unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_oversized_input_is_error_state() {
        let (_, bytes) = signed();
        let options = SealOptions::default().with_max_document_size(16);
        let result = VerificationEngine::new(options).verify(&bytes).unwrap();
        assert_eq!(result.state(), VerificationState::Error);
    }

    #[test]
    fn test_appended_byte_is_modified() {
        let (original, mut bytes) = signed();
        bytes.push(b'\n');
        let result = VerificationEngine::new(SealOptions::default()).verify(&bytes).unwrap();
        match result {
            VerificationResult::ValidButModified {
                expected_hash,
                uploaded_hash,
                ..
            } => {
                assert_eq!(expected_hash, CanonicalHasher::digest(&original));
                assert_eq!(uploaded_hash, CanonicalHasher::digest(&bytes));
                assert_ne!(expected_hash, uploaded_hash);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_full_rewrite_needs_registry_to_succeed() {
        use crate::config::SaveMode;
        use crate::signatures::{MemoryRegistry, RegistryRecord};

        let original = TextDocumentBuilder::new("Hello World").build();
        let keys = KeyPair::from_private(&[0x11; 32]).unwrap();
        let options = SealOptions::default().with_save_mode(SaveMode::FullRewrite);
        let signed = DocumentSigner::new(options.clone())
            .sign(&original, &keys, &SignRequest::new("Ada"))
            .unwrap();

        let plain = VerificationEngine::new(options.clone()).verify(&signed.bytes).unwrap();
        assert_eq!(plain.state(), VerificationState::ValidButModified);

        let registry = Arc::new(MemoryRegistry::new());
        registry
            .register_signing(
                RegistryRecord {
                    signature: signed.record.signature.clone().unwrap(),
                    public_key: keys.public_key().to_vec(),
                    original_content: Some(original),
                    signer_name: Some("Ada".to_string()),
                    signer_email: None,
                    signed_at: None,
                },
                &signed.bytes,
            )
            .unwrap();
        let confirmed = VerificationEngine::new(options)
            .with_registry(registry)
            .verify(&signed.bytes)
            .unwrap();
        assert!(confirmed.is_success());
    }
}
