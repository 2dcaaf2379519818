//! Document signatures.
//!
//! A signature here is a self-contained envelope rather than a PDF signature
//! field: the digest of the document *before* signing, an ECDSA P-256
//! signature over it and the signer's public key travel together inside the
//! document (see [`crate::envelope`]). Anyone holding the signed bytes can
//! verify them offline; no certificate chain is involved and the public key is
//! trusted as presented.
//!
//! ## Example
//!
//! ```
//! use pdf_seal::config::SealOptions;
//! use pdf_seal::signatures::{DocumentSigner, KeyPair, SignRequest, VerificationEngine};
//!
//! let keys = KeyPair::from_private(&[0x11; 32])?;
//! let signed = DocumentSigner::new(SealOptions::default())
//!     .sign_text("Hello World", &keys, &SignRequest::new("Ada").with_subject("Approval"))?;
//!
//! let result = VerificationEngine::new(SealOptions::default()).verify(&signed.bytes)?;
//! assert!(result.is_success());
//! # Ok::<(), pdf_seal::Error>(())
//! ```

mod engine;
mod hasher;
mod registry;
mod revision;
mod signer;
mod types;
mod verifier;

pub use engine::{public_key_from_private, PublicKey, SignatureEngine};
pub use hasher::CanonicalHasher;
pub use registry::{MemoryRegistry, RegistryRecord, SignatureRegistry};
pub use revision::pristine_prefix_len;
pub use signer::{DocumentSigner, SignedDocument};
pub use types::{
    decode_binary_field, Digest, DigestEncoding, EnvelopeWire, KeyPair, RecordSource, SignRequest,
    SignerInfo, SigningRecord, VerificationResult, VerificationState, FORMAT_VERSION,
};
pub use verifier::VerificationEngine;
