// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::should_implement_trait)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # pdf_seal
//!
//! Sign PDF documents with a self-contained signature envelope and verify them
//! offline, even after the envelope has been partly damaged or stripped.
//!
//! ## Core Features
//!
//! - **Canonical hashing**: SHA-256 of the pristine bytes, taken before any
//!   envelope is written
//! - **ECDSA P-256**: prehash signing with fixed 64-byte signatures; DER and
//!   legacy digest encodings accepted on verification
//! - **Redundant embedding**: the envelope is written to the information
//!   dictionary, `/Keywords`, a catalog dictionary and the XMP packet
//! - **Tolerant extraction**: quoted, escaped, wrapped or embedded envelopes are
//!   recovered, with a whole-document string scan as a last resort
//! - **Verification states**: success, valid-but-modified, invalid signature,
//!   missing signature, missing metadata, error
//!
//! ## PDF Layer
//!
//! - **Parsing**: nom-based lexer, recursive-descent object parser, classic and
//!   stream cross-reference sections with `/Prev` chains, object streams
//! - **Recovery**: cross-reference reconstruction by scanning for object headers
//! - **Writing**: incremental updates that keep the original bytes as a prefix,
//!   or full rewrites
//!
//! ## Quick Start
//!
//! ```
//! use pdf_seal::config::SealOptions;
//! use pdf_seal::signatures::{DocumentSigner, KeyPair, SignRequest, VerificationEngine};
//! use pdf_seal::writer::TextDocumentBuilder;
//!
//! # fn main() -> Result<(), pdf_seal::Error> {
//! let original = TextDocumentBuilder::new("Hello World").build();
//! let keys = KeyPair::from_private(&[0x11; 32])?;
//!
//! let signed = DocumentSigner::new(SealOptions::default())
//!     .sign(&original, &keys, &SignRequest::new("Ada Lovelace"))?;
//!
//! let verifier = VerificationEngine::new(SealOptions::default());
//! assert!(verifier.verify(&signed.bytes)?.is_success());
//!
//! let mut tampered = signed.bytes.clone();
//! tampered.push(b'\n');
//! assert_eq!(verifier.verify(&tampered)?.state().name(), "valid_but_modified");
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders
pub mod decoders;

// XMP metadata
pub mod extractors;

// PDF writing
pub mod writer;

// Configuration
pub mod config;

// Signing, verification and envelopes
pub mod envelope;
pub mod signatures;

// Re-exports
pub use config::{ChannelKind, SealOptions};
pub use document::HostDocument;
pub use error::{Error, Result};
pub use signatures::{
    CanonicalHasher, Digest, DocumentSigner, KeyPair, SignRequest, VerificationEngine,
    VerificationResult,
};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // VERSION is populated from CARGO_PKG_VERSION at compile time
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_seal");
    }
}
