//! Signing envelope embedding and recovery.
//!
//! The serialized [`SigningRecord`](crate::signatures::SigningRecord) is
//! written redundantly into several places of the document, each an
//! [`EmbeddingChannel`]. Channels fail independently: a write succeeds as long
//! as one channel accepted the envelope, and a read stops at the first channel
//! whose content parses.
//!
//! ## Channels, in priority order
//!
//! | Channel | Location |
//! |---------|----------|
//! | [`InfoEntryChannel`] | `/SealEnvelope` in the information dictionary |
//! | [`KeywordsChannel`] | `/Keywords` in the information dictionary |
//! | [`CatalogChannel`] | `/PdfSeal_Envelope` dictionary referenced from the catalog |
//! | [`XmpChannel`] | `pdfseal:Envelope` in the catalog `/Metadata` packet |
//!
//! ## Example
//!
//! ```
//! use pdf_seal::config::SealOptions;
//! use pdf_seal::envelope::{EnvelopeExtractor, EnvelopeWriter};
//! use pdf_seal::signatures::{CanonicalHasher, SigningRecord};
//! use pdf_seal::writer::TextDocumentBuilder;
//!
//! let original = TextDocumentBuilder::new("Hello World").build();
//! let record = SigningRecord {
//!     signature: Some(vec![1; 64]),
//!     public_key: Some(vec![4; 65]),
//!     document_hash: Some(CanonicalHasher::digest(&original)),
//!     signing_timestamp: None,
//!     author: Some("Ada".to_string()),
//!     subject: None,
//!     document_id: None,
//!     format_version: "1.0".to_string(),
//! };
//!
//! let written = EnvelopeWriter::new(SealOptions::default()).write(&original, &record)?;
//! assert_eq!(written.report.accepted.len(), 4);
//!
//! let found = EnvelopeExtractor::new(&SealOptions::default())
//!     .extract_bytes(&written.bytes)?
//!     .expect("envelope");
//! assert_eq!(found.record()?.signature, record.signature);
//! # Ok::<(), pdf_seal::Error>(())
//! ```

mod channels;
mod extractor;
pub mod normalize;
mod writer;

pub use channels::{
    channel_for, CatalogChannel, InfoEntryChannel, KeywordsChannel, XmpChannel, CATALOG_KEY, INFO_KEY,
};
pub use extractor::{ChannelProbe, EnvelopeExtractor, ExtractedEnvelope};
pub use writer::{EnvelopeWriter, WriteReport, WrittenDocument};

use crate::config::ChannelKind;
use crate::document::HostDocument;
use crate::error::Result;

/// A place in the document that can hold the envelope text.
pub trait EmbeddingChannel: Send + Sync {
    /// Which channel this is.
    fn kind(&self) -> ChannelKind;

    /// Store `blob`, replacing any previous envelope in this channel.
    fn write(&self, doc: &mut HostDocument, blob: &str) -> Result<()>;

    /// Raw text held by this channel, if any.
    fn read(&self, doc: &HostDocument) -> Option<String>;

    /// Remove the envelope from this channel. Returns whether anything was removed.
    fn clear(&self, doc: &mut HostDocument) -> Result<bool>;
}
