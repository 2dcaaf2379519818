//! Error types for the sealing library.
//!
//! Only failures that stop an operation are errors. A document without an
//! envelope, or with a signature that does not match, is a normal verification
//! outcome and is reported through [`crate::signatures::VerificationResult`].

/// Result type alias for sealing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while sealing or verifying a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Required signing input missing or unusable
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed key or signature encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// A single embedding channel rejected the envelope
    #[error("Channel {channel} rejected the envelope: {reason}")]
    ChannelWrite {
        /// Channel name
        channel: &'static str,
        /// Why the write failed
        reason: String,
    },

    /// Every configured embedding channel rejected the envelope
    #[error("No embedding channel accepted the envelope")]
    NoChannelAccepted,

    /// Signature registry lookup failed
    #[error("Registry error: {0}")]
    Registry(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the bytes could not be read as a PDF at all.
    ///
    /// Structural errors are the only ones the verifier lets escape; everything
    /// else is folded into a verification state.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::InvalidHeader(_)
                | Error::ParseError { .. }
                | Error::InvalidXref
                | Error::ObjectNotFound(..)
                | Error::InvalidObjectType { .. }
                | Error::InvalidPdf(_)
                | Error::Decode(_)
                | Error::UnsupportedFilter(_)
        )
    }
}
