//! Configuration for signing and verification.
//!
//! # Example
//!
//! ```
//! use pdf_seal::config::{ChannelKind, SaveMode, SealOptions};
//!
//! // Everything on, incremental saves, legacy digests accepted (default)
//! let lenient = SealOptions::lenient();
//!
//! // Canonical digests only, no exhaustive string scan
//! let strict = SealOptions::strict();
//!
//! // Custom configuration
//! let custom = SealOptions::default()
//!     .with_channels(vec![ChannelKind::InfoEntry, ChannelKind::Catalog])
//!     .with_save_mode(SaveMode::FullRewrite);
//! assert_eq!(custom.channels.len(), 2);
//! ```

/// One of the places inside a PDF that can carry the envelope.
///
/// Variants are listed in reading priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    /// Custom `SealEnvelope` key in the document information dictionary
    InfoEntry,
    /// The standard `/Keywords` entry
    Keywords,
    /// Namespaced dictionary hanging off the catalog
    Catalog,
    /// `pdfseal:Envelope` property in the XMP metadata packet
    Xmp,
}

impl ChannelKind {
    /// All channels in priority order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::InfoEntry,
        ChannelKind::Keywords,
        ChannelKind::Catalog,
        ChannelKind::Xmp,
    ];

    /// Stable short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::InfoEntry => "info-entry",
            ChannelKind::Keywords => "keywords",
            ChannelKind::Catalog => "catalog",
            ChannelKind::Xmp => "xmp",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a signed document is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Append changed objects after the original bytes
    #[default]
    Incremental,
    /// Write every object into a fresh file
    FullRewrite,
}

/// Whether digests signed with a non-canonical encoding still verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyDigestPolicy {
    /// Try the legacy encodings after the canonical one
    #[default]
    Accept,
    /// Canonical encoding only
    Reject,
}

/// Options shared by the signer, writer, extractor and verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealOptions {
    /// Channels to write, and to read in this order
    pub channels: Vec<ChannelKind>,

    /// Output layout for signed documents
    ///
    /// Documents whose cross-reference chain had to be reconstructed are
    /// always fully rewritten.
    pub save_mode: SaveMode,

    /// Legacy digest encodings during verification
    pub legacy_digests: LegacyDigestPolicy,

    /// Scan every string and stream for an envelope when no channel has one
    pub scan_fallback: bool,

    /// `/Producer` written into the information dictionary
    pub producer: String,

    /// Largest input accepted, in bytes (0 = unlimited)
    pub max_document_size: usize,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            channels: ChannelKind::ALL.to_vec(),
            save_mode: SaveMode::Incremental,
            legacy_digests: LegacyDigestPolicy::Accept,
            scan_fallback: true,
            producer: format!("pdf_seal {}", crate::VERSION),
            max_document_size: 256 * 1024 * 1024,
        }
    }
}

impl SealOptions {
    /// Default options: every channel, legacy digests and the string scan on.
    pub fn lenient() -> Self {
        Self::default()
    }

    /// Canonical digests only and no exhaustive scan.
    pub fn strict() -> Self {
        Self {
            legacy_digests: LegacyDigestPolicy::Reject,
            scan_fallback: false,
            ..Self::default()
        }
    }

    /// Choose the channels to use.
    pub fn with_channels(mut self, channels: Vec<ChannelKind>) -> Self {
        self.channels = channels;
        self
    }

    /// Choose how signed documents are saved.
    pub fn with_save_mode(mut self, mode: SaveMode) -> Self {
        self.save_mode = mode;
        self
    }

    /// Choose the legacy digest policy.
    pub fn with_legacy_digests(mut self, policy: LegacyDigestPolicy) -> Self {
        self.legacy_digests = policy;
        self
    }

    /// Enable or disable the exhaustive string scan.
    pub fn with_scan_fallback(mut self, enable: bool) -> Self {
        self.scan_fallback = enable;
        self
    }

    /// Set the `/Producer` string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Set the input size limit (0 = unlimited).
    pub fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = bytes;
        self
    }

    /// Reject inputs over the size limit.
    pub fn check_size(&self, len: usize) -> crate::error::Result<()> {
        if self.max_document_size > 0 && len > self.max_document_size {
            return Err(crate::error::Error::Validation(format!(
                "document is {} bytes, limit is {}",
                len, self.max_document_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_all_channels_in_order() {
        let opts = SealOptions::default();
        assert_eq!(opts.channels, ChannelKind::ALL.to_vec());
        assert_eq!(opts.save_mode, SaveMode::Incremental);
        assert_eq!(opts.legacy_digests, LegacyDigestPolicy::Accept);
        assert!(opts.scan_fallback);
        assert!(opts.producer.starts_with("pdf_seal "));
    }

    #[test]
    fn test_strict_preset() {
        let opts = SealOptions::strict();
        assert_eq!(opts.legacy_digests, LegacyDigestPolicy::Reject);
        assert!(!opts.scan_fallback);
        assert_eq!(opts.channels.len(), 4);
    }

    #[test]
    fn test_builder_methods() {
        let opts = SealOptions::default()
            .with_channels(vec![ChannelKind::Xmp])
            .with_save_mode(SaveMode::FullRewrite)
            .with_producer("Acme Signer")
            .with_scan_fallback(false);
        assert_eq!(opts.channels, vec![ChannelKind::Xmp]);
        assert_eq!(opts.save_mode, SaveMode::FullRewrite);
        assert_eq!(opts.producer, "Acme Signer");
        assert!(!opts.scan_fallback);
    }

    #[test]
    fn test_size_limit() {
        let opts = SealOptions::default().with_max_document_size(10);
        assert!(opts.check_size(10).is_ok());
        assert!(opts.check_size(11).is_err());
        assert!(SealOptions::default().with_max_document_size(0).check_size(usize::MAX).is_ok());
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(ChannelKind::InfoEntry.to_string(), "info-entry");
        assert!(ChannelKind::InfoEntry < ChannelKind::Xmp);
    }
}
