//! Signing record, digest and verification result types.

use crate::config::ChannelKind;
use crate::error::{Error, Result};
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current envelope format version.
pub const FORMAT_VERSION: &str = "1.0";

/// A SHA-256 document digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Length of a digest in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::Encoding(format!("digest must be {} bytes, got {}", Self::LEN, bytes.len()))
        })?;
        Ok(Digest(array))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = Error;

    /// Accepts hex in either case, with optional `0x` and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| Error::Encoding(format!("digest is not hex: {}", e)))?;
        Digest::try_from(bytes.as_slice())
    }
}

/// Decode a binary envelope field: hex (optional `0x`) first, then base64.
pub fn decode_binary_field(field: &str, value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    let unprefixed = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if let Ok(bytes) = hex::decode(unprefixed) {
        return Ok(bytes);
    }
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| Error::Encoding(format!("field {} is neither hex nor base64", field)))
}

/// The logical signing envelope.
///
/// `signature` and `public_key` belong together: a record holding only one of
/// them is incomplete (see [`SigningRecord::has_signature`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRecord {
    /// Signature over `document_hash`
    pub signature: Option<Vec<u8>>,
    /// SEC1 public key of the signer
    pub public_key: Option<Vec<u8>>,
    /// Digest of the document before the envelope was written
    pub document_hash: Option<Digest>,
    /// When the document was signed
    pub signing_timestamp: Option<DateTime<Utc>>,
    /// Signer name
    pub author: Option<String>,
    /// Reason or title supplied by the signer
    pub subject: Option<String>,
    /// Opaque correlation id
    pub document_id: Option<String>,
    /// Envelope format version
    pub format_version: String,
}

impl SigningRecord {
    /// Whether both the signature and the public key are present.
    pub fn has_signature(&self) -> bool {
        self.signature.as_ref().is_some_and(|s| !s.is_empty())
            && self.public_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// Wire form of this record.
    pub fn to_wire(&self) -> EnvelopeWire {
        EnvelopeWire {
            signature: self.signature.as_ref().map(hex::encode),
            public_key: self.public_key.as_ref().map(hex::encode),
            document_hash: self.document_hash.map(|d| d.to_hex()),
            signing_date: self
                .signing_timestamp
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            author: self.author.clone(),
            subject: self.subject.clone(),
            id: self.document_id.clone(),
            format_version: Some(self.format_version.clone()),
        }
    }

    /// Canonical JSON text of this record.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    /// Decode a wire record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if a binary field cannot be decoded.
    pub fn from_wire(wire: &EnvelopeWire) -> Result<Self> {
        let binary = |field: &str, value: &Option<String>| -> Result<Option<Vec<u8>>> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => decode_binary_field(field, v).map(Some),
                _ => Ok(None),
            }
        };

        let document_hash = match binary("documentHash", &wire.document_hash)? {
            Some(bytes) => Some(Digest::try_from(bytes.as_slice())?),
            None => None,
        };

        let signing_timestamp = wire.signing_date.as_deref().and_then(|s| {
            DateTime::parse_from_rfc3339(s.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| log::debug!("Ignoring unparseable signingDate {:?}: {}", s, e))
                .ok()
        });

        Ok(SigningRecord {
            signature: binary("signature", &wire.signature)?,
            public_key: binary("publicKey", &wire.public_key)?,
            document_hash,
            signing_timestamp,
            author: wire.author.clone(),
            subject: wire.subject.clone(),
            document_id: wire.id.clone(),
            format_version: wire
                .format_version
                .clone()
                .unwrap_or_else(|| FORMAT_VERSION.to_string()),
        })
    }

    /// Parse and decode envelope JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: EnvelopeWire = serde_json::from_str(json)?;
        Self::from_wire(&wire)
    }
}

/// Serialized envelope, exactly as stored in the document.
///
/// Field names are a stable contract. Binary values are lowercase hex and
/// `signingDate` is RFC 3339 UTC. Unknown fields are ignored on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeWire {
    /// Signature (hex)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub signature: Option<String>,
    /// Public key (hex)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub public_key: Option<String>,
    /// Pre-signing document digest (hex)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub document_hash: Option<String>,
    /// Signing time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub signing_date: Option<String>,
    /// Signer name
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub author: Option<String>,
    /// Signing reason or title
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub subject: Option<String>,
    /// Document correlation id
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Envelope format version
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub format_version: Option<String>,
}

impl EnvelopeWire {
    /// Whether at least one signature field carries a value.
    pub fn has_signature_field(&self) -> bool {
        [&self.signature, &self.public_key, &self.document_hash]
            .iter()
            .any(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Numbers and booleans are kept as their text; null and nested values are dropped.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// An existing key pair handed to the signer.
///
/// Keys are never generated here; the caller owns custody.
#[derive(Clone)]
pub struct KeyPair {
    private_key: [u8; 32],
    public_key: Vec<u8>,
}

impl KeyPair {
    /// Pair a private scalar with its SEC1 public key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if either half is malformed and
    /// `Error::Validation` if the halves do not belong together.
    pub fn new(private_key: &[u8], public_key: &[u8]) -> Result<Self> {
        let derived = super::engine::public_key_from_private(private_key)?;
        let given = super::engine::PublicKey::parse(public_key)?;
        if super::engine::PublicKey::parse(&derived)? != given {
            return Err(Error::Validation("public key does not match private key".to_string()));
        }
        Ok(Self {
            private_key: private_scalar(private_key)?,
            public_key: public_key.to_vec(),
        })
    }

    /// Build a pair from the private half alone.
    pub fn from_private(private_key: &[u8]) -> Result<Self> {
        let public_key = super::engine::public_key_from_private(private_key)?;
        Ok(Self {
            private_key: private_scalar(private_key)?,
            public_key,
        })
    }

    /// Build a pair from a hex private key (whitespace and `0x` tolerated).
    pub fn from_private_hex(hex_key: &str) -> Result<Self> {
        let cleaned: String = hex_key.chars().filter(|c| !c.is_whitespace()).collect();
        let cleaned = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
        let bytes = hex::decode(cleaned)
            .map_err(|e| Error::Encoding(format!("private key is not hex: {}", e)))?;
        Self::from_private(&bytes)
    }

    /// The 32-byte private scalar.
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    /// The SEC1 public key.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"[REDACTED]")
            .field("public_key", &hex::encode(&self.public_key))
            .finish()
    }
}

fn private_scalar(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| Error::Encoding(format!("private key must be 32 bytes, got {}", bytes.len())))
}

/// Descriptive inputs for a signing operation.
#[derive(Debug, Clone, Default)]
pub struct SignRequest {
    /// Signer name (required)
    pub author: String,
    /// Reason or title
    pub subject: String,
    /// Correlation id; a random UUID is used when absent
    pub document_id: Option<String>,
    /// Signing time; now when absent
    pub timestamp: Option<DateTime<Utc>>,
}

impl SignRequest {
    /// Start a request for `author`.
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            ..Self::default()
        }
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the correlation id.
    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    /// Fix the signing time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Reject requests missing required fields.
    pub fn validate(&self) -> Result<()> {
        if self.author.trim().is_empty() {
            return Err(Error::Validation("author is required".to_string()));
        }
        if self.document_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(Error::Validation("document id must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Where a verified record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// An embedding channel
    Channel(ChannelKind),
    /// The exhaustive string scan
    Scan,
    /// The signature registry
    Registry,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Channel(kind) => write!(f, "channel:{}", kind),
            RecordSource::Scan => f.write_str("scan"),
            RecordSource::Registry => f.write_str("registry"),
        }
    }
}

/// Signer identity available for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    /// Signer name
    pub name: Option<String>,
    /// Signer email (registry records only)
    pub email: Option<String>,
    /// Subject or reason
    pub subject: Option<String>,
    /// Correlation id
    pub document_id: Option<String>,
    /// Signing time
    pub signed_at: Option<DateTime<Utc>>,
    /// Where the record was found
    pub source: RecordSource,
}

impl SignerInfo {
    /// Identity fields of an envelope record.
    pub fn from_record(record: &SigningRecord, source: RecordSource) -> Self {
        Self {
            name: record.author.clone(),
            email: None,
            subject: record.subject.clone(),
            document_id: record.document_id.clone(),
            signed_at: record.signing_timestamp,
            source,
        }
    }
}

/// How the digest was presented to the signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    /// The 32 digest bytes signed directly
    Canonical,
    /// SHA-256 of the digest bytes
    Rehashed,
    /// SHA-256 of the lowercase hex text of the digest
    HexUtf8,
}

impl DigestEncoding {
    /// Legacy encodings, in the order they are tried.
    pub const LEGACY: [DigestEncoding; 2] = [DigestEncoding::Rehashed, DigestEncoding::HexUtf8];

    /// Stable short name.
    pub fn name(&self) -> &'static str {
        match self {
            DigestEncoding::Canonical => "canonical",
            DigestEncoding::Rehashed => "rehashed",
            DigestEncoding::HexUtf8 => "hex-utf8",
        }
    }
}

/// Terminal state of a verification, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    /// No envelope and no registry record
    MissingMetadata,
    /// Envelope without signature or public key
    MissingSignature,
    /// Signature does not verify
    InvalidSignature,
    /// Signature verifies but the bytes changed since signing
    ValidButModified,
    /// Signature verifies and the bytes are unchanged
    Success,
    /// The pipeline failed
    Error,
}

impl VerificationState {
    /// Stable snake_case name.
    pub fn name(&self) -> &'static str {
        match self {
            VerificationState::MissingMetadata => "missing_metadata",
            VerificationState::MissingSignature => "missing_signature",
            VerificationState::InvalidSignature => "invalid_signature",
            VerificationState::ValidButModified => "valid_but_modified",
            VerificationState::Success => "success",
            VerificationState::Error => "error",
        }
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of verifying a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// Nothing to verify against
    MissingMetadata {
        /// Digest of the bytes presented
        uploaded_hash: Digest,
    },
    /// An envelope exists but lacks its signature or public key
    MissingSignature {
        /// Identity from the envelope
        signer: SignerInfo,
        /// Digest of the bytes presented
        uploaded_hash: Digest,
    },
    /// The signature does not verify under the embedded key
    InvalidSignature {
        /// Identity from the envelope, for diagnostics only
        signer: SignerInfo,
        /// Digest the signature was checked against
        expected_hash: Digest,
        /// Digest of the bytes presented
        uploaded_hash: Digest,
    },
    /// Authentic signature over different bytes
    ValidButModified {
        /// Verified signer identity
        signer: SignerInfo,
        /// Digest recorded at signing time
        expected_hash: Digest,
        /// Digest of the bytes presented
        uploaded_hash: Digest,
        /// Digest encoding that verified
        encoding: DigestEncoding,
    },
    /// Authentic signature over these bytes
    Success {
        /// Verified signer identity
        signer: SignerInfo,
        /// Digest the signature covers
        document_hash: Digest,
        /// Digest encoding that verified
        encoding: DigestEncoding,
    },
    /// The pipeline failed before a classification was possible
    Error {
        /// What went wrong
        message: String,
    },
}

impl VerificationResult {
    /// The state, without payload.
    pub fn state(&self) -> VerificationState {
        match self {
            VerificationResult::MissingMetadata { .. } => VerificationState::MissingMetadata,
            VerificationResult::MissingSignature { .. } => VerificationState::MissingSignature,
            VerificationResult::InvalidSignature { .. } => VerificationState::InvalidSignature,
            VerificationResult::ValidButModified { .. } => VerificationState::ValidButModified,
            VerificationResult::Success { .. } => VerificationState::Success,
            VerificationResult::Error { .. } => VerificationState::Error,
        }
    }

    /// Whether the document verified unchanged.
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success { .. })
    }

    /// Signer identity, when the state carries one.
    pub fn signer(&self) -> Option<&SignerInfo> {
        match self {
            VerificationResult::MissingSignature { signer, .. }
            | VerificationResult::InvalidSignature { signer, .. }
            | VerificationResult::ValidButModified { signer, .. }
            | VerificationResult::Success { signer, .. } => Some(signer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SigningRecord {
        SigningRecord {
            signature: Some(vec![0xAB; 64]),
            public_key: Some(vec![0x04; 65]),
            document_hash: Some(Digest::from_bytes([7; 32])),
            signing_timestamp: DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            author: Some("Ada".to_string()),
            subject: Some("Approval".to_string()),
            document_id: Some("doc-1".to_string()),
            format_version: FORMAT_VERSION.to_string(),
        }
    }

    #[test]
    fn test_digest_display_and_parse() {
        let digest = Digest::from_bytes([0xAB; 32]);
        let hex = digest.to_string();
        assert_eq!(hex, "ab".repeat(32));
        assert_eq!(hex.parse::<Digest>().unwrap(), digest);
        assert_eq!(format!("  0x{}  ", hex.to_uppercase()).parse::<Digest>().unwrap(), digest);
        assert!("abcd".parse::<Digest>().is_err());
        assert!("zz".repeat(32).parse::<Digest>().is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let json = sample_record().to_json().unwrap();
        for key in [
            "\"signature\"",
            "\"publicKey\"",
            "\"documentHash\"",
            "\"signingDate\":\"2024-03-01T12:00:00Z\"",
            "\"author\"",
            "\"subject\"",
            "\"id\":\"doc-1\"",
            "\"formatVersion\":\"1.0\"",
        ] {
            assert!(json.contains(key), "missing {} in {}", key, json);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample_record();
        assert_eq!(SigningRecord::from_json(&record.to_json().unwrap()).unwrap(), record);
    }

    #[test]
    fn test_binary_fields_accept_base64_and_prefix() {
        let b64 = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 250]);
        assert_eq!(decode_binary_field("signature", &b64).unwrap(), vec![1, 2, 250]);
        assert_eq!(decode_binary_field("signature", "0x0102").unwrap(), vec![1, 2]);
        assert!(decode_binary_field("signature", "not*valid").is_err());
    }

    #[test]
    fn test_undecodable_hash_is_encoding_error() {
        let wire = EnvelopeWire {
            document_hash: Some("0102".to_string()),
            ..EnvelopeWire::default()
        };
        assert!(matches!(SigningRecord::from_wire(&wire), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_lenient_wire_values() {
        let wire: EnvelopeWire =
            serde_json::from_str(r#"{"id": 42, "author": null, "subject": {"a": 1}, "extra": true}"#)
                .unwrap();
        assert_eq!(wire.id.as_deref(), Some("42"));
        assert!(wire.author.is_none());
        assert!(wire.subject.is_none());
        assert!(!wire.has_signature_field());
    }

    #[test]
    fn test_has_signature_requires_both_halves() {
        let mut record = sample_record();
        assert!(record.has_signature());
        record.public_key = None;
        assert!(!record.has_signature());
        record.public_key = Some(vec![4]);
        record.signature = Some(Vec::new());
        assert!(!record.has_signature());
    }

    #[test]
    fn test_sign_request_validation() {
        assert!(SignRequest::new("Ada").validate().is_ok());
        assert!(matches!(SignRequest::new("  ").validate(), Err(Error::Validation(_))));
        assert!(SignRequest::new("Ada").with_document_id(" ").validate().is_err());
    }

    #[test]
    fn test_key_pair_debug_redacts() {
        let pair = KeyPair::from_private(&[0x11; 32]).unwrap();
        let debug = format!("{:?}", pair);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&hex::encode([0x11u8; 32])));
    }

    #[test]
    fn test_key_pair_mismatch_rejected() {
        let other = KeyPair::from_private(&[0x22; 32]).unwrap();
        assert!(matches!(
            KeyPair::new(&[0x11; 32], other.public_key()),
            Err(Error::Validation(_))
        ));
        let own = KeyPair::from_private(&[0x11; 32]).unwrap();
        assert!(KeyPair::new(&[0x11; 32], own.public_key()).is_ok());
    }

    #[test]
    fn test_state_names() {
        let result = VerificationResult::MissingMetadata {
            uploaded_hash: Digest::from_bytes([0; 32]),
        };
        assert_eq!(result.state().name(), "missing_metadata");
        assert!(result.signer().is_none());
        assert!(!result.is_success());
    }
}
