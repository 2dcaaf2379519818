//! ECDSA P-256 signing and verification over document digests.
//!
//! Signatures are produced over the digest itself (a prehash, no second
//! hashing) and emitted as fixed 64-byte `r || s`. Verification also accepts
//! DER signatures and, when allowed, digests signed in one of the legacy
//! encodings listed in [`DigestEncoding`].

use super::types::{Digest, DigestEncoding};
use crate::config::LegacyDigestPolicy;
use crate::error::{Error, Result};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest as _, Sha256};

/// A structurally valid SEC1 P-256 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse SEC1 bytes.
    ///
    /// Accepts 65 bytes starting with `0x04` or 33 bytes starting with
    /// `0x02`/`0x03`, and the point must lie on the curve.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        match (bytes.len(), bytes.first()) {
            (65, Some(0x04)) | (33, Some(0x02 | 0x03)) => {},
            (len, prefix) => {
                return Err(Error::Encoding(format!(
                    "public key must be 65 bytes with prefix 04 or 33 bytes with prefix 02/03, got {} bytes with prefix {:02x}",
                    len,
                    prefix.copied().unwrap_or(0)
                )))
            },
        }
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| Error::Encoding("public key is not a point on P-256".to_string()))
    }

    /// SEC1 encoding.
    pub fn to_sec1(&self, compressed: bool) -> Vec<u8> {
        self.0.to_encoded_point(compressed).as_bytes().to_vec()
    }
}

/// Derive the uncompressed SEC1 public key for a 32-byte private scalar.
pub fn public_key_from_private(private_key: &[u8]) -> Result<Vec<u8>> {
    let key = signing_key(private_key)?;
    Ok(PublicKey(*key.verifying_key()).to_sec1(false))
}

fn signing_key(private_key: &[u8]) -> Result<SigningKey> {
    if private_key.len() != 32 {
        return Err(Error::Encoding(format!(
            "private key must be 32 bytes, got {}",
            private_key.len()
        )));
    }
    SigningKey::from_slice(private_key)
        .map_err(|_| Error::Encoding("private key is not a valid P-256 scalar".to_string()))
}

fn parse_signature(bytes: &[u8]) -> Option<Signature> {
    if bytes.len() == 64 {
        Signature::from_slice(bytes).ok()
    } else {
        Signature::from_der(bytes).ok()
    }
}

/// The value handed to the curve for a given digest encoding.
fn prehash(digest: &Digest, encoding: DigestEncoding) -> [u8; 32] {
    match encoding {
        DigestEncoding::Canonical => *digest.as_bytes(),
        DigestEncoding::Rehashed => Sha256::digest(digest.as_bytes()).into(),
        DigestEncoding::HexUtf8 => Sha256::digest(digest.to_hex().as_bytes()).into(),
    }
}

/// ECDSA P-256 signature engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine {
    legacy: LegacyDigestPolicy,
}

impl SignatureEngine {
    /// Scheme identifier; curve and hash are versioned together.
    pub const SCHEME: &'static str = "ecdsa-p256-sha256";

    /// Create an engine with the given legacy digest policy.
    pub fn new(legacy: LegacyDigestPolicy) -> Self {
        Self { legacy }
    }

    /// Sign `digest` with the canonical encoding.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if the private key is malformed.
    pub fn sign(digest: &Digest, private_key: &[u8]) -> Result<Vec<u8>> {
        Self::sign_encoded(digest, private_key, DigestEncoding::Canonical)
    }

    /// Sign `digest` presented in a specific encoding.
    pub fn sign_encoded(digest: &Digest, private_key: &[u8], encoding: DigestEncoding) -> Result<Vec<u8>> {
        let key = signing_key(private_key)?;
        let signature: Signature = key
            .sign_prehash(&prehash(digest, encoding))
            .map_err(|e| Error::Encoding(format!("signing failed: {}", e)))?;
        Ok(signature.to_bytes().to_vec())
    }

    /// Verify a canonical signature. Malformed input verifies as `false`.
    pub fn verify(signature: &[u8], digest: &Digest, public_key: &[u8]) -> bool {
        Self::verify_encoded(signature, digest, public_key, DigestEncoding::Canonical)
    }

    /// Verify a signature over `digest` presented in `encoding`.
    pub fn verify_encoded(
        signature: &[u8],
        digest: &Digest,
        public_key: &[u8],
        encoding: DigestEncoding,
    ) -> bool {
        let Ok(key) = PublicKey::parse(public_key) else {
            log::debug!("Rejecting malformed public key ({} bytes)", public_key.len());
            return false;
        };
        let Some(signature) = parse_signature(signature) else {
            log::debug!("Rejecting malformed signature ({} bytes)", signature.len());
            return false;
        };
        key.0
            .verify_prehash(&prehash(digest, encoding), &signature)
            .is_ok()
    }

    /// Try the canonical encoding, then the legacy ones if the policy allows.
    ///
    /// Returns the encoding that verified.
    pub fn verify_any(&self, signature: &[u8], digest: &Digest, public_key: &[u8]) -> Option<DigestEncoding> {
        if Self::verify(signature, digest, public_key) {
            return Some(DigestEncoding::Canonical);
        }
        if self.legacy == LegacyDigestPolicy::Reject {
            return None;
        }
        DigestEncoding::LEGACY.into_iter().find(|&encoding| {
            let ok = Self::verify_encoded(signature, digest, public_key, encoding);
            if ok {
                log::info!("Signature verified with legacy digest encoding {}", encoding.name());
            }
            ok
        })
    }
}
