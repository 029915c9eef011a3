//! Signing identities.

use crate::error::{ProtocolError, ProtocolResult};
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::path::Path;
use zeroize::Zeroizing;

/// Size of an ed25519 secret seed in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Number of hex characters kept when deriving short identifiers.
const IDENTIFIER_HEX_LEN: usize = 16;

/// Something that can sign transactions and messages on behalf of a
/// client.
pub trait Signer {
    /// Short identifier of the signer, derived from its public key.
    fn identifier(&self) -> String;

    /// Hex-encoded public key.
    fn public_key(&self) -> String;

    /// Signs `message`, returning the hex-encoded signature.
    fn sign(&self, message: &[u8]) -> String;
}

/// Returns the first 16 hex characters of SHA-256 over `bytes`.
pub fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut encoded = hex::encode(digest);
    encoded.truncate(IDENTIFIER_HEX_LEN);
    encoded
}

/// Derives the identifier belonging to a hex-encoded public key.
pub fn identifier_for(public_key_hex: &str) -> ProtocolResult<String> {
    let bytes = hex::decode(public_key_hex)
        .map_err(|e| ProtocolError::Signature(format!("bad public key encoding: {e}")))?;
    Ok(short_digest(&bytes))
}

/// Verifies a hex-encoded ed25519 signature.
pub fn verify_signature(public_key_hex: &str, message: &[u8], signature_hex: &str) -> ProtocolResult<()> {
    let key_bytes: [u8; 32] = hex::decode(public_key_hex)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ProtocolError::Signature("public key must be 32 hex-encoded bytes".into()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| ProtocolError::Signature(format!("bad public key: {e}")))?;

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| ProtocolError::Signature(format!("bad signature encoding: {e}")))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| ProtocolError::Signature(format!("bad signature: {e}")))?;

    key.verify(message, &signature)
        .map_err(|_| ProtocolError::Signature("signature does not verify".into()))
}

/// An ed25519 signing identity.
///
/// The secret key is zeroized when dropped.
#[derive(Clone)]
pub struct SigningIdentity {
    key: SigningKey,
}

impl SigningIdentity {
    /// Generates a new random identity.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates an identity from a 32-byte secret seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
        let seed: [u8; SECRET_KEY_SIZE] = bytes.try_into().map_err(|_| {
            ProtocolError::KeyLoad(format!(
                "expected {SECRET_KEY_SIZE} key bytes, got {}",
                bytes.len()
            ))
        })?;
        let seed = Zeroizing::new(seed);
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// Creates an identity from a hex-encoded secret seed.
    ///
    /// Surrounding whitespace is ignored.
    pub fn from_hex(encoded: &str) -> ProtocolResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim()).map_err(|e| ProtocolError::KeyLoad(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Reads a hex-encoded secret seed from a file.
    pub fn from_file(path: impl AsRef<Path>) -> ProtocolResult<Self> {
        let path = path.as_ref();
        let contents = Zeroizing::new(
            std::fs::read_to_string(path)
                .map_err(|e| ProtocolError::KeyLoad(format!("{}: {e}", path.display())))?,
        );
        Self::from_hex(&contents)
    }

    /// Returns the hex-encoded secret seed.
    ///
    /// Be careful with this method - don't log the result.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.key.to_bytes()))
    }
}

impl Signer for SigningIdentity {
    fn identifier(&self) -> String {
        short_digest(self.key.verifying_key().as_bytes())
    }

    fn public_key(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }

    fn sign(&self, message: &[u8]) -> String {
        use ed25519_dalek::Signer as _;
        hex::encode(self.key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("identifier", &self.identifier())
            .field("key", &"[REDACTED]")
            .finish()
    }
}
