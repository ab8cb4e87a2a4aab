//! Long-term participant identities
//!
//! Each participant holds one Ed25519 key. It signs protocol messages and,
//! through its birationally equivalent X25519 form, serves as the static side
//! of the key exchange used to encrypt deals.

use crate::{Error, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::CryptoRngCore;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

/// A participant's long-term key pair
#[derive(Clone)]
pub struct LongTermKey {
    signing: SigningKey,
}

impl std::fmt::Debug for LongTermKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongTermKey")
            .field("public", &hex::encode(self.public_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

impl LongTermKey {
    /// Generate a fresh key
    pub fn generate<R: CryptoRngCore + ?Sized>(rng: &mut R) -> Self {
        Self {
            signing: SigningKey::generate(rng),
        }
    }

    /// Restore from a 32-byte seed
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// The 32-byte seed
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }

    /// X25519 form of the signing key
    pub(crate) fn exchange_secret(&self) -> StaticSecret {
        let bytes = Zeroizing::new(self.signing.to_scalar_bytes());
        StaticSecret::from(*bytes)
    }
}

/// X25519 form of a participant's public key
pub(crate) fn exchange_public(key: &VerifyingKey) -> x25519_dalek::PublicKey {
    x25519_dalek::PublicKey::from(key.to_montgomery().to_bytes())
}

/// Verify `signature` over `message` under `key`
pub fn verify(key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let signature = Signature::from_slice(signature).map_err(|_| Error::InvalidSignature)?;
    key.verify_strict(message, &signature)
        .map_err(|_| Error::InvalidSignature)
}

/// Position of `key` in the participant list
pub fn index_of(participants: &[VerifyingKey], key: &VerifyingKey) -> Option<u32> {
    participants
        .iter()
        .position(|p| p == key)
        .map(|i| i as u32)
}

/// Decode a hex-encoded participant public key
pub fn public_key_from_hex(encoded: &str) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = hex::decode(encoded)
        .map_err(|e| Error::Deserialization(e.to_string()))?
        .try_into()
        .map_err(|_| Error::Deserialization("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| Error::Deserialization(e.to_string()))
}
