//! Deal transport encryption
//!
//! Ephemeral-static X25519 against the recipient's long-term key, key
//! derived with BLAKE3 over the shared secret and the session, then
//! ChaCha20-Poly1305 with the session identifier as associated data. Every
//! deal uses a fresh ephemeral key, so the nonce is constant.

use crate::identity::{self, LongTermKey};
use crate::{Error, Result, SessionId};
use aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::VerifyingKey;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret};
use zeroize::Zeroizing;

/// Poly1305 tag length
pub(crate) const TAG_LEN: usize = 16;

const KDF_CONTEXT: &str = "dkg-core 2024-06-01 vss deal encryption";
const NONCE: [u8; 12] = [0u8; 12];

fn derive_key(
    shared: &SharedSecret,
    dh_key: &[u8; 32],
    recipient: &VerifyingKey,
    session_id: &SessionId,
) -> Zeroizing<[u8; 32]> {
    let mut material = Zeroizing::new(Vec::with_capacity(128));
    material.extend_from_slice(shared.as_bytes());
    material.extend_from_slice(dh_key);
    material.extend_from_slice(recipient.as_bytes());
    material.extend_from_slice(session_id);
    Zeroizing::new(blake3::derive_key(KDF_CONTEXT, &material))
}

/// Encrypt `plaintext` for `recipient` under a single-use `ephemeral` key.
/// Returns the ephemeral public key and the ciphertext.
pub(crate) fn seal(
    ephemeral: EphemeralSecret,
    recipient: &VerifyingKey,
    session_id: &SessionId,
    plaintext: &[u8],
) -> Result<([u8; 32], Vec<u8>)> {
    let dh_key = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&identity::exchange_public(recipient));
    if !shared.was_contributory() {
        return Err(Error::Crypto("non-contributory key exchange".into()));
    }

    let key = derive_key(&shared, &dh_key, recipient, session_id);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]))
        .encrypt(
            Nonce::from_slice(&NONCE),
            Payload {
                msg: plaintext,
                aad: session_id,
            },
        )
        .map_err(|e| Error::Crypto(format!("deal encryption: {e}")))?;
    Ok((dh_key, cipher))
}

/// Decrypt a deal addressed to `recipient`.
///
/// `Ok(None)` means the ciphertext failed authentication. Ciphertexts too
/// short to carry a tag and degenerate exchange keys are hard errors.
pub(crate) fn open(
    recipient: &LongTermKey,
    dh_key: &[u8; 32],
    session_id: &SessionId,
    cipher: &[u8],
) -> Result<Option<Zeroizing<Vec<u8>>>> {
    if cipher.len() < TAG_LEN {
        return Err(Error::Malformed(format!(
            "ciphertext of {} bytes is shorter than the tag",
            cipher.len()
        )));
    }

    let shared = recipient
        .exchange_secret()
        .diffie_hellman(&PublicKey::from(*dh_key));
    if !shared.was_contributory() {
        return Err(Error::Malformed("non-contributory exchange key".into()));
    }

    let key = derive_key(&shared, dh_key, &recipient.public_key(), session_id);
    let plaintext = ChaCha20Poly1305::new(Key::from_slice(&key[..])).decrypt(
        Nonce::from_slice(&NONCE),
        Payload {
            msg: cipher,
            aad: session_id,
        },
    );
    Ok(plaintext.ok().map(Zeroizing::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn ephemeral() -> EphemeralSecret {
        EphemeralSecret::random_from_rng(OsRng)
    }

    #[test]
    fn test_seal_open() {
        let recipient = LongTermKey::generate(&mut OsRng);
        let session_id = [3u8; 32];

        let (dh_key, cipher) = seal(ephemeral(), &recipient.public_key(), &session_id, b"share").unwrap();
        assert_eq!(cipher.len(), 5 + TAG_LEN);

        let plain = open(&recipient, &dh_key, &session_id, &cipher).unwrap().unwrap();
        assert_eq!(plain.as_slice(), b"share");
    }

    #[test]
    fn test_open_rejects_tampering() {
        let recipient = LongTermKey::generate(&mut OsRng);
        let other = LongTermKey::generate(&mut OsRng);
        let session_id = [5u8; 32];
        let (dh_key, cipher) = seal(ephemeral(), &recipient.public_key(), &session_id, b"share").unwrap();

        for bit in [0usize, 7, 13, 8 * cipher.len() - 1] {
            let mut flipped = cipher.clone();
            flipped[bit / 8] ^= 1 << (bit % 8);
            assert!(open(&recipient, &dh_key, &session_id, &flipped).unwrap().is_none());
        }

        assert!(open(&other, &dh_key, &session_id, &cipher).unwrap().is_none());
        assert!(open(&recipient, &dh_key, &[6u8; 32], &cipher).unwrap().is_none());
        assert!(matches!(
            open(&recipient, &dh_key, &session_id, &cipher[..TAG_LEN - 1]),
            Err(Error::Malformed(_))
        ));
    }
}
