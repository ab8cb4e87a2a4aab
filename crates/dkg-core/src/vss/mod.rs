//! Verifiable Secret Sharing
//!
//! Pedersen-blinded Feldman VSS with a complaint/justification round:
//!
//! 1. The [`Dealer`] commits to a sharing polynomial `f` (over `G`) and a
//!    blinding polynomial `g` (over `H`), then sends every participant an
//!    [`EncryptedDeal`] carrying `f(i)` and `g(i)`.
//! 2. Each [`Verifier`] decrypts its deal, checks it against the commitments
//!    and broadcasts a signed [`Response`].
//! 3. A complaint makes the dealer publish a [`Justification`] revealing the
//!    contested deal. The [`Aggregator`] of every participant re-checks it and
//!    decides whether the dealer's session is certified.

mod aggregator;
mod dealer;
mod encryption;
mod verifier;

pub use aggregator::Aggregator;
pub use dealer::{Dealer, DealerOptions};
pub use verifier::Verifier;

use crate::algebra::Suite;
use crate::poly::{PriShare, PublicPoly};
use crate::{identity, Error, LongTermKey, Result, SessionId};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

const SESSION_DOMAIN: &[u8] = b"dkg-core/vss/session/v1";
const DEAL_DOMAIN: &[u8] = b"dkg-core/vss/deal/v1";
const ENCRYPTED_DEAL_DOMAIN: &[u8] = b"dkg-core/vss/encrypted-deal/v1";
const RESPONSE_DOMAIN: &[u8] = b"dkg-core/vss/response/v1";
const JUSTIFICATION_DOMAIN: &[u8] = b"dkg-core/vss/justification/v1";

/// Encoded dealer commitments, published with every deal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitments {
    /// Feldman commitment to `f` over the group generator
    pub secret: Vec<Vec<u8>>,
    /// Commitment to `g` over the Pedersen base
    pub blinding: Vec<Vec<u8>>,
}

/// Cleartext share of one dealer for one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Deal {
    pub session_id: SessionId,
    /// Recipient index
    pub index: u32,
    /// `f(index + 1)`
    pub sec_share: Vec<u8>,
    /// `g(index + 1)`
    pub rnd_share: Vec<u8>,
    /// Dealer signature
    pub signature: Vec<u8>,
}

impl Deal {
    pub(crate) fn signing_bytes(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(DEAL_DOMAIN.len() + 32 + 4 + 2 * 36);
        msg.extend_from_slice(DEAL_DOMAIN);
        msg.extend_from_slice(&self.session_id);
        msg.extend_from_slice(&self.index.to_be_bytes());
        put_bytes(&mut msg, &self.sec_share);
        put_bytes(&mut msg, &self.rnd_share);
        msg
    }
}

/// A [`Deal`] encrypted for its recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDeal {
    pub commitments: Commitments,
    /// Dealer's ephemeral X25519 public key
    pub dh_key: [u8; 32],
    /// Dealer signature over the session and `dh_key`
    pub signature: Vec<u8>,
    /// ChaCha20-Poly1305 ciphertext with tag
    pub cipher: Vec<u8>,
}

impl EncryptedDeal {
    pub(crate) fn signing_bytes(session_id: &SessionId, dh_key: &[u8; 32]) -> Vec<u8> {
        let mut msg = Vec::with_capacity(ENCRYPTED_DEAL_DOMAIN.len() + 64);
        msg.extend_from_slice(ENCRYPTED_DEAL_DOMAIN);
        msg.extend_from_slice(session_id);
        msg.extend_from_slice(dh_key);
        msg
    }
}

/// Verdict of a verifier on its deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Approval,
    Complaint,
}

/// Signed verdict, broadcast to every participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub session_id: SessionId,
    /// Verifier index
    pub index: u32,
    pub status: Status,
    pub signature: Vec<u8>,
}

impl Response {
    pub(crate) fn new(
        long_term: &LongTermKey,
        session_id: SessionId,
        index: u32,
        status: Status,
    ) -> Self {
        let mut response = Self {
            session_id,
            index,
            status,
            signature: Vec::new(),
        };
        response.signature = long_term.sign(&response.signing_bytes());
        response
    }

    pub(crate) fn signing_bytes(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(RESPONSE_DOMAIN.len() + 32 + 5);
        msg.extend_from_slice(RESPONSE_DOMAIN);
        msg.extend_from_slice(&self.session_id);
        msg.extend_from_slice(&self.index.to_be_bytes());
        msg.push(match self.status {
            Status::Approval => 1,
            Status::Complaint => 0,
        });
        msg
    }

    pub fn is_approval(&self) -> bool {
        self.status == Status::Approval
    }
}

/// Dealer's answer to a complaint: the contested deal in the clear
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    pub session_id: SessionId,
    /// Index of the complaining verifier
    pub index: u32,
    pub deal: Deal,
    pub signature: Vec<u8>,
}

impl Justification {
    pub(crate) fn new(long_term: &LongTermKey, deal: Deal) -> Self {
        let mut justification = Self {
            session_id: deal.session_id,
            index: deal.index,
            deal,
            signature: Vec::new(),
        };
        justification.signature = long_term.sign(&justification.signing_bytes());
        justification
    }

    pub(crate) fn signing_bytes(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(JUSTIFICATION_DOMAIN.len() + 128);
        msg.extend_from_slice(JUSTIFICATION_DOMAIN);
        msg.extend_from_slice(&self.session_id);
        msg.extend_from_slice(&self.index.to_be_bytes());
        put_bytes(&mut msg, &self.deal.signing_bytes());
        put_bytes(&mut msg, &self.deal.signature);
        msg
    }
}

fn put_bytes(msg: &mut Vec<u8>, bytes: &[u8]) {
    msg.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    msg.extend_from_slice(bytes);
}

pub(crate) fn ids_match(a: &SessionId, b: &SessionId) -> bool {
    a.ct_eq(b).into()
}

/// Digest binding a dealer, the ordered participants and the commitments.
pub fn session_id<S: Suite>(
    dealer_key: &VerifyingKey,
    participants: &[VerifyingKey],
    secret: &PublicPoly<S>,
    blinding: &PublicPoly<S>,
) -> SessionId {
    let mut hasher = Sha256::new();
    hasher.update(SESSION_DOMAIN);
    hasher.update(S::NAME.as_bytes());
    hasher.update(dealer_key.as_bytes());
    hasher.update((participants.len() as u32).to_be_bytes());
    for key in participants {
        hasher.update(key.as_bytes());
    }
    hasher.update((secret.threshold() as u32).to_be_bytes());
    for commit in secret.encode().iter().chain(blinding.encode().iter()) {
        hasher.update(commit);
    }
    hasher.finalize().into()
}

/// Decoded commitments of one dealer plus the derived session identifier
#[derive(Debug, Clone)]
pub(crate) struct Session<S: Suite> {
    pub id: SessionId,
    pub threshold: usize,
    pub secret: PublicPoly<S>,
    pub blinding: PublicPoly<S>,
    pub blinding_base: S::Point,
}

impl<S: Suite> Session<S> {
    pub fn new(
        dealer_key: &VerifyingKey,
        participants: &[VerifyingKey],
        secret: PublicPoly<S>,
        blinding: PublicPoly<S>,
        blinding_base: S::Point,
    ) -> Result<Self> {
        if secret.threshold() != blinding.threshold() {
            return Err(Error::Malformed(format!(
                "commitment lengths differ: {} vs {}",
                secret.threshold(),
                blinding.threshold()
            )));
        }
        let threshold = secret.threshold();
        crate::error::check_threshold(threshold, participants.len())?;
        Ok(Self {
            id: session_id(dealer_key, participants, &secret, &blinding),
            threshold,
            secret,
            blinding,
            blinding_base,
        })
    }

    pub fn decode(
        dealer_key: &VerifyingKey,
        participants: &[VerifyingKey],
        commitments: &Commitments,
    ) -> Result<Self> {
        Self::new(
            dealer_key,
            participants,
            PublicPoly::decode(&commitments.secret)?,
            PublicPoly::decode(&commitments.blinding)?,
            S::blinding_base()?,
        )
    }

    /// Full check of a deal against this session. Share mismatches surface
    /// as [`Error::DealVerificationFailed`]; everything else is structural.
    pub fn verify_deal(
        &self,
        dealer_key: &VerifyingKey,
        n_parties: usize,
        deal: &Deal,
    ) -> Result<PriShare<S>> {
        if deal.index as usize >= n_parties {
            return Err(Error::UnknownSender(deal.index));
        }
        if !ids_match(&deal.session_id, &self.id) {
            return Err(Error::SessionMismatch);
        }
        identity::verify(dealer_key, &deal.signing_bytes(), &deal.signature)?;

        let sec = S::decode_scalar(&deal.sec_share)
            .map_err(|e| Error::DealVerificationFailed(format!("secret share: {e}")))?;
        let rnd = S::decode_scalar(&deal.rnd_share)
            .map_err(|e| Error::DealVerificationFailed(format!("blinding share: {e}")))?;

        let sec_share = PriShare {
            index: deal.index,
            value: sec,
        };
        let rnd_share = PriShare {
            index: deal.index,
            value: rnd,
        };
        if !self.secret.check(&S::base(), &sec_share) {
            return Err(Error::DealVerificationFailed(format!(
                "secret share for index {} does not match commitment",
                deal.index
            )));
        }
        if !self.blinding.check(&self.blinding_base, &rnd_share) {
            return Err(Error::DealVerificationFailed(format!(
                "blinding share for index {} does not match commitment",
                deal.index
            )));
        }
        Ok(sec_share)
    }
}
