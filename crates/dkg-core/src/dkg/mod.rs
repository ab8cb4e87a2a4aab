//! Distributed Key Generation
//!
//! Every participant runs one VSS session as dealer and one verifier per
//! dealer. Dealers whose session certifies form the qualified set; the
//! joint key is the sum of their secrets, and each participant's key share
//! is the sum of the shares it received from them.

mod generator;

pub use generator::{DistKeyGenerator, DkgOptions};

use crate::algebra::Suite;
use crate::poly::{PriShare, PubShare, PublicPoly};
use crate::types::KeyShareFile;
use crate::vss::{EncryptedDeal, Justification, Response};
use crate::{identity, Error, PartyId, Result};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

/// Encrypted deal of one dealer, addressed to one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistDeal {
    /// Dealer index
    pub dealer: u32,
    pub deal: EncryptedDeal,
}

/// A verifier's response on one dealer's session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistResponse {
    /// Dealer index
    pub dealer: u32,
    pub response: Response,
}

/// A dealer's justification for a complaint against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistJustification {
    /// Dealer index
    pub dealer: u32,
    pub justification: Justification,
}

/// Output of a successful DKG round for one participant.
#[derive(Clone, PartialEq, Eq)]
pub struct DistKeyShare<S: Suite> {
    /// Private key share, evaluated at `share.index + 1`
    pub share: PriShare<S>,
    /// Commitment to the joint polynomial; its constant term is the public key
    pub commits: PublicPoly<S>,
    /// Qualified dealer indices, ascending
    pub qualified: Vec<u32>,
}

impl<S: Suite> std::fmt::Debug for DistKeyShare<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistKeyShare")
            .field("index", &self.share.index)
            .field("threshold", &self.threshold())
            .field("public_key", &hex::encode(S::encode_point(&self.public_key())))
            .field("qualified", &self.qualified)
            .finish_non_exhaustive()
    }
}

impl<S: Suite> DistKeyShare<S> {
    pub fn index(&self) -> u32 {
        self.share.index
    }

    pub fn threshold(&self) -> usize {
        self.commits.threshold()
    }

    /// Joint public key
    pub fn public_key(&self) -> S::Point {
        self.commits.commit()
    }

    /// Public image of participant `index`'s share
    pub fn public_share(&self, index: u32) -> PubShare<S> {
        self.commits.eval(index)
    }

    /// Check the private share against the joint commitment
    pub fn verify(&self) -> bool {
        self.commits.check(&S::base(), &self.share)
    }

    /// Persistable form, hex encoded
    pub fn to_file(&self, participants: &[VerifyingKey]) -> KeyShareFile {
        KeyShareFile {
            suite: S::NAME.to_string(),
            party_id: self.share.index as PartyId,
            threshold: self.threshold(),
            private_share: hex::encode(S::encode_scalar(&self.share.value)),
            commitments: self.commits.encode().iter().map(hex::encode).collect(),
            qualified: self.qualified.clone(),
            participants: participants.iter().map(|k| hex::encode(k.as_bytes())).collect(),
        }
    }

    /// Load and check a persisted share
    pub fn from_file(file: &KeyShareFile) -> Result<Self> {
        if file.suite != S::NAME {
            return Err(Error::InvalidConfig(format!(
                "key share for suite {}, expected {}",
                file.suite,
                S::NAME
            )));
        }
        let value = S::decode_scalar(&decode_hex(&file.private_share)?)?;
        let commits = file
            .commitments
            .iter()
            .map(|c| decode_hex(c))
            .collect::<Result<Vec<_>>>()?;
        let key_share = Self {
            share: PriShare {
                index: file.party_id as u32,
                value,
            },
            commits: PublicPoly::decode(&commits)?,
            qualified: file.qualified.clone(),
        };

        if key_share.threshold() != file.threshold {
            return Err(Error::Malformed(format!(
                "{} commitments for threshold {}",
                key_share.threshold(),
                file.threshold
            )));
        }
        if !key_share.verify() {
            return Err(Error::Malformed(
                "private share does not match commitments".into(),
            ));
        }
        Ok(key_share)
    }
}

/// Participant keys recorded in a persisted share
pub fn participants_from_file(file: &KeyShareFile) -> Result<Vec<VerifyingKey>> {
    file.participants
        .iter()
        .map(|k| identity::public_key_from_hex(k))
        .collect()
}

fn decode_hex(encoded: &str) -> Result<Vec<u8>> {
    hex::decode(encoded).map_err(|e| Error::Deserialization(e.to_string()))
}
