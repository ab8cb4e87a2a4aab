//! secp256k1 suite backed by `k256`

use super::{NoG2, NoGT, Suite};
use crate::{Error, Result};
use k256::{
    elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest},
    ProjectivePoint, Scalar,
};
use sha2::Sha256;

const BLINDING_DST: &[u8] = b"DKG-CORE-V1-SECP256K1_XMD:SHA-256_SSWU_RO_PEDERSEN";
const BLINDING_SEED: &[u8] = b"pedersen blinding base";

/// secp256k1 (no pairing)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Secp256k1;

impl Suite for Secp256k1 {
    type Scalar = Scalar;
    type Point = ProjectivePoint;
    type G2 = NoG2;
    type GT = NoGT;

    const NAME: &'static str = "secp256k1";

    fn blinding_base() -> Result<ProjectivePoint> {
        k256::Secp256k1::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[BLINDING_SEED], &[BLINDING_DST])
            .map_err(|e| Error::Crypto(format!("hash to curve: {e}")))
    }
}
