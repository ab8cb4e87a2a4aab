//! DKG round messages

use crate::dkg::{DistJustification, DistResponse};
use crate::PartyId;
use serde::{Deserialize, Serialize};

/// Round 1: encrypted deals, sent point-to-point as [`crate::dkg::DistDeal`]
pub const ROUND_DEALS: u32 = 1;

/// Round 2: every party's responses, broadcast
pub const ROUND_RESPONSES: u32 = 2;

/// Round 3: justifications for complaints, broadcast
pub const ROUND_JUSTIFICATIONS: u32 = 3;

/// Round 2 message: one response per deal the sender processed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseBatch {
    /// Sender party ID
    pub party_id: PartyId,
    pub responses: Vec<DistResponse>,
}

/// Round 3 message: the sender's answers to complaints against its own
/// deals. Sent even when empty so collectors can count on `n` batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JustificationBatch {
    /// Sender party ID
    pub party_id: PartyId,
    pub justifications: Vec<DistJustification>,
}
