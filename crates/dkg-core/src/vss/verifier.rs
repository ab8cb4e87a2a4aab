//! VSS verifier

use super::{
    encryption, ids_match, Aggregator, Deal, EncryptedDeal, Justification, Response, Session,
    Status,
};
use crate::algebra::Suite;
use crate::poly::PriShare;
use crate::{identity, Error, LongTermKey, Result};
use ed25519_dalek::VerifyingKey;
use tracing::{debug, warn};

/// Checks the deal a dealer sent to this participant and tracks every
/// verifier's verdict on that dealer.
#[derive(Debug)]
pub struct Verifier<S: Suite> {
    long_term: LongTermKey,
    index: u32,
    dealer_key: VerifyingKey,
    participants: Vec<VerifyingKey>,
    aggregator: Aggregator<S>,
    deal: Option<Deal>,
    share: Option<PriShare<S>>,
    processed: bool,
}

impl<S: Suite> Verifier<S> {
    /// Fails with [`Error::InvalidConfig`] when `long_term` is not one of
    /// the participants.
    pub fn new(
        long_term: LongTermKey,
        dealer_key: VerifyingKey,
        participants: Vec<VerifyingKey>,
    ) -> Result<Self> {
        let index = identity::index_of(&participants, &long_term.public_key()).ok_or_else(|| {
            Error::InvalidConfig("verifier key is not in the participant list".into())
        })?;
        Ok(Self {
            long_term,
            index,
            dealer_key,
            aggregator: Aggregator::new(dealer_key, participants.clone()),
            participants,
            deal: None,
            share: None,
            processed: false,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn dealer_key(&self) -> &VerifyingKey {
        &self.dealer_key
    }

    /// Decrypt and check this verifier's deal and answer with a signed
    /// response.
    ///
    /// Content that merely fails verification yields a complaint. Structural
    /// or cryptographic malformation (bad commitments, bad dealer signature,
    /// truncated ciphertext, mismatched session, out of range index) is an
    /// error and produces no response.
    pub fn process_encrypted_deal(&mut self, encrypted: &EncryptedDeal) -> Result<Response> {
        if self.processed {
            return Err(Error::DuplicateDeal);
        }

        let session =
            Session::<S>::decode(&self.dealer_key, &self.participants, &encrypted.commitments)?;
        identity::verify(
            &self.dealer_key,
            &EncryptedDeal::signing_bytes(&session.id, &encrypted.dh_key),
            &encrypted.signature,
        )?;

        let plaintext =
            encryption::open(&self.long_term, &encrypted.dh_key, &session.id, &encrypted.cipher)?;
        let (status, accepted) = match plaintext {
            None => {
                warn!(index = self.index, "Deal failed authentication");
                (Status::Complaint, None)
            }
            Some(plaintext) => match serde_json::from_slice::<Deal>(&plaintext) {
                Err(e) => {
                    warn!(index = self.index, error = %e, "Undecodable deal");
                    (Status::Complaint, None)
                }
                Ok(deal) => self.check_deal(&session, deal)?,
            },
        };

        let session_id = session.id;
        self.aggregator.set_session(session)?;
        if let Some((deal, share)) = accepted {
            self.deal = Some(deal);
            self.share = Some(share);
        }
        self.processed = true;

        let response = Response::new(&self.long_term, session_id, self.index, status);
        self.aggregator.process_response(&response)?;
        self.install_justified_share()?;
        debug!(index = self.index, ?status, "Processed deal");
        Ok(response)
    }

    fn check_deal(
        &self,
        session: &Session<S>,
        deal: Deal,
    ) -> Result<(Status, Option<(Deal, PriShare<S>)>)> {
        let n = self.participants.len();
        if deal.index as usize >= n {
            return Err(Error::UnknownSender(deal.index));
        }
        if !ids_match(&deal.session_id, &session.id) {
            return Err(Error::SessionMismatch);
        }
        if deal.index != self.index {
            warn!(
                index = self.index,
                deal_index = deal.index,
                "Deal addressed to another participant"
            );
            return Ok((Status::Complaint, None));
        }

        match session.verify_deal(&self.dealer_key, n, &deal) {
            Ok(share) => Ok((Status::Approval, Some((deal, share)))),
            Err(Error::DealVerificationFailed(reason)) => {
                warn!(index = self.index, %reason, "Deal does not match commitments");
                Ok((Status::Complaint, None))
            }
            Err(e) => Err(e),
        }
    }

    /// Record another verifier's response on the same dealer
    pub fn process_response(&mut self, response: &Response) -> Result<()> {
        self.aggregator.process_response(response)
    }

    /// Check the dealer's justification. A valid justification of this
    /// verifier's own complaint installs the revealed share, as soon as the
    /// complaint it answers is known.
    pub fn process_justification(&mut self, justification: &Justification) -> Result<()> {
        self.aggregator.process_justification(justification)?;
        self.install_justified_share()
    }

    fn install_justified_share(&mut self) -> Result<()> {
        if self.share.is_some() {
            return Ok(());
        }
        let (Some(session), Some(justification)) = (
            self.aggregator.session(),
            self.aggregator.justification(self.index),
        ) else {
            return Ok(());
        };
        let share =
            session.verify_deal(&self.dealer_key, self.participants.len(), &justification.deal)?;
        debug!(index = self.index, "Share recovered from justification");
        self.deal = Some(justification.deal.clone());
        self.share = Some(share);
        Ok(())
    }

    /// The deal this verifier accepted, directly or through a justification
    pub fn deal(&self) -> Option<&Deal> {
        self.deal.as_ref()
    }

    pub fn share(&self) -> Option<&PriShare<S>> {
        self.share.as_ref()
    }

    pub fn aggregator(&self) -> &Aggregator<S> {
        &self.aggregator
    }

    pub(crate) fn session(&self) -> Option<&Session<S>> {
        self.aggregator.session()
    }

    pub fn certified(&self) -> bool {
        self.aggregator.certified()
    }
}
