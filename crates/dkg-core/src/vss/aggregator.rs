//! Per-dealer response bookkeeping

use super::{ids_match, Justification, Response, Session, Status};
use crate::algebra::Suite;
use crate::{identity, Error, Result, SessionId};
use ed25519_dalek::VerifyingKey;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Collects the responses and justifications of one dealer's session and
/// decides whether that session is certified.
///
/// The aggregator has no notion of time: [`Aggregator::certified`] is a pure
/// function of what has been recorded so far, independent of arrival order.
#[derive(Debug, Clone)]
pub struct Aggregator<S: Suite> {
    dealer_key: VerifyingKey,
    participants: Vec<VerifyingKey>,
    session: Option<Session<S>>,
    responses: BTreeMap<u32, Response>,
    justifications: BTreeMap<u32, Justification>,
    /// Signed justifications whose complaint (or session) is not known yet
    pending: BTreeMap<u32, Justification>,
    bad_dealer: bool,
}

impl<S: Suite> Aggregator<S> {
    pub fn new(dealer_key: VerifyingKey, participants: Vec<VerifyingKey>) -> Self {
        Self {
            dealer_key,
            participants,
            session: None,
            responses: BTreeMap::new(),
            justifications: BTreeMap::new(),
            pending: BTreeMap::new(),
            bad_dealer: false,
        }
    }

    /// Bind the aggregator to the dealer's commitments. Responses and
    /// justifications recorded before the session was known and naming
    /// another session are dropped.
    pub(crate) fn set_session(&mut self, session: Session<S>) -> Result<()> {
        if let Some(existing) = &self.session {
            if ids_match(&existing.id, &session.id) {
                return Ok(());
            }
            return Err(Error::SessionMismatch);
        }

        let id = session.id;
        self.responses.retain(|index, response| {
            let keep = ids_match(&response.session_id, &id);
            if !keep {
                warn!(index, "dropping response for another session");
            }
            keep
        });
        self.pending.retain(|index, justification| {
            let keep = ids_match(&justification.session_id, &id);
            if !keep {
                warn!(index, "dropping justification for another session");
            }
            keep
        });
        self.session = Some(session);
        self.resolve_pending();
        Ok(())
    }

    pub(crate) fn session(&self) -> Option<&Session<S>> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn dealer_key(&self) -> &VerifyingKey {
        &self.dealer_key
    }

    /// Record a verifier's response.
    ///
    /// Re-delivery of an identical response is a no-op. A response that
    /// conflicts with the recorded one fails with
    /// [`Error::DuplicateResponse`] and leaves the state untouched.
    pub fn process_response(&mut self, response: &Response) -> Result<()> {
        let key = self
            .participants
            .get(response.index as usize)
            .ok_or(Error::UnknownSender(response.index))?;
        identity::verify(key, &response.signing_bytes(), &response.signature)?;

        if let Some(session) = &self.session {
            if !ids_match(&response.session_id, &session.id) {
                return Err(Error::SessionMismatch);
            }
        }

        match self.responses.get(&response.index) {
            Some(existing)
                if existing.status == response.status
                    && ids_match(&existing.session_id, &response.session_id) =>
            {
                debug!(index = response.index, "ignoring duplicate response");
                Ok(())
            }
            Some(_) => Err(Error::DuplicateResponse(response.index)),
            None => {
                debug!(
                    index = response.index,
                    status = ?response.status,
                    "recorded response"
                );
                self.responses.insert(response.index, response.clone());
                self.resolve_pending();
                Ok(())
            }
        }
    }

    /// Check a dealer's justification for a complaint.
    ///
    /// A justification that arrives before its complaint (or before the
    /// session is known) is held and checked once both are recorded. A
    /// justification answering an approval fails with
    /// [`Error::NoComplaint`].
    ///
    /// A justification whose deal still fails verification proves the dealer
    /// is cheating: the session is marked bad and can never certify.
    pub fn process_justification(&mut self, justification: &Justification) -> Result<()> {
        let index = justification.index;
        if index as usize >= self.participants.len() {
            return Err(Error::UnknownSender(index));
        }
        identity::verify(
            &self.dealer_key,
            &justification.signing_bytes(),
            &justification.signature,
        )?;
        if justification.deal.index != index {
            return Err(Error::Malformed(format!(
                "justification for index {index} reveals deal for index {}",
                justification.deal.index
            )));
        }
        if let Some(session) = &self.session {
            if !ids_match(&justification.session_id, &session.id) {
                return Err(Error::SessionMismatch);
            }
        }

        let complained = match self.responses.get(&index) {
            Some(response) if response.status == Status::Complaint => true,
            Some(_) => return Err(Error::NoComplaint(index)),
            None => false,
        };
        if !complained || self.session.is_none() {
            debug!(index, "holding justification until its complaint is known");
            self.pending
                .entry(index)
                .or_insert_with(|| justification.clone());
            return Ok(());
        }
        self.justify(justification)
    }

    /// Check a signed justification against the recorded complaint
    fn justify(&mut self, justification: &Justification) -> Result<()> {
        let index = justification.index;
        if self.justifications.contains_key(&index) {
            debug!(index, "ignoring duplicate justification");
            return Ok(());
        }
        let session = self.session.as_ref().ok_or(Error::SessionMismatch)?;

        if let Err(e) =
            session.verify_deal(&self.dealer_key, self.participants.len(), &justification.deal)
        {
            warn!(index, error = %e, "justification failed, dealer is misbehaving");
            self.bad_dealer = true;
            return Err(match e {
                Error::DealVerificationFailed(_) => e,
                other => Error::DealVerificationFailed(other.to_string()),
            });
        }

        debug!(index, "complaint justified");
        self.justifications.insert(index, justification.clone());
        Ok(())
    }

    /// Apply held justifications whose complaint has been recorded
    fn resolve_pending(&mut self) {
        if self.session.is_none() {
            return;
        }
        let ready: Vec<u32> = self
            .pending
            .keys()
            .copied()
            .filter(|index| self.responses.contains_key(index))
            .collect();
        for index in ready {
            let Some(justification) = self.pending.remove(&index) else {
                continue;
            };
            if self.responses.get(&index).map(|r| r.status) != Some(Status::Complaint) {
                warn!(index, "dropping justification of an approval");
                continue;
            }
            // a failing deal flags the dealer inside justify
            let _ = self.justify(&justification);
        }
    }

    /// Number of approvals
    pub fn approvals(&self) -> usize {
        self.responses
            .values()
            .filter(|r| r.status == Status::Approval)
            .count()
    }

    /// Complaints answered by a valid justification
    pub fn justified_complaints(&self) -> usize {
        self.justifications.len()
    }

    /// Complaints still waiting for a justification
    pub fn outstanding_complaints(&self) -> usize {
        self.responses
            .iter()
            .filter(|(index, r)| {
                r.status == Status::Complaint && !self.justifications.contains_key(*index)
            })
            .count()
    }

    pub fn is_bad_dealer(&self) -> bool {
        self.bad_dealer
    }

    pub fn response(&self, index: u32) -> Option<&Response> {
        self.responses.get(&index)
    }

    /// Accepted justification of participant `index`'s complaint
    pub fn justification(&self, index: u32) -> Option<&Justification> {
        self.justifications.get(&index)
    }

    /// Responses needed for certification, `n - t`; `None` until the
    /// session is known.
    pub fn required_responses(&self) -> Option<usize> {
        self.session
            .as_ref()
            .map(|s| self.participants.len() - s.threshold)
    }

    /// True iff the session is known, the dealer has not been caught
    /// cheating, no complaint is outstanding and approvals plus justified
    /// complaints reach `n - t`.
    pub fn certified(&self) -> bool {
        let Some(required) = self.required_responses() else {
            return false;
        };
        !self.bad_dealer
            && self.outstanding_complaints() == 0
            && self.approvals() + self.justified_complaints() >= required
    }
}
