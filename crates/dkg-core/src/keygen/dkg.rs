//! DKG protocol driver

use super::{
    JustificationBatch, ResponseBatch, ROUND_DEALS, ROUND_JUSTIFICATIONS, ROUND_RESPONSES,
};
use crate::algebra::Suite;
use crate::dkg::{DistDeal, DistKeyGenerator, DistKeyShare, DkgOptions};
use crate::mpc::Relay;
use crate::{identity, Error, LongTermKey, Result, SessionConfig};
use ed25519_dalek::VerifyingKey;
use rand::rngs::OsRng;
use tracing::{debug, info, instrument, warn};

/// Run the distributed key generation protocol for one party
///
/// Every round waits at most `config.round_timeout` and then continues with
/// the messages received so far, so silent parties only shrink the
/// qualified set. Per-message protocol errors are logged and the offending
/// message is dropped.
///
/// # Arguments
/// * `config` - Session configuration, identical for every party except
///   `party_id`
/// * `long_term` - This party's long-term key
/// * `participants` - Long-term public keys of all parties, in party order
/// * `relay` - Message relay for communication
///
/// # Returns
/// The party's key share. Fails with [`Error::Timeout`] when fewer than
/// `threshold` deals arrive in time, and with
/// [`Error::InsufficientQualifiedSet`] when fewer than `threshold` dealers
/// end up qualified.
#[instrument(
    skip_all,
    fields(party_id = config.party_id, n_parties = config.n_parties, threshold = config.threshold)
)]
pub async fn run_dkg<S: Suite, R: Relay>(
    config: &SessionConfig,
    long_term: &LongTermKey,
    participants: &[VerifyingKey],
    relay: &R,
) -> Result<DistKeyShare<S>> {
    if participants.len() != config.n_parties {
        return Err(Error::InvalidConfig(format!(
            "{} participant keys for {} parties",
            participants.len(),
            config.n_parties
        )));
    }
    if identity::index_of(participants, &long_term.public_key()) != Some(config.party_id as u32) {
        return Err(Error::InvalidConfig(format!(
            "long-term key is not participant {}",
            config.party_id
        )));
    }

    info!(suite = S::NAME, "Starting DKG");
    let mut generator = DistKeyGenerator::<S>::new(
        long_term.clone(),
        participants.to_vec(),
        config.threshold,
        DkgOptions::default(),
        &mut OsRng,
    )?;

    // Round 1: deals
    debug!("DKG Round 1: Deals");
    for (recipient, deal) in generator.deals(&mut OsRng)? {
        relay
            .send_direct(&config.session_id, ROUND_DEALS, recipient as usize, &deal)
            .await?;
    }
    let deals: Vec<DistDeal> = relay
        .collect_direct(
            &config.session_id,
            ROUND_DEALS,
            config.party_id,
            config.n_parties,
            config.round_timeout,
        )
        .await?;
    check_round(config, "deals", deals.len());
    if deals.len() < config.threshold {
        return Err(Error::Timeout(format!(
            "{} of {} deals after {:?}, {} needed",
            deals.len(),
            config.n_parties,
            config.round_timeout,
            config.threshold
        )));
    }

    let mut responses = Vec::with_capacity(deals.len());
    for deal in &deals {
        match generator.process_deal(deal) {
            Ok(response) => responses.push(response),
            Err(e) => warn!(dealer = deal.dealer, error = %e, "Dropping deal"),
        }
    }

    // Round 2: responses
    debug!("DKG Round 2: Responses");
    let batch = ResponseBatch {
        party_id: config.party_id,
        responses,
    };
    relay
        .broadcast(&config.session_id, ROUND_RESPONSES, &batch)
        .await?;
    let batches: Vec<ResponseBatch> = relay
        .collect_broadcasts(
            &config.session_id,
            ROUND_RESPONSES,
            config.n_parties,
            config.round_timeout,
        )
        .await?;
    check_round(config, "responses", batches.len());

    let mut justifications = Vec::new();
    for batch in &batches {
        for response in &batch.responses {
            match generator.process_response(response) {
                Ok(Some(justification)) => justifications.push(justification),
                Ok(None) => {}
                Err(e) => warn!(
                    from = batch.party_id,
                    dealer = response.dealer,
                    error = %e,
                    "Dropping response"
                ),
            }
        }
    }

    // Round 3: justifications
    debug!(count = justifications.len(), "DKG Round 3: Justifications");
    let batch = JustificationBatch {
        party_id: config.party_id,
        justifications,
    };
    relay
        .broadcast(&config.session_id, ROUND_JUSTIFICATIONS, &batch)
        .await?;
    let batches: Vec<JustificationBatch> = relay
        .collect_broadcasts(
            &config.session_id,
            ROUND_JUSTIFICATIONS,
            config.n_parties,
            config.round_timeout,
        )
        .await?;
    check_round(config, "justifications", batches.len());

    for batch in &batches {
        for justification in &batch.justifications {
            if let Err(e) = generator.process_justification(justification) {
                warn!(
                    from = batch.party_id,
                    dealer = justification.dealer,
                    error = %e,
                    "Dropping justification"
                );
            }
        }
    }

    let key_share = generator.dist_key_share()?;
    info!(
        public_key = hex::encode(S::encode_point(&key_share.public_key())),
        qualified = ?key_share.qualified,
        "DKG completed successfully"
    );
    Ok(key_share)
}

/// Note a round that closed on its timeout
fn check_round(config: &SessionConfig, round: &str, received: usize) {
    if received < config.n_parties {
        warn!(
            round,
            received,
            expected = config.n_parties,
            timeout = ?config.round_timeout,
            "Round closed with missing messages"
        );
    }
}
