//! DKG state machine

use super::{DistDeal, DistJustification, DistKeyShare, DistResponse};
use crate::algebra::Suite;
use crate::error::check_threshold;
use crate::poly::{PriShare, PublicPoly};
use crate::vss::{Dealer, DealerOptions, Verifier};
use crate::{identity, Error, LongTermKey, Result};
use ed25519_dalek::VerifyingKey;
use elliptic_curve::ff::Field;
use rand_core::{CryptoRng, RngCore};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Explicit DKG configuration
pub struct DkgOptions<S: Suite> {
    /// Dealer to run for this participant. It must belong to the same long
    /// term key, participant list and threshold. A dealer with a fresh
    /// random secret is created when unset.
    pub dealer: Option<Dealer<S>>,
}

impl<S: Suite> Default for DkgOptions<S> {
    fn default() -> Self {
        Self { dealer: None }
    }
}

/// One participant's side of a DKG round.
///
/// All methods are message driven and never block; delivery order across
/// dealers is irrelevant.
pub struct DistKeyGenerator<S: Suite> {
    index: u32,
    participants: Vec<VerifyingKey>,
    threshold: usize,
    dealer: Dealer<S>,
    /// One verifier per dealer, by dealer index
    verifiers: Vec<Verifier<S>>,
}

impl<S: Suite> std::fmt::Debug for DistKeyGenerator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistKeyGenerator")
            .field("index", &self.index)
            .field("n_parties", &self.participants.len())
            .field("threshold", &self.threshold)
            .field("dealer", &self.dealer)
            .finish_non_exhaustive()
    }
}

impl<S: Suite> DistKeyGenerator<S> {
    pub fn new<R: RngCore + CryptoRng>(
        long_term: LongTermKey,
        participants: Vec<VerifyingKey>,
        threshold: usize,
        options: DkgOptions<S>,
        rng: &mut R,
    ) -> Result<Self> {
        check_threshold(threshold, participants.len())?;

        let distinct: BTreeSet<_> = participants.iter().map(|k| k.to_bytes()).collect();
        if distinct.len() != participants.len() {
            return Err(Error::InvalidConfig("duplicate participant key".into()));
        }
        let index = identity::index_of(&participants, &long_term.public_key())
            .ok_or_else(|| Error::InvalidConfig("own key is not a participant".into()))?;

        let dealer = match options.dealer {
            Some(dealer) => {
                if dealer.public_key() != long_term.public_key() {
                    return Err(Error::InvalidConfig(
                        "dealer belongs to another long-term key".into(),
                    ));
                }
                if dealer.participants() != participants.as_slice() {
                    return Err(Error::InvalidConfig(
                        "dealer was built for another participant list".into(),
                    ));
                }
                if dealer.threshold() != threshold {
                    return Err(Error::InvalidConfig(format!(
                        "dealer threshold {} differs from {threshold}",
                        dealer.threshold()
                    )));
                }
                dealer
            }
            None => {
                let secret = S::Scalar::random(&mut *rng);
                Dealer::new(
                    long_term.clone(),
                    secret,
                    participants.clone(),
                    threshold,
                    DealerOptions::default(),
                    rng,
                )?
            }
        };

        let verifiers = participants
            .iter()
            .map(|dealer_key| Verifier::new(long_term.clone(), *dealer_key, participants.clone()))
            .collect::<Result<Vec<_>>>()?;

        debug!(index, n_parties = participants.len(), threshold, "DKG participant ready");
        Ok(Self {
            index,
            participants,
            threshold,
            dealer,
            verifiers,
        })
    }

    /// This participant's index
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn participants(&self) -> &[VerifyingKey] {
        &self.participants
    }

    pub fn dealer(&self) -> &Dealer<S> {
        &self.dealer
    }

    /// Verifier tracking dealer `index`
    pub fn verifier(&self, index: u32) -> Option<&Verifier<S>> {
        self.verifiers.get(index as usize)
    }

    /// This participant's encrypted deals, keyed by recipient. Includes the
    /// deal addressed to itself.
    pub fn deals<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<BTreeMap<u32, DistDeal>> {
        Ok(self
            .dealer
            .deals(rng)?
            .into_iter()
            .enumerate()
            .map(|(recipient, deal)| {
                (
                    recipient as u32,
                    DistDeal {
                        dealer: self.index,
                        deal,
                    },
                )
            })
            .collect())
    }

    fn verifier_mut(&mut self, dealer: u32) -> Result<&mut Verifier<S>> {
        self.verifiers
            .get_mut(dealer as usize)
            .ok_or(Error::UnknownSender(dealer))
    }

    /// Verify the deal `dd.dealer` sent to this participant
    pub fn process_deal(&mut self, dd: &DistDeal) -> Result<DistResponse> {
        let response = self.verifier_mut(dd.dealer)?.process_encrypted_deal(&dd.deal)?;
        debug!(
            index = self.index,
            dealer = dd.dealer,
            status = ?response.status,
            "Processed deal"
        );
        Ok(DistResponse {
            dealer: dd.dealer,
            response,
        })
    }

    /// Record a response. A complaint against this participant's own deal
    /// is answered with a justification to broadcast; it is already applied
    /// to this participant's own view of its deal.
    pub fn process_response(&mut self, dr: &DistResponse) -> Result<Option<DistJustification>> {
        self.verifier_mut(dr.dealer)?.process_response(&dr.response)?;
        if dr.dealer != self.index {
            return Ok(None);
        }

        let Some(justification) = self.dealer.process_response(&dr.response)? else {
            return Ok(None);
        };
        info!(
            index = self.index,
            complainer = dr.response.index,
            "Justifying complaint"
        );
        self.verifier_mut(self.index)?
            .process_justification(&justification)?;
        Ok(Some(DistJustification {
            dealer: self.index,
            justification,
        }))
    }

    pub fn process_justification(&mut self, dj: &DistJustification) -> Result<()> {
        self.verifier_mut(dj.dealer)?
            .process_justification(&dj.justification)
    }

    /// Dealers whose session is certified with the agreed threshold, in
    /// ascending order
    pub fn qualified_set(&self) -> Vec<u32> {
        self.verifiers
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                v.certified() && v.session().map(|s| s.threshold) == Some(self.threshold)
            })
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn certified(&self) -> bool {
        self.qualified_set().len() >= self.threshold
    }

    /// Combine the qualified dealers' contributions into this participant's
    /// key share.
    pub fn dist_key_share(&self) -> Result<DistKeyShare<S>> {
        let qualified = self.qualified_set();
        if qualified.len() < self.threshold {
            return Err(Error::InsufficientQualifiedSet {
                required: self.threshold,
                actual: qualified.len(),
            });
        }

        let mut value = S::Scalar::ZERO;
        let mut commits: Option<PublicPoly<S>> = None;
        for &dealer in &qualified {
            let verifier = &self.verifiers[dealer as usize];
            let (share, session) = verifier.share().zip(verifier.session()).ok_or_else(|| {
                Error::Internal(format!("certified dealer {dealer} without a share"))
            })?;
            value += share.value;
            commits = Some(match commits {
                None => session.secret.clone(),
                Some(acc) => acc.add(&session.secret)?,
            });
        }
        let commits = commits.ok_or_else(|| Error::Internal("empty qualified set".into()))?;

        info!(
            index = self.index,
            qualified = qualified.len(),
            public_key = hex::encode(S::encode_point(&commits.commit())),
            "Key share ready"
        );
        Ok(DistKeyShare {
            share: PriShare {
                index: self.index,
                value,
            },
            commits,
            qualified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Secp256k1;
    use crate::poly::{recover_secret, PrivatePoly};
    use k256::Scalar;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    struct Round {
        keys: Vec<LongTermKey>,
        generators: Vec<DistKeyGenerator<Secp256k1>>,
        rng: ChaCha20Rng,
    }

    fn round(n: usize, t: usize, seed: u64) -> Round {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys: Vec<_> = (0..n).map(|_| LongTermKey::generate(&mut rng)).collect();
        let participants: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        let generators = keys
            .iter()
            .map(|k| {
                DistKeyGenerator::new(
                    k.clone(),
                    participants.clone(),
                    t,
                    DkgOptions::default(),
                    &mut rng,
                )
                .unwrap()
            })
            .collect();
        Round {
            keys,
            generators,
            rng,
        }
    }

    impl Round {
        /// Deliver every deal, skipping those of `silent` dealers, and
        /// return the responses
        fn deal(&mut self, silent: &[u32]) -> Vec<DistResponse> {
            let all: Vec<_> = self
                .generators
                .iter()
                .filter(|g| !silent.contains(&g.index()))
                .map(|g| g.deals(&mut self.rng).unwrap())
                .collect();
            let mut responses = Vec::new();
            for deals in all {
                for (recipient, dd) in deals {
                    responses.push(self.generators[recipient as usize].process_deal(&dd).unwrap());
                }
            }
            responses
        }

        fn respond(&mut self, responses: &[DistResponse]) -> Vec<DistJustification> {
            let mut justifications = Vec::new();
            for dr in responses {
                for g in self.generators.iter_mut() {
                    if let Some(dj) = g.process_response(dr).unwrap() {
                        justifications.push(dj);
                    }
                }
            }
            justifications
        }

        fn justify(&mut self, justifications: &[DistJustification]) {
            for dj in justifications {
                for g in self.generators.iter_mut() {
                    g.process_justification(dj).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_all_honest_round() {
        let mut r = round(5, 3, 1);
        let responses = r.deal(&[]);
        assert_eq!(responses.len(), 25);
        assert!(responses.iter().all(|dr| dr.response.is_approval()));
        assert!(r.respond(&responses).is_empty());

        let shares: Vec<_> = r
            .generators
            .iter()
            .map(|g| {
                assert!(g.certified());
                assert_eq!(g.qualified_set(), vec![0, 1, 2, 3, 4]);
                g.dist_key_share().unwrap()
            })
            .collect();

        for share in &shares {
            assert_eq!(share.commits, shares[0].commits);
            assert!(share.verify());
        }

        let private: Vec<_> = shares.iter().map(|s| s.share.clone()).collect();
        let a = recover_secret(&private[0..3], 3).unwrap();
        let b = recover_secret(&private[2..5], 3).unwrap();
        let c = recover_secret(&[private[0].clone(), private[2].clone(), private[4].clone()], 3)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(Secp256k1::base() * a, shares[0].public_key());
    }

    #[test]
    fn test_joint_secret_is_sum_of_dealer_secrets() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let keys: Vec<_> = (0..3).map(|_| LongTermKey::generate(&mut rng)).collect();
        let participants: Vec<_> = keys.iter().map(|k| k.public_key()).collect();

        let mut generators: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let dealer = Dealer::<Secp256k1>::new(
                    k.clone(),
                    Scalar::from(10u64 * (i as u64 + 1)),
                    participants.clone(),
                    2,
                    DealerOptions::default(),
                    &mut rng,
                )
                .unwrap();
                let options = DkgOptions {
                    dealer: Some(dealer),
                };
                DistKeyGenerator::new(k.clone(), participants.clone(), 2, options, &mut rng)
                    .unwrap()
            })
            .collect();

        let all: Vec<_> = generators
            .iter()
            .map(|g| g.deals(&mut rng).unwrap())
            .collect();
        for deals in all {
            for (recipient, dd) in deals {
                let dr = generators[recipient as usize].process_deal(&dd).unwrap();
                for g in generators.iter_mut() {
                    assert!(g.process_response(&dr).unwrap().is_none());
                }
            }
        }

        let shares: Vec<_> = generators
            .iter()
            .map(|g| g.dist_key_share().unwrap().share)
            .collect();
        assert_eq!(recover_secret(&shares, 2).unwrap(), Scalar::from(60u64));
    }

    #[test]
    fn test_complaint_in_round_is_justified() {
        let mut r = round(4, 2, 3);
        let all: Vec<_> = r
            .generators
            .iter()
            .map(|g| g.deals(&mut r.rng).unwrap())
            .collect();

        let mut responses = Vec::new();
        for deals in all {
            for (recipient, mut dd) in deals {
                // dealer 0's deal to participant 2 is damaged in transit
                if dd.dealer == 0 && recipient == 2 {
                    dd.deal.cipher[3] ^= 0x10;
                }
                responses.push(r.generators[recipient as usize].process_deal(&dd).unwrap());
            }
        }
        let complaints: Vec<_> = responses
            .iter()
            .filter(|dr| !dr.response.is_approval())
            .collect();
        assert_eq!(complaints.len(), 1);
        assert_eq!(complaints[0].dealer, 0);

        let justifications = r.respond(&responses);
        assert_eq!(justifications.len(), 1);
        assert_eq!(justifications[0].dealer, 0);
        assert!(!r.generators[1].verifier(0).unwrap().certified());

        r.justify(&justifications);
        let shares: Vec<_> = r
            .generators
            .iter()
            .map(|g| {
                assert_eq!(g.qualified_set(), vec![0, 1, 2, 3]);
                g.dist_key_share().unwrap()
            })
            .collect();
        assert!(shares[2].verify());
        assert_eq!(shares[2].commits, shares[0].commits);
    }

    #[test]
    fn test_own_justification_counts_without_loopback() {
        let mut r = round(4, 2, 7);
        let all: Vec<_> = r
            .generators
            .iter()
            .map(|g| g.deals(&mut r.rng).unwrap())
            .collect();

        let mut responses = Vec::new();
        for deals in all {
            for (recipient, mut dd) in deals {
                if dd.dealer == 1 && recipient == 3 {
                    dd.deal.cipher[5] ^= 0x02;
                }
                responses.push(r.generators[recipient as usize].process_deal(&dd).unwrap());
            }
        }
        let justifications = r.respond(&responses);
        assert_eq!(justifications.len(), 1);
        assert!(r.generators[1].verifier(1).unwrap().certified());

        // the dealer never sees its own broadcast come back
        for dj in &justifications {
            for g in r.generators.iter_mut().filter(|g| g.index() != dj.dealer) {
                g.process_justification(dj).unwrap();
            }
        }
        for g in &r.generators {
            assert_eq!(g.qualified_set(), vec![0, 1, 2, 3]);
        }
        assert!(r.generators[1].dist_key_share().unwrap().verify());
    }

    #[test]
    fn test_missing_dealers_leave_insufficient_qualified_set() {
        let mut r = round(3, 3, 4);
        let responses = r.deal(&[2]);
        r.respond(&responses);

        let g = &r.generators[0];
        assert_eq!(g.qualified_set(), vec![0, 1]);
        assert!(!g.certified());
        assert!(matches!(
            g.dist_key_share(),
            Err(Error::InsufficientQualifiedSet {
                required: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_cheating_dealer_is_excluded() {
        let mut r = round(4, 2, 5);
        let all: Vec<_> = r
            .generators
            .iter()
            .map(|g| g.deals(&mut r.rng).unwrap())
            .collect();

        let mut responses = Vec::new();
        for deals in all {
            for (recipient, mut dd) in deals {
                if dd.dealer == 3 && recipient == 1 {
                    dd.deal.cipher[0] ^= 0x01;
                }
                responses.push(r.generators[recipient as usize].process_deal(&dd).unwrap());
            }
        }
        r.respond(&responses);

        // dealer 3 reveals a deal that contradicts its commitments
        let mut deal = r.generators[3].dealer().deal(1).unwrap();
        deal.sec_share = Secp256k1::encode_scalar(&Scalar::from(1u64));
        deal.signature = r.keys[3].sign(&deal.signing_bytes());
        let forged = DistJustification {
            dealer: 3,
            justification: crate::vss::Justification::new(&r.keys[3], deal),
        };
        // dealer 3 already applied its honest answer to itself
        for g in r.generators.iter_mut().filter(|g| g.index() != 3) {
            assert!(matches!(
                g.process_justification(&forged),
                Err(Error::DealVerificationFailed(_))
            ));
        }

        for g in r.generators.iter().filter(|g| g.index() != 3) {
            assert_eq!(g.qualified_set(), vec![0, 1, 2]);
            assert!(g.verifier(3).unwrap().aggregator().is_bad_dealer());
        }
        let shares: Vec<_> = r
            .generators
            .iter()
            .map(|g| g.dist_key_share().unwrap().share)
            .collect();
        let commits = r.generators[0].dist_key_share().unwrap().commits;
        assert_eq!(
            Secp256k1::base() * recover_secret(&shares[1..3], 2).unwrap(),
            commits.commit()
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let keys: Vec<_> = (0..3).map(|_| LongTermKey::generate(&mut rng)).collect();
        let participants: Vec<_> = keys.iter().map(|k| k.public_key()).collect();

        let result = DistKeyGenerator::<Secp256k1>::new(
            keys[0].clone(),
            participants.clone(),
            4,
            DkgOptions::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(Error::InvalidThreshold { .. })));

        let outsider = LongTermKey::generate(&mut rng);
        let result = DistKeyGenerator::<Secp256k1>::new(
            outsider,
            participants.clone(),
            2,
            DkgOptions::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let duplicated = vec![participants[0], participants[1], participants[0]];
        let result = DistKeyGenerator::<Secp256k1>::new(
            keys[0].clone(),
            duplicated,
            2,
            DkgOptions::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        // dealer of participant 1 offered to participant 0
        let poly = PrivatePoly::<Secp256k1>::random(2, Some(Scalar::from(1u64)), &mut rng).unwrap();
        let foreign = Dealer::<Secp256k1>::new(
            keys[1].clone(),
            Scalar::from(1u64),
            participants.clone(),
            2,
            DealerOptions {
                share_poly: Some(poly),
                blinding_poly: None,
            },
            &mut rng,
        )
        .unwrap();
        let result = DistKeyGenerator::<Secp256k1>::new(
            keys[0].clone(),
            participants.clone(),
            2,
            DkgOptions {
                dealer: Some(foreign),
            },
            &mut rng,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let wrong_threshold = Dealer::<Secp256k1>::new(
            keys[0].clone(),
            Scalar::from(1u64),
            participants.clone(),
            3,
            DealerOptions::default(),
            &mut rng,
        )
        .unwrap();
        let result = DistKeyGenerator::<Secp256k1>::new(
            keys[0].clone(),
            participants,
            2,
            DkgOptions {
                dealer: Some(wrong_threshold),
            },
            &mut rng,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
