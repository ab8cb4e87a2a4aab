//! VSS dealer

use super::{
    encryption, Aggregator, Commitments, Deal, EncryptedDeal, Justification, Response, Session,
    Status,
};
use crate::algebra::Suite;
use crate::error::check_threshold;
use crate::poly::{PrivatePoly, PublicPoly};
use crate::{Error, LongTermKey, Result, SessionId};
use ed25519_dalek::VerifyingKey;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info};
use x25519_dalek::EphemeralSecret;

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;

/// Explicit dealer configuration. Every field defaults to a freshly
/// randomized polynomial when left unset.
pub struct DealerOptions<S: Suite> {
    /// Sharing polynomial `f`; must have `threshold` coefficients and
    /// encode the dealer's secret as its constant term
    pub share_poly: Option<PrivatePoly<S>>,
    /// Blinding polynomial `g`; must have `threshold` coefficients
    pub blinding_poly: Option<PrivatePoly<S>>,
}

impl<S: Suite> Default for DealerOptions<S> {
    fn default() -> Self {
        Self {
            share_poly: None,
            blinding_poly: None,
        }
    }
}

/// Splits a secret among the participants and answers their complaints.
pub struct Dealer<S: Suite> {
    long_term: LongTermKey,
    participants: Vec<VerifyingKey>,
    share_poly: PrivatePoly<S>,
    blinding_poly: PrivatePoly<S>,
    session: Session<S>,
    commitments: Commitments,
    aggregator: Aggregator<S>,
}

impl<S: Suite> std::fmt::Debug for Dealer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dealer")
            .field("suite", &S::NAME)
            .field("n_parties", &self.participants.len())
            .field("threshold", &self.threshold())
            .field("session_id", &hex::encode(self.session_id()))
            .finish_non_exhaustive()
    }
}

fn check_override<S: Suite>(name: &str, poly: &PrivatePoly<S>, threshold: usize) -> Result<()> {
    if poly.threshold() != threshold {
        return Err(Error::InvalidConfig(format!(
            "{name} polynomial has {} coefficients, threshold is {threshold}",
            poly.threshold()
        )));
    }
    Ok(())
}

impl<S: Suite> Dealer<S> {
    /// Create a dealer sharing `secret` among `participants` with threshold
    /// `threshold`.
    pub fn new<R: RngCore + CryptoRng>(
        long_term: LongTermKey,
        secret: S::Scalar,
        participants: Vec<VerifyingKey>,
        threshold: usize,
        options: DealerOptions<S>,
        rng: &mut R,
    ) -> Result<Self> {
        check_threshold(threshold, participants.len())?;

        let share_poly = match options.share_poly {
            Some(poly) => {
                check_override("share", &poly, threshold)?;
                if poly.secret() != secret {
                    return Err(Error::InvalidConfig(
                        "share polynomial does not encode the dealer secret".into(),
                    ));
                }
                poly
            }
            None => PrivatePoly::random(threshold, Some(secret), rng)?,
        };
        let blinding_poly = match options.blinding_poly {
            Some(poly) => {
                check_override("blinding", &poly, threshold)?;
                poly
            }
            None => PrivatePoly::random(threshold, None, rng)?,
        };

        let blinding_base = S::blinding_base()?;
        let secret_commits = share_poly.commit(&S::base());
        let blinding_commits = blinding_poly.commit(&blinding_base);
        let commitments = Commitments {
            secret: secret_commits.encode(),
            blinding: blinding_commits.encode(),
        };

        let dealer_key = long_term.public_key();
        let session = Session::new(
            &dealer_key,
            &participants,
            secret_commits,
            blinding_commits,
            blinding_base,
        )?;
        let mut aggregator = Aggregator::new(dealer_key, participants.clone());
        aggregator.set_session(session.clone())?;

        let dealer = Self {
            long_term,
            participants,
            share_poly,
            blinding_poly,
            session,
            commitments,
            aggregator,
        };
        info!(
            suite = S::NAME,
            n_parties = dealer.participants.len(),
            threshold,
            session_id = hex::encode(dealer.session_id()),
            "Dealer ready"
        );
        Ok(dealer)
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.long_term.public_key()
    }

    pub(crate) fn long_term(&self) -> &LongTermKey {
        &self.long_term
    }

    pub fn participants(&self) -> &[VerifyingKey] {
        &self.participants
    }

    pub fn threshold(&self) -> usize {
        self.share_poly.threshold()
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id
    }

    /// Encoded commitments, published alongside every deal
    pub fn commitments(&self) -> &Commitments {
        &self.commitments
    }

    /// Feldman commitment of the sharing polynomial
    pub fn secret_commits(&self) -> &PublicPoly<S> {
        &self.session.secret
    }

    /// Commitment of the blinding polynomial over the Pedersen base
    pub fn blinding_commits(&self) -> &PublicPoly<S> {
        &self.session.blinding
    }

    /// Signed cleartext deal for participant `index`
    pub fn deal(&self, index: u32) -> Result<Deal> {
        if index as usize >= self.participants.len() {
            return Err(Error::UnknownSender(index));
        }
        let mut deal = Deal {
            session_id: self.session_id(),
            index,
            sec_share: S::encode_scalar(&self.share_poly.eval(index).value),
            rnd_share: S::encode_scalar(&self.blinding_poly.eval(index).value),
            signature: Vec::new(),
        };
        deal.signature = self.long_term.sign(&deal.signing_bytes());
        Ok(deal)
    }

    /// Deal for participant `index`, encrypted to its long-term key under an
    /// ephemeral key drawn from `rng`
    pub fn encrypted_deal<R: RngCore + CryptoRng>(
        &self,
        index: u32,
        rng: &mut R,
    ) -> Result<EncryptedDeal> {
        self.seal_deal(index, EphemeralSecret::random_from_rng(&mut *rng))
    }

    fn seal_deal(&self, index: u32, ephemeral: EphemeralSecret) -> Result<EncryptedDeal> {
        let deal = self.deal(index)?;
        let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(&deal)?);
        let session_id = self.session_id();
        let (dh_key, cipher) = encryption::seal(
            ephemeral,
            &self.participants[index as usize],
            &session_id,
            &plaintext,
        )?;
        Ok(EncryptedDeal {
            commitments: self.commitments.clone(),
            dh_key,
            signature: self
                .long_term
                .sign(&EncryptedDeal::signing_bytes(&session_id, &dh_key)),
            cipher,
        })
    }

    /// One encrypted deal per participant, in participant order. Ephemeral
    /// keys are drawn from `rng` in participant order.
    pub fn deals<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<EncryptedDeal>> {
        debug!(n_parties = self.participants.len(), "Encrypting deals");
        let ephemerals: Vec<EphemeralSecret> = self
            .participants
            .iter()
            .map(|_| EphemeralSecret::random_from_rng(&mut *rng))
            .collect();

        #[cfg(feature = "multi-thread")]
        let deals: Result<Vec<EncryptedDeal>> = ephemerals
            .into_par_iter()
            .enumerate()
            .map(|(i, ephemeral)| self.seal_deal(i as u32, ephemeral))
            .collect();
        #[cfg(not(feature = "multi-thread"))]
        let deals: Result<Vec<EncryptedDeal>> = ephemerals
            .into_iter()
            .enumerate()
            .map(|(i, ephemeral)| self.seal_deal(i as u32, ephemeral))
            .collect();

        deals
    }

    /// Record a response to this dealer's session. A complaint is answered
    /// with a justification revealing the contested deal.
    pub fn process_response(&mut self, response: &Response) -> Result<Option<Justification>> {
        self.aggregator.process_response(response)?;
        if response.status == Status::Approval {
            return Ok(None);
        }

        debug!(index = response.index, "Answering complaint");
        let justification = Justification::new(&self.long_term, self.deal(response.index)?);
        self.aggregator.process_justification(&justification)?;
        Ok(Some(justification))
    }

    pub fn aggregator(&self) -> &Aggregator<S> {
        &self.aggregator
    }

    /// Whether this dealer's own view of its session is certified
    pub fn certified(&self) -> bool {
        self.aggregator.certified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Secp256k1;
    use crate::poly::{recover_secret, PriShare};
    use k256::{ProjectivePoint, Scalar};
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn participants(rng: &mut ChaCha20Rng, n: usize) -> Vec<LongTermKey> {
        (0..n).map(|_| LongTermKey::generate(rng)).collect()
    }

    #[test]
    fn test_deals_count_and_recovery_for_all_thresholds() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let n = 5;
        let keys = participants(&mut rng, n);
        let public: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        let secret = Scalar::from(31337u64);

        for t in 1..=n {
            let dealer = Dealer::<Secp256k1>::new(
                LongTermKey::generate(&mut rng),
                secret,
                public.clone(),
                t,
                DealerOptions::default(),
                &mut rng,
            )
            .unwrap();
            assert_eq!(dealer.deals(&mut rng).unwrap().len(), n);
            assert_eq!(dealer.secret_commits().commit(), ProjectivePoint::GENERATOR * secret);

            let shares: Vec<_> = (0..n as u32)
                .map(|i| {
                    let deal = dealer.deal(i).unwrap();
                    PriShare::<Secp256k1> {
                        index: i,
                        value: Secp256k1::decode_scalar(&deal.sec_share).unwrap(),
                    }
                })
                .collect();
            assert_eq!(recover_secret(&shares[n - t..], t).unwrap(), secret);
        }
    }

    #[test]
    fn test_invalid_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let public: Vec<_> = participants(&mut rng, 3)
            .iter()
            .map(|k| k.public_key())
            .collect();

        for t in [0usize, 4] {
            let err = Dealer::<Secp256k1>::new(
                LongTermKey::generate(&mut rng),
                Scalar::ONE,
                public.clone(),
                t,
                DealerOptions::default(),
                &mut rng,
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidThreshold { n_parties: 3, .. }));
        }
    }

    #[test]
    fn test_explicit_polynomials() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let public: Vec<_> = participants(&mut rng, 4)
            .iter()
            .map(|k| k.public_key())
            .collect();
        let secret = Scalar::from(7u64);
        let f = PrivatePoly::<Secp256k1>::random(2, Some(secret), &mut rng).unwrap();
        let g = PrivatePoly::<Secp256k1>::random(2, None, &mut rng).unwrap();

        let dealer = Dealer::<Secp256k1>::new(
            LongTermKey::generate(&mut rng),
            secret,
            public.clone(),
            2,
            DealerOptions {
                share_poly: Some(f.clone()),
                blinding_poly: Some(g.clone()),
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(dealer.secret_commits(), &f.commit(&ProjectivePoint::GENERATOR));
        assert_eq!(
            dealer.blinding_commits(),
            &g.commit(&Secp256k1::blinding_base().unwrap())
        );

        // only the blinding polynomial overridden
        let dealer = Dealer::<Secp256k1>::new(
            LongTermKey::generate(&mut rng),
            secret,
            public.clone(),
            2,
            DealerOptions {
                share_poly: None,
                blinding_poly: Some(g.clone()),
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(dealer.secret_commits().commit(), ProjectivePoint::GENERATOR * secret);

        let wrong_secret = Dealer::<Secp256k1>::new(
            LongTermKey::generate(&mut rng),
            Scalar::from(8u64),
            public.clone(),
            2,
            DealerOptions {
                share_poly: Some(f.clone()),
                blinding_poly: None,
            },
            &mut rng,
        );
        assert!(matches!(wrong_secret, Err(Error::InvalidConfig(_))));

        let wrong_degree = Dealer::<Secp256k1>::new(
            LongTermKey::generate(&mut rng),
            secret,
            public,
            3,
            DealerOptions {
                share_poly: None,
                blinding_poly: Some(g),
            },
            &mut rng,
        );
        assert!(matches!(wrong_degree, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_seeded_deals_are_reproducible() {
        let build = || {
            let mut rng = ChaCha20Rng::seed_from_u64(5);
            let public: Vec<_> = participants(&mut rng, 3)
                .iter()
                .map(|k| k.public_key())
                .collect();
            let dealer = Dealer::<Secp256k1>::new(
                LongTermKey::generate(&mut rng),
                Scalar::from(3u64),
                public,
                2,
                DealerOptions::default(),
                &mut rng,
            )
            .unwrap();
            dealer.deals(&mut rng).unwrap()
        };

        let deals = build();
        assert_eq!(deals, build());
        assert_ne!(deals[0].dh_key, deals[1].dh_key);
    }

    #[test]
    fn test_deal_out_of_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let public: Vec<_> = participants(&mut rng, 2)
            .iter()
            .map(|k| k.public_key())
            .collect();
        let dealer = Dealer::<Secp256k1>::new(
            LongTermKey::generate(&mut rng),
            Scalar::ONE,
            public,
            2,
            DealerOptions::default(),
            &mut rng,
        )
        .unwrap();

        assert!(matches!(dealer.deal(2), Err(Error::UnknownSender(2))));
    }
}
