//! Secret and public polynomials
//!
//! A [`PrivatePoly`] of degree `t - 1` holds a dealer's secret sharing
//! polynomial; [`PublicPoly`] is its Feldman commitment. Share indices are
//! 0-based and evaluated at `x = index + 1`, so the secret `f(0)` is never
//! handed out as a share.

use crate::algebra::Suite;
use crate::{Error, Result};
use elliptic_curve::{ff::Field, group::Group};
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Evaluation of a private polynomial. The value is wiped on drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriShare<S: Suite> {
    pub index: u32,
    pub value: S::Scalar,
}

impl<S: Suite> Zeroize for PriShare<S> {
    fn zeroize(&mut self) {
        self.value.zeroize();
    }
}

impl<S: Suite> Drop for PriShare<S> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<S: Suite> ZeroizeOnDrop for PriShare<S> {}

/// Evaluation of a public polynomial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubShare<S: Suite> {
    pub index: u32,
    pub value: S::Point,
}

/// Polynomial with scalar coefficients `[a_0, ..., a_{t-1}]`
#[derive(Clone)]
pub struct PrivatePoly<S: Suite> {
    coeffs: Vec<S::Scalar>,
}

impl<S: Suite> Drop for PrivatePoly<S> {
    fn drop(&mut self) {
        self.coeffs.zeroize();
    }
}

impl<S: Suite> ZeroizeOnDrop for PrivatePoly<S> {}

impl<S: Suite> std::fmt::Debug for PrivatePoly<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivatePoly")
            .field("threshold", &self.coeffs.len())
            .finish_non_exhaustive()
    }
}

fn x_of<S: Suite>(index: u32) -> S::Scalar {
    S::Scalar::from(u64::from(index) + 1)
}

impl<S: Suite> PrivatePoly<S> {
    /// Random polynomial with `threshold` coefficients. The constant term is
    /// `secret` when given.
    pub fn random<R: RngCore + CryptoRng>(
        threshold: usize,
        secret: Option<S::Scalar>,
        rng: &mut R,
    ) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::InvalidThreshold {
                threshold,
                n_parties: 0,
            });
        }
        let mut coeffs = Vec::with_capacity(threshold);
        coeffs.push(secret.unwrap_or_else(|| S::Scalar::random(&mut *rng)));
        for _ in 1..threshold {
            coeffs.push(S::Scalar::random(&mut *rng));
        }
        Ok(Self { coeffs })
    }

    /// Build from explicit coefficients, constant term first
    pub fn from_coefficients(coeffs: Vec<S::Scalar>) -> Result<Self> {
        if coeffs.is_empty() {
            return Err(Error::InvalidThreshold {
                threshold: 0,
                n_parties: 0,
            });
        }
        Ok(Self { coeffs })
    }

    /// Number of coefficients, i.e. shares needed for recovery
    pub fn threshold(&self) -> usize {
        self.coeffs.len()
    }

    /// Constant term
    pub fn secret(&self) -> S::Scalar {
        self.coeffs[0]
    }

    pub fn coefficients(&self) -> &[S::Scalar] {
        &self.coeffs
    }

    /// Horner evaluation at `index + 1`
    pub fn eval(&self, index: u32) -> PriShare<S> {
        let x = x_of::<S>(index);
        let value = self
            .coeffs
            .iter()
            .rev()
            .fold(S::Scalar::ZERO, |acc, coeff| acc * x + coeff);
        PriShare { index, value }
    }

    /// Shares for indices `0..n`
    pub fn shares(&self, n: usize) -> Vec<PriShare<S>> {
        (0..n as u32).map(|i| self.eval(i)).collect()
    }

    /// Coefficient-wise sum
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.threshold() != other.threshold() {
            return Err(Error::InvalidConfig(format!(
                "polynomial thresholds differ: {} vs {}",
                self.threshold(),
                other.threshold()
            )));
        }
        let coeffs = self
            .coeffs
            .iter()
            .zip(&other.coeffs)
            .map(|(a, b)| *a + b)
            .collect();
        Ok(Self { coeffs })
    }

    /// Commit every coefficient against `base`
    pub fn commit(&self, base: &S::Point) -> PublicPoly<S> {
        PublicPoly {
            commits: self.coeffs.iter().map(|c| *base * c).collect(),
        }
    }
}

/// Commitment `[base * a_0, ..., base * a_{t-1}]` to a private polynomial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPoly<S: Suite> {
    commits: Vec<S::Point>,
}

impl<S: Suite> PublicPoly<S> {
    pub fn from_commits(commits: Vec<S::Point>) -> Result<Self> {
        if commits.is_empty() {
            return Err(Error::Malformed("empty commitment".into()));
        }
        Ok(Self { commits })
    }

    pub fn threshold(&self) -> usize {
        self.commits.len()
    }

    pub fn commits(&self) -> &[S::Point] {
        &self.commits
    }

    /// Commitment to the constant term
    pub fn commit(&self) -> S::Point {
        self.commits[0]
    }

    /// Horner evaluation at `index + 1`
    pub fn eval(&self, index: u32) -> PubShare<S> {
        let x = x_of::<S>(index);
        let value = self
            .commits
            .iter()
            .rev()
            .fold(S::Point::identity(), |acc, c| acc * x + c);
        PubShare { index, value }
    }

    /// Check `base * share.value == self.eval(share.index)`
    pub fn check(&self, base: &S::Point, share: &PriShare<S>) -> bool {
        *base * share.value == self.eval(share.index).value
    }

    /// Coefficient-wise sum in the group
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.threshold() != other.threshold() {
            return Err(Error::InvalidConfig(format!(
                "commitment thresholds differ: {} vs {}",
                self.threshold(),
                other.threshold()
            )));
        }
        let commits = self
            .commits
            .iter()
            .zip(&other.commits)
            .map(|(a, b)| *a + b)
            .collect();
        Ok(Self { commits })
    }

    pub fn encode(&self) -> Vec<Vec<u8>> {
        self.commits.iter().map(S::encode_point).collect()
    }

    pub fn decode(encoded: &[Vec<u8>]) -> Result<Self> {
        let commits = encoded
            .iter()
            .map(|bytes| S::decode_point(bytes))
            .collect::<Result<Vec<_>>>()?;
        Self::from_commits(commits)
    }
}

/// Lagrange coefficients at zero for the given indices
fn lagrange_at_zero<S: Suite>(indices: &[u32]) -> Result<Vec<S::Scalar>> {
    indices
        .iter()
        .map(|&i| {
            let xi = x_of::<S>(i);
            let mut numerator = S::Scalar::ONE;
            let mut denominator = S::Scalar::ONE;
            for &j in indices.iter().filter(|&&j| j != i) {
                let xj = x_of::<S>(j);
                numerator *= xj;
                denominator *= xj - xi;
            }
            Option::from(denominator.invert())
                .map(|inv: S::Scalar| numerator * inv)
                .ok_or_else(|| Error::Internal("zero Lagrange denominator".into()))
        })
        .collect()
}

/// First `t` shares by distinct index
fn select_distinct<T, F>(shares: &[T], t: usize, index_of: F) -> Result<Vec<&T>>
where
    F: Fn(&T) -> u32,
{
    let mut distinct = BTreeMap::new();
    for share in shares {
        distinct.entry(index_of(share)).or_insert(share);
    }
    if distinct.len() < t || t == 0 {
        return Err(Error::InsufficientShares {
            required: t.max(1),
            actual: distinct.len(),
        });
    }
    Ok(distinct.into_values().take(t).collect())
}

/// Recover `f(0)` from at least `t` shares with distinct indices.
pub fn recover_secret<S: Suite>(shares: &[PriShare<S>], t: usize) -> Result<S::Scalar> {
    let selected = select_distinct(shares, t, |s| s.index)?;
    let indices: Vec<u32> = selected.iter().map(|s| s.index).collect();
    let lambdas = lagrange_at_zero::<S>(&indices)?;
    Ok(selected
        .iter()
        .zip(lambdas)
        .fold(S::Scalar::ZERO, |acc, (share, lambda)| {
            acc + share.value * lambda
        }))
}

/// Recover the commitment to `f(0)` from at least `t` public shares.
pub fn recover_commit<S: Suite>(shares: &[PubShare<S>], t: usize) -> Result<S::Point> {
    let selected = select_distinct(shares, t, |s| s.index)?;
    let indices: Vec<u32> = selected.iter().map(|s| s.index).collect();
    let lambdas = lagrange_at_zero::<S>(&indices)?;
    Ok(selected
        .iter()
        .zip(lambdas)
        .fold(S::Point::identity(), |acc, (share, lambda)| {
            acc + share.value * lambda
        }))
}
