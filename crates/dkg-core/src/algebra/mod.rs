//! Group algebra contract
//!
//! The protocol is written against [`Suite`], which names a prime-order
//! group together with its scalar field. Everything the VSS and DKG layers
//! need from the algebra goes through this trait: arithmetic comes from the
//! `ff`/`group` traits, byte encodings and the Pedersen base from the suite.
//! Pairing-friendly suites additionally name their second source group and
//! target group; plain curves use [`NoG2`] and [`NoGT`].

mod secp256k1;

pub use secp256k1::Secp256k1;

use crate::{Error, Result};
use elliptic_curve::{
    ff::PrimeField,
    group::{Group, GroupEncoding},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Kinds of elements a suite can be asked to decode.
///
/// This is a closed set. Pairing-friendly suites provide all four kinds,
/// plain elliptic-curve suites only `Scalar` and `PointG1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Scalar,
    PointG1,
    PointG2,
    PointGT,
}

/// A decoded algebra element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element<S: Suite> {
    Scalar(S::Scalar),
    PointG1(S::Point),
    PointG2(S::G2),
    PointGT(S::GT),
}

impl<S: Suite> Element<S> {
    /// The kind this element was decoded as
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Scalar(_) => ElementKind::Scalar,
            Element::PointG1(_) => ElementKind::PointG1,
            Element::PointG2(_) => ElementKind::PointG2,
            Element::PointGT(_) => ElementKind::PointGT,
        }
    }

    /// Canonical encoding of the element
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Element::Scalar(s) => S::encode_scalar(s),
            Element::PointG1(p) => S::encode_point(p),
            Element::PointG2(p) => S::G2::encode(p),
            Element::PointGT(p) => S::GT::encode(p),
        }
    }
}

/// Byte codec of a pairing group element
pub trait PairingElement: Clone + fmt::Debug + PartialEq + Eq + Send + Sync + 'static {
    /// Kind this group decodes as
    const KIND: ElementKind;

    fn encode(&self) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// G2 of a suite without a pairing. It has no values, so
/// [`Element::PointG2`] can never be built for such a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoG2 {}

/// GT of a suite without a pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoGT {}

impl PairingElement for NoG2 {
    const KIND: ElementKind = ElementKind::PointG2;

    fn encode(&self) -> Vec<u8> {
        match *self {}
    }

    fn decode(_: &[u8]) -> Result<Self> {
        Err(Error::UnsupportedElement(Self::KIND))
    }
}

impl PairingElement for NoGT {
    const KIND: ElementKind = ElementKind::PointGT;

    fn encode(&self) -> Vec<u8> {
        match *self {}
    }

    fn decode(_: &[u8]) -> Result<Self> {
        Err(Error::UnsupportedElement(Self::KIND))
    }
}

/// A prime-order group and its scalar field.
pub trait Suite:
    Copy + Clone + fmt::Debug + Default + PartialEq + Eq + Send + Sync + 'static
{
    /// Scalar field. Secret values of this type are wiped after use.
    type Scalar: PrimeField + Zeroize;

    /// Group of prime order `|Scalar|` (G1 of a pairing-friendly suite)
    type Point: Group<Scalar = Self::Scalar> + GroupEncoding;

    /// Second source group of the pairing
    type G2: PairingElement;

    /// Target group of the pairing
    type GT: PairingElement;

    /// Human readable suite name, recorded in persisted key shares
    const NAME: &'static str;

    /// Second generator `H` for Pedersen blinding, with unknown discrete log
    /// relative to the group generator.
    fn blinding_base() -> Result<Self::Point>;

    /// Standard generator `G`
    fn base() -> Self::Point {
        Self::Point::generator()
    }

    fn encode_scalar(scalar: &Self::Scalar) -> Vec<u8> {
        scalar.to_repr().as_ref().to_vec()
    }

    fn decode_scalar(bytes: &[u8]) -> Result<Self::Scalar> {
        let mut repr = <Self::Scalar as PrimeField>::Repr::default();
        if bytes.len() != repr.as_ref().len() {
            return Err(Error::Malformed(format!(
                "scalar length {} (expected {})",
                bytes.len(),
                repr.as_ref().len()
            )));
        }
        repr.as_mut().copy_from_slice(bytes);
        Option::from(Self::Scalar::from_repr(repr))
            .ok_or_else(|| Error::Malformed("non-canonical scalar".into()))
    }

    fn encode_point(point: &Self::Point) -> Vec<u8> {
        point.to_bytes().as_ref().to_vec()
    }

    fn decode_point(bytes: &[u8]) -> Result<Self::Point> {
        let mut repr = <Self::Point as GroupEncoding>::Repr::default();
        if bytes.len() != repr.as_ref().len() {
            return Err(Error::Malformed(format!(
                "point length {} (expected {})",
                bytes.len(),
                repr.as_ref().len()
            )));
        }
        repr.as_mut().copy_from_slice(bytes);
        Option::from(Self::Point::from_bytes(&repr))
            .ok_or_else(|| Error::Malformed("invalid point encoding".into()))
    }

    /// Decode an element of the given kind.
    fn decode_element(kind: ElementKind, bytes: &[u8]) -> Result<Element<Self>> {
        match kind {
            ElementKind::Scalar => Self::decode_scalar(bytes).map(Element::Scalar),
            ElementKind::PointG1 => Self::decode_point(bytes).map(Element::PointG1),
            ElementKind::PointG2 => Self::G2::decode(bytes).map(Element::PointG2),
            ElementKind::PointGT => Self::GT::decode(bytes).map(Element::PointGT),
        }
    }
}
