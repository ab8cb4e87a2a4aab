//! # DKG Core
//!
//! Threshold key establishment over a generic prime-order group.
//!
//! This crate provides:
//! - Verifiable Secret Sharing (Pedersen-blinded Feldman VSS with a
//!   complaint/justification round)
//! - Distributed Key Generation built from `n` parallel VSS sessions
//! - A message relay abstraction and an async round driver
//!
//! ## Protocol Overview
//!
//! Each participant acts as a dealer: it commits to a random polynomial,
//! sends every participant an encrypted, signed share, and answers
//! complaints by revealing the contested share. Dealers whose session is
//! certified form the qualified set. The joint public key is the sum of
//! their commitments; each private key share is the sum of the shares a
//! participant received from them. No participant ever learns the joint
//! private key.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dkg_core::{algebra::Secp256k1, keygen, mpc::MemoryRelay, SessionConfig};
//!
//! let config = SessionConfig::new(5, 3, my_id)?;
//! let key_share = keygen::run_dkg::<Secp256k1, _>(&config, &long_term, &participants, &relay).await?;
//! ```

pub mod algebra;
pub mod dkg;
pub mod error;
pub mod identity;
pub mod keygen;
pub mod mpc;
pub mod poly;
pub mod types;
pub mod vss;

pub use dkg::{DistKeyGenerator, DistKeyShare, DkgOptions};
pub use error::{Error, Result};
pub use identity::LongTermKey;
pub use types::{KeyShareFile, PartyId, SessionConfig, SessionId};

use std::time::Duration;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for a 3-party setup
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default number of parties
pub const DEFAULT_PARTIES: usize = 3;

/// Default bound on waiting for a single round's messages
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(30);
