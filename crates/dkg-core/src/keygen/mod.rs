//! Distributed Key Generation round driver
//!
//! Runs a [`crate::DistKeyGenerator`] to completion over a [`crate::mpc::Relay`]
//! in three rounds: deals, responses, justifications.

mod dkg;
mod messages;

pub use dkg::run_dkg;
pub use messages::*;
