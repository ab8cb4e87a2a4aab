//! Message relay between DKG parties
//!
//! The protocol core never touches the network. The round driver in
//! [`crate::keygen`] moves serialized messages through a [`Relay`]: deals go
//! point-to-point, responses and justifications are broadcast.

use crate::{PartyId, Result, SessionId};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

pub use ::async_trait::async_trait;

/// Transport used by the round driver
#[async_trait]
pub trait Relay: Send + Sync {
    /// Publish a message to every party of the session
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()>;

    /// Send a message to a single party
    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()>;

    /// Wait until `count` broadcasts of `round` are available or `timeout`
    /// elapses, and return at most `count` of those received, in
    /// publication order
    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<T>>;

    /// Wait until `count` direct messages of `round` addressed to `my_id`
    /// are available or `timeout` elapses, and return those received
    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        my_id: PartyId,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<T>>;
}

/// In-process relay for tests and local simulation
pub mod memory;

pub use memory::MemoryRelay;
