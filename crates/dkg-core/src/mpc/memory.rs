//! In-process relay

use super::{async_trait, Relay};
use crate::{Error, PartyId, Result, SessionId};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

type Mailbox<K> = Arc<DashMap<K, Vec<Vec<u8>>>>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared in-memory mailboxes. Clones share the same state, so one relay
/// can be handed to every simulated party.
#[derive(Clone)]
pub struct MemoryRelay {
    /// (session_id, round) -> serialized broadcasts
    broadcasts: Mailbox<(SessionId, u32)>,
    /// (session_id, round, recipient) -> serialized direct messages
    directs: Mailbox<(SessionId, u32, PartyId)>,
    /// Wakes up collectors when anything is posted
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            broadcasts: Arc::new(DashMap::new()),
            directs: Arc::new(DashMap::new()),
            notify,
        }
    }

    fn post<K: Hash + Eq, T: Serialize>(
        &self,
        mailbox: &Mailbox<K>,
        key: K,
        message: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(message)?;
        mailbox.entry(key).or_default().push(bytes);
        // no subscriber is not an error
        let _ = self.notify.send(());
        Ok(())
    }

    async fn wait_for<K: Hash + Eq, T: DeserializeOwned>(
        &self,
        mailbox: &Mailbox<K>,
        key: K,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<T>> {
        let deadline = Instant::now() + timeout;
        let mut rx = self.notify.subscribe();
        loop {
            let available = mailbox.get(&key).map_or(0, |messages| messages.len());
            if available >= count || Instant::now() >= deadline {
                return Self::take(mailbox, &key, count);
            }

            tokio::select! {
                _ = rx.recv() => {}
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    fn take<K: Hash + Eq, T: DeserializeOwned>(
        mailbox: &Mailbox<K>,
        key: &K,
        count: usize,
    ) -> Result<Vec<T>> {
        let Some(messages) = mailbox.get(key) else {
            return Ok(Vec::new());
        };
        let decoded = messages
            .iter()
            .take(count)
            .map(|bytes| {
                serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
            })
            .collect::<Result<Vec<T>>>();
        decoded
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()> {
        self.post(&self.broadcasts, (*session_id, round), message)
    }

    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: PartyId,
        message: &T,
    ) -> Result<()> {
        self.post(&self.directs, (*session_id, round, to), message)
    }

    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<T>> {
        self.wait_for(&self.broadcasts, (*session_id, round), count, timeout)
            .await
    }

    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        my_id: PartyId,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<T>> {
        self.wait_for(&self.directs, (*session_id, round, my_id), count, timeout)
            .await
    }
}
