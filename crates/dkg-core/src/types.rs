//! Core types shared by the protocol layers

use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Position of a party in the ordered participant list
pub type PartyId = usize;

/// Unique identifier for a session
pub type SessionId = [u8; 32];

/// Configuration for one party's DKG session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identifier, shared by every party of the round
    pub session_id: SessionId,

    /// Number of parties
    pub n_parties: usize,

    /// Threshold (t-of-n)
    pub threshold: usize,

    /// This party's ID
    pub party_id: PartyId,

    /// Upper bound on waiting for any single round's messages
    #[serde(with = "duration_millis")]
    pub round_timeout: Duration,
}

impl SessionConfig {
    /// Create a new session configuration with a random session id and the
    /// default round timeout
    pub fn new(n_parties: usize, threshold: usize, party_id: PartyId) -> crate::Result<Self> {
        crate::error::check_threshold(threshold, n_parties)?;
        if party_id >= n_parties {
            return Err(crate::Error::InvalidConfig(format!(
                "party {party_id} outside of {n_parties} parties"
            )));
        }

        Ok(Self {
            session_id: rand::random(),
            n_parties,
            threshold,
            party_id,
            round_timeout: crate::DEFAULT_ROUND_TIMEOUT,
        })
    }

    /// Same session, seen by another party
    pub fn for_party(&self, party_id: PartyId) -> crate::Result<Self> {
        if party_id >= self.n_parties {
            return Err(crate::Error::InvalidConfig(format!(
                "party {party_id} outside of {} parties",
                self.n_parties
            )));
        }
        Ok(Self {
            party_id,
            ..self.clone()
        })
    }

    pub fn with_round_timeout(mut self, round_timeout: Duration) -> Self {
        self.round_timeout = round_timeout;
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Key share as persisted by a party after DKG. All group elements are hex
/// encoded with the suite's canonical encoding.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyShareFile {
    /// Algebra suite name
    pub suite: String,

    /// This party's ID
    pub party_id: PartyId,

    /// Threshold
    pub threshold: usize,

    /// This party's secret share
    pub private_share: String,

    /// Commitment to the joint polynomial, constant term first
    pub commitments: Vec<String>,

    /// Qualified dealers
    pub qualified: Vec<u32>,

    /// Participant public keys, in party order
    pub participants: Vec<String>,
}

impl std::fmt::Debug for KeyShareFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShareFile")
            .field("suite", &self.suite)
            .field("party_id", &self.party_id)
            .field("threshold", &self.threshold)
            .field("public_key", &self.public_key())
            .field("qualified", &self.qualified)
            .finish_non_exhaustive()
    }
}

impl KeyShareFile {
    /// Hex encoded joint public key
    pub fn public_key(&self) -> Option<&str> {
        self.commitments.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_validation() {
        let config = SessionConfig::new(5, 3, 4).unwrap();
        assert_eq!(config.round_timeout, crate::DEFAULT_ROUND_TIMEOUT);

        assert!(matches!(
            SessionConfig::new(3, 4, 0),
            Err(crate::Error::InvalidThreshold { .. })
        ));
        assert!(matches!(
            SessionConfig::new(3, 0, 0),
            Err(crate::Error::InvalidThreshold { .. })
        ));
        assert!(matches!(
            SessionConfig::new(3, 2, 3),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_for_party_keeps_session() {
        let config = SessionConfig::new(3, 2, 0)
            .unwrap()
            .with_round_timeout(Duration::from_millis(250));
        let other = config.for_party(2).unwrap();
        assert_eq!(other.session_id, config.session_id);
        assert_eq!(other.party_id, 2);
        assert_eq!(other.round_timeout, Duration::from_millis(250));
        assert!(config.for_party(3).is_err());
    }

    #[test]
    fn test_session_config_json() {
        let config = SessionConfig::new(3, 2, 1).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, config.session_id);
        assert_eq!(parsed.round_timeout, config.round_timeout);
    }
}
