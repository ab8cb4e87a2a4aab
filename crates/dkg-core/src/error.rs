//! Error types for VSS and DKG operations

use crate::algebra::ElementKind;
use thiserror::Error;

/// Result type alias for VSS and DKG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during VSS or DKG protocol execution
#[derive(Debug, Error)]
pub enum Error {
    /// Threshold outside `1..=n`
    #[error("Invalid threshold: {threshold} for {n_parties} parties")]
    InvalidThreshold { threshold: usize, n_parties: usize },

    /// Invalid component configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Message index outside the participant range
    #[error("Unknown sender: index {0}")]
    UnknownSender(u32),

    /// A response conflicting with an already recorded one
    #[error("Conflicting response from index {0}")]
    DuplicateResponse(u32),

    /// A second deal for a session that already has one
    #[error("Deal already processed")]
    DuplicateDeal,

    /// Message does not bind to the known commitments
    #[error("Session identifier mismatch")]
    SessionMismatch,

    /// A revealed deal does not match the dealer's commitments
    #[error("Deal verification failed: {0}")]
    DealVerificationFailed(String),

    /// Justification for a verifier that did not complain
    #[error("No complaint recorded from index {0}")]
    NoComplaint(u32),

    /// Not enough shares for interpolation
    #[error("Insufficient shares: required {required}, got {actual}")]
    InsufficientShares { required: usize, actual: usize },

    /// Qualified set below threshold; the round must be restarted
    #[error("Insufficient qualified set: required {required}, got {actual}")]
    InsufficientQualifiedSet { required: usize, actual: usize },

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Structurally malformed message
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Element kind not provided by the algebra suite
    #[error("Unsupported element kind: {0:?}")]
    UnsupportedElement(ElementKind),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Timeout waiting for message
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Checks `1 <= threshold <= n_parties`.
pub(crate) fn check_threshold(threshold: usize, n_parties: usize) -> Result<()> {
    if threshold < 1 || threshold > n_parties {
        return Err(Error::InvalidThreshold {
            threshold,
            n_parties,
        });
    }
    Ok(())
}
