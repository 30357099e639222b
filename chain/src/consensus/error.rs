use std::fmt;

use crate::crypto::CryptoError;
use crate::validation::error::ValidationError;

/// High-level errors that can occur while running a vote round.
#[derive(Debug)]
pub enum ConsensusError {
    /// The subject block itself failed validation.
    Validation(ValidationError),
    /// Signing or verifying a vote packet failed.
    Crypto(CryptoError),
    /// No vote round exists for the given `voteID`.
    UnknownRound(String),
    /// Catch-all for peer I/O and other transport faults.
    Other(String),
}

impl From<ValidationError> for ConsensusError {
    fn from(e: ValidationError) -> Self {
        ConsensusError::Validation(e)
    }
}

impl From<CryptoError> for ConsensusError {
    fn from(e: CryptoError) -> Self {
        ConsensusError::Crypto(e)
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::Validation(e) => write!(f, "{e}"),
            ConsensusError::Crypto(e) => write!(f, "{e}"),
            ConsensusError::UnknownRound(id) => write!(f, "no such vote round: {id}"),
            ConsensusError::Other(msg) => write!(f, "consensus error: {msg}"),
        }
    }
}

impl std::error::Error for ConsensusError {}
