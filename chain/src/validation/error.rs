//! Validation failure taxonomy.
//!
//! `RejectionReason` is the closed set of reasons the external request
//! router is allowed to surface back to a client; it doubles as the
//! internal verdict for whole-ledger re-verification so there is only
//! one vocabulary for "why did this block not stick" across both entry
//! points.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionReason {
    AddressNonExistent,
    Signature,
    SendSignature,
    InvalidBalance,
    InvalidPrevious,
    Balance,
    DoubleReceive,
    #[serde(rename = "unknown request")]
    UnknownRequest,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::AddressNonExistent => "addressNonExistent",
            RejectionReason::Signature => "signature",
            RejectionReason::SendSignature => "sendSignature",
            RejectionReason::InvalidBalance => "invalidBalance",
            RejectionReason::InvalidPrevious => "invalidPrevious",
            RejectionReason::Balance => "balance",
            RejectionReason::DoubleReceive => "doubleReceive",
            RejectionReason::UnknownRequest => "unknown request",
        };
        f.write_str(s)
    }
}

/// A single-block or whole-ledger validation failure.
#[derive(Debug)]
pub struct ValidationError {
    pub reason: RejectionReason,
    pub detail: String,
}

impl ValidationError {
    pub fn new(reason: RejectionReason, detail: impl Into<String>) -> Self {
        ValidationError {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

impl std::error::Error for ValidationError {}
