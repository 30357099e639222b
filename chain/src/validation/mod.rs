//! Block validity checks.
//!
//! - [`single`]: per-block acceptance rules for an incoming
//!   `send`/`receive`/`open` request (what the StateMachine runs before
//!   appending anything).
//! - [`ledger`]: whole-ledger recursive re-verification from a cold
//!   store, independent of anything `BlockStore::head` currently says.
//! - [`error`]: the closed set of rejection reasons both share.

pub mod error;
pub mod ledger;
pub mod single;

pub use error::{RejectionReason, ValidationError};
pub use ledger::{LedgerVerifier, verify_ledger};
