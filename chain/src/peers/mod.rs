//! Peer discovery, liveness, and `watchForSends` fan-out.

pub mod registry;
pub mod subscriptions;

pub use registry::{PeerLink, PeerRegistry, WsPeerLink};
pub use subscriptions::Subscriptions;
