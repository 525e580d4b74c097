//! Domain/state layer for DMR-Nexus: peer registry, subscription state,
//! bridge router, subscriber-location table, muted-stream table, rejected-
//! origin table and the login-challenge helpers. No I/O: callers (the
//! `nexus-master`/`nexus-peer`/`nexus-openbridge` crates) own sockets and
//! sequencing; this crate owns the data and the pure decisions over it.

pub mod auth;
pub mod error;
pub mod location;
pub mod metrics;
pub mod peer;
pub mod rejected;
pub mod router;
pub mod streams;
pub mod subscription;

pub use error::{CoreError, CoreResult};
pub use location::SubscriberLocations;
pub use metrics::{Metrics, NoopMetrics};
pub use peer::{HandshakePhase, PeerConfig, PeerHandle, PeerRegistry, PeerState};
pub use rejected::RejectedOrigins;
pub use router::{BridgeRouter, BridgeRule, BridgeRuleConfig, ToType, Transitions};
pub use streams::MutedStreams;
pub use subscription::{Expiry, SubscriptionState};

/// Radio IDs with a special, non-talkgroup meaning at the routing layer
/// (§4.5 step 7).
pub mod special_tgid {
    /// Enables repeat-all mode on the keying peer; the triggering frame is
    /// never forwarded.
    pub const REPEAT_ALL_ON: u32 = 777;
    /// Disables repeat-all, clears dynamic subscriptions, and removes the
    /// peer from every dynamic bridge; the triggering frame is never
    /// forwarded.
    pub const DISCONNECT_ALL: u32 = 4000;
}
