//! §4.8 OpenBridge endpoint: a stateless, symmetric interconnect carrying
//! only DMRD frames, each signed with an HMAC-SHA1 trailer keyed by a
//! shared passphrase. No handshake exists in this dialect: every packet
//! stands on its own.

mod config;
mod endpoint;
mod error;
mod hmac;
mod sink;

pub use config::OpenBridgeConfig;
pub use endpoint::OpenBridgeEndpoint;
pub use error::{OpenBridgeError, OpenBridgeResult};
pub use sink::{DmrdSink, NoopDmrdSink};
