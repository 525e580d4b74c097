//! §4.7 PEER client: the symmetric endpoint that initiates a handshake to
//! a remote MASTER, pumps keepalives, and exposes send/receive callbacks
//! for DMR frames. This is the interface the YSF transcoder bridge (out of
//! scope, spec.md §1) consumes to reach the core: it looks like any other
//! repeater from the MASTER's point of view.

mod client;
pub mod config;
pub mod error;
mod sink;

pub use client::PeerClient;
pub use config::PeerConfig;
pub use error::{PeerError, PeerResult};
pub use sink::{DmrdSink, NoopDmrdSink};
