//! §4.5 MASTER UDP server: handshake dispatch, the group/private-call
//! routing pipeline, and the periodic cleanup loop. Binds the `nexus-core`
//! registry/router/tables together behind one socket per configured
//! `mode: MASTER` system; `nexus-hub` owns the process-level wiring across
//! systems.

mod cleanup;
mod forwarder;
mod handshake;
mod routing;

pub mod config;
pub mod error;
pub mod server;

pub use config::MasterConfig;
pub use error::{MasterError, MasterResult};
pub use forwarder::{NoopSystemForwarder, SystemForwarder};
pub use server::MasterServer;
