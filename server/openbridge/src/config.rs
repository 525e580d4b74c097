use std::net::SocketAddr;

/// Everything an OpenBridge endpoint needs for one `systems.<name>` entry
/// with `mode: OPENBRIDGE`, already resolved out of the YAML document by
/// `nexus-config` / `nexus-hub`.
#[derive(Clone, Debug)]
pub struct OpenBridgeConfig {
    pub system_name: String,
    pub bind_addr: SocketAddr,
    pub remote_addr: SocketAddr,
    pub passphrase: String,
    /// Repeater-ID field this endpoint stamps into every frame it signs
    /// and sends (§4.8 egress).
    pub network_id: u32,
    /// When `false`, TS2 group calls are not forwarded in either
    /// direction; private calls and TS1 traffic are always forwarded
    /// regardless of this flag (§4.8).
    pub both_slots: bool,
}
