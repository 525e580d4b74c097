use std::net::SocketAddr;
use std::time::Duration;

use nexus_wire::RptcConfig;

/// Everything the PEER client needs for one `systems.<name>` entry with
/// `mode: PEER`, already resolved out of the YAML document by
/// `nexus-config` / `nexus-hub`.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    pub system_name: String,
    pub repeater_id: u32,
    pub master_addr: SocketAddr,
    pub passphrase: String,
    pub callsign: String,
    pub rx_freq: String,
    pub tx_freq: String,
    pub tx_power: String,
    pub color_code: String,
    pub lat: String,
    pub lon: String,
    pub height: String,
    pub location: String,
    pub description: String,
    pub slots: String,
    pub url: String,
    pub software: String,
    pub package: String,
    /// §5: ping interval, 5 s default.
    pub ping_interval: Duration,
    /// §5: the master is considered lost once this long has passed with no
    /// pong; default is three missed pings.
    pub ping_timeout: Duration,
    /// How long to wait for a reply before retransmitting a handshake
    /// message (§5: "Handshake reads on the PEER client use 5 s
    /// deadlines").
    pub retry_interval: Duration,
    /// Total time budget across every retransmit of one handshake step
    /// before giving up.
    pub handshake_timeout: Duration,
}

impl PeerConfig {
    pub fn new(system_name: impl Into<String>, repeater_id: u32, master_addr: SocketAddr, passphrase: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            repeater_id,
            master_addr,
            passphrase: passphrase.into(),
            callsign: String::new(),
            rx_freq: "000000000".into(),
            tx_freq: "000000000".into(),
            tx_power: "00".into(),
            color_code: "01".into(),
            lat: "0.0000".into(),
            lon: "0.00000".into(),
            height: "0".into(),
            location: String::new(),
            description: String::new(),
            slots: "0".into(),
            url: String::new(),
            software: "nexus-peer".into(),
            package: env!("CARGO_PKG_VERSION").into(),
            ping_interval: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(15),
            retry_interval: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(30),
        }
    }

    /// Renders the fixed-width RPTC record this peer announces on connect.
    pub fn to_rptc_config(&self) -> RptcConfig {
        RptcConfig {
            callsign: self.callsign.clone(),
            rx_freq: self.rx_freq.clone(),
            tx_freq: self.tx_freq.clone(),
            tx_power: self.tx_power.clone(),
            color_code: self.color_code.clone(),
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            height: self.height.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            slots: self.slots.clone(),
            url: self.url.clone(),
            software: self.software.clone(),
            package: self.package.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_timings() {
        let cfg = PeerConfig::new("PEER-A", 312_001, "127.0.0.1:62031".parse().unwrap(), "secret");
        assert_eq!(cfg.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.retry_interval, Duration::from_secs(5));
    }

    #[test]
    fn to_rptc_config_carries_every_field_through() {
        let mut cfg = PeerConfig::new("PEER-A", 1, "127.0.0.1:1".parse().unwrap(), "x");
        cfg.callsign = "W1ABC".into();
        cfg.description = "OPTIONS:TS1=3100".into();
        let record = cfg.to_rptc_config();
        assert_eq!(record.callsign, "W1ABC");
        assert_eq!(record.description, "OPTIONS:TS1=3100");
    }
}
