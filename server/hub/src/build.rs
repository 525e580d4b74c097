use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use nexus_acl::Acl;
use nexus_config::{GlobalConfig, SystemConfig, SystemMode};
use nexus_master::MasterConfig;
use nexus_openbridge::OpenBridgeConfig;
use nexus_peer::PeerConfig;

/// `nexus-config::NexusConfig::validate` has already confirmed every ACL
/// string parses; re-parsing here can only fail if the document changed
/// out from under us between load and build, which `anyhow::Context`
/// reports as a bug rather than panicking the process.
fn resolve_acl(field: &str, text: &Option<String>) -> Result<Option<Acl>> {
    text.as_deref()
        .map(|s| Acl::parse(s).with_context(|| format!("re-parsing already-validated ACL {field}")))
        .transpose()
}

fn resolve_use_acl(system: &SystemConfig, global: &GlobalConfig, force_acl: bool) -> bool {
    force_acl || system.use_acl.unwrap_or(global.use_acl)
}

pub fn master_config(name: &str, system: &SystemConfig, global: &GlobalConfig, force_acl: bool) -> Result<MasterConfig> {
    let port = system.port.context("MASTER system missing port (should have failed validation)")?;
    Ok(MasterConfig {
        system_name: name.to_string(),
        bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        passphrase: system.passphrase.clone().unwrap_or_default(),
        repeat: system.repeat,
        max_peers: system.max_peers,
        use_acl: resolve_use_acl(system, global, force_acl),
        reg_acl: resolve_acl("reg_acl", &system.reg_acl)?,
        sub_acl: resolve_acl("sub_acl", &system.sub_acl)?,
        tg1_acl: resolve_acl("tg1_acl", &system.tg1_acl)?,
        tg2_acl: resolve_acl("tg2_acl", &system.tg2_acl)?,
        private_calls_enabled: system.private_calls_enabled.unwrap_or(global.private_calls_enabled),
        ping_timeout: global.ping_timeout(),
        cleanup_period: Duration::from_secs(global.cleanup_period_seconds),
        nak_cooldown: Duration::from_secs(global.nak_cooldown_seconds),
        dynamic_bridge_idle: Duration::from_secs(global.dynamic_bridge_idle_seconds),
    })
}

pub fn peer_config(name: &str, system: &SystemConfig, global: &GlobalConfig) -> Result<PeerConfig> {
    let master_ip = system.master_ip.as_deref().context("PEER system missing master_ip")?;
    let master_port = system.master_port.context("PEER system missing master_port")?;
    let master_addr: SocketAddr =
        format!("{master_ip}:{master_port}").parse().with_context(|| format!("system {name:?}: invalid master address"))?;
    let radio_id = system.radio_id.context("PEER system missing radio_id")?;
    let passphrase = system.passphrase.clone().unwrap_or_default();

    let mut cfg = PeerConfig::new(name, radio_id, master_addr, passphrase);
    cfg.ping_interval = Duration::from_secs(global.ping_time_seconds);
    cfg.ping_timeout = global.ping_timeout();
    Ok(cfg)
}

pub fn openbridge_config(name: &str, system: &SystemConfig) -> Result<OpenBridgeConfig> {
    let port = system.port.context("OPENBRIDGE system missing port")?;
    let target_ip = system.target_ip.as_deref().context("OPENBRIDGE system missing target_ip")?;
    let target_port = system.target_port.context("OPENBRIDGE system missing target_port")?;
    let remote_addr: SocketAddr =
        format!("{target_ip}:{target_port}").parse().with_context(|| format!("system {name:?}: invalid target address"))?;
    let network_id = system.network_id.context("OPENBRIDGE system missing network_id")?;
    let passphrase = system.passphrase.clone().context("OPENBRIDGE system missing passphrase")?;

    Ok(OpenBridgeConfig {
        system_name: name.to_string(),
        bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        remote_addr,
        passphrase,
        network_id,
        both_slots: system.both_slots,
    })
}

/// Every mode `nexus-config::SystemConfig` recognizes. Used only to assert
/// exhaustiveness at the call site; the actual dispatch lives in
/// `runtime::Hub::build`.
pub fn mode_name(mode: SystemMode) -> &'static str {
    match mode {
        SystemMode::Master => "MASTER",
        SystemMode::Peer => "PEER",
        SystemMode::OpenBridge => "OPENBRIDGE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_config::SystemConfig;

    fn base_system(mode: SystemMode) -> SystemConfig {
        SystemConfig {
            mode,
            port: None,
            passphrase: None,
            repeat: false,
            max_peers: None,
            master_ip: None,
            master_port: None,
            radio_id: None,
            target_ip: None,
            target_port: None,
            network_id: None,
            both_slots: true,
            use_acl: None,
            reg_acl: None,
            sub_acl: None,
            tg1_acl: None,
            tg2_acl: None,
            tg_acl: None,
            private_calls_enabled: None,
        }
    }

    #[test]
    fn builds_a_master_config_with_global_timing_defaults() {
        let mut sys = base_system(SystemMode::Master);
        sys.port = Some(62031);
        let global = GlobalConfig::default();
        let cfg = master_config("MASTER-A", &sys, &global, false).unwrap();
        assert_eq!(cfg.bind_addr.port(), 62031);
        assert_eq!(cfg.ping_timeout, Duration::from_secs(30));
    }

    #[test]
    fn force_acl_overrides_an_unset_global_default() {
        let sys = base_system(SystemMode::Master);
        let global = GlobalConfig::default();
        assert!(!resolve_use_acl(&sys, &global, false));
        assert!(resolve_use_acl(&sys, &global, true));
    }

    #[test]
    fn builds_a_peer_config_pointed_at_the_configured_master() {
        let mut sys = base_system(SystemMode::Peer);
        sys.master_ip = Some("10.0.0.5".into());
        sys.master_port = Some(62031);
        sys.radio_id = Some(312_001);
        sys.passphrase = Some("s3cret".into());
        let global = GlobalConfig::default();
        let cfg = peer_config("PEER-A", &sys, &global).unwrap();
        assert_eq!(cfg.repeater_id, 312_001);
        assert_eq!(cfg.master_addr, "10.0.0.5:62031".parse().unwrap());
    }

    #[test]
    fn builds_an_openbridge_config_with_both_slots_default() {
        let mut sys = base_system(SystemMode::OpenBridge);
        sys.port = Some(62044);
        sys.target_ip = Some("10.0.0.9".into());
        sys.target_port = Some(62045);
        sys.network_id = Some(312_999);
        sys.passphrase = Some("obpass".into());
        let cfg = openbridge_config("OB-A", &sys).unwrap();
        assert_eq!(cfg.network_id, 312_999);
        assert!(cfg.both_slots);
    }
}
