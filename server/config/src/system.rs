use serde::{Deserialize, Serialize};

/// Which of the three wire dialects (§2) a configured system speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemMode {
    Master,
    Peer,
    #[serde(rename = "OPENBRIDGE")]
    OpenBridge,
}

fn default_both_slots() -> bool {
    true
}

/// One `systems.<name>` entry (§6 "Recognized configuration options").
/// Fields irrelevant to a given `mode` are simply left `None`; validation
/// (`NexusConfig::validate`) rejects a system missing a field its mode
/// requires. `mode` itself has no default: a system missing it is a YAML
/// parse error, which is already fatal (§7 *config*).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub mode: SystemMode,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub max_peers: Option<usize>,
    #[serde(default)]
    pub master_ip: Option<String>,
    #[serde(default)]
    pub master_port: Option<u16>,
    #[serde(default)]
    pub radio_id: Option<u32>,
    #[serde(default)]
    pub target_ip: Option<String>,
    #[serde(default)]
    pub target_port: Option<u16>,
    #[serde(default)]
    pub network_id: Option<u32>,
    #[serde(default = "default_both_slots")]
    pub both_slots: bool,
    #[serde(default)]
    pub use_acl: Option<bool>,
    #[serde(default)]
    pub reg_acl: Option<String>,
    #[serde(default)]
    pub sub_acl: Option<String>,
    #[serde(default)]
    pub tg1_acl: Option<String>,
    #[serde(default)]
    pub tg2_acl: Option<String>,
    #[serde(default)]
    pub tg_acl: Option<String>,
    #[serde(default)]
    pub private_calls_enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_master_system_deserializes_with_defaults() {
        let yaml = "mode: MASTER\nport: 62031\n";
        let cfg: SystemConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.mode, SystemMode::Master);
        assert_eq!(cfg.port, Some(62031));
        assert!(cfg.both_slots);
        assert!(cfg.passphrase.is_none());
    }

    #[test]
    fn mode_is_required() {
        let yaml = "port: 62031\n";
        assert!(serde_yaml::from_str::<SystemConfig>(yaml).is_err());
    }
}
