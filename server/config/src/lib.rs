//! CLI flags (`clap`) and the YAML systems/bridges configuration document
//! (§6) for DMR-Nexus, with startup validation. Every failure here is a
//! §7 *config* error: fatal at startup, never recovered.

mod bridges;
mod cli;
mod error;
mod global;
mod system;

pub use bridges::BridgeRuleDoc;
pub use cli::Cli;
pub use error::{ConfigError, ConfigResult};
pub use global::GlobalConfig;
pub use system::{SystemConfig, SystemMode};

use std::collections::HashMap;
use std::path::Path;

use nexus_acl::Acl;
use nexus_core::router::BridgeRuleConfig;
use serde::{Deserialize, Serialize};

/// The full YAML document: global knobs, named systems, named bridges.
/// Mirrors §6's "Recognized configuration options" table and bridge-rule
/// schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NexusConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub systems: HashMap<String, SystemConfig>,
    #[serde(default)]
    pub bridges: HashMap<String, Vec<BridgeRuleDoc>>,
}

impl NexusConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let cfg: NexusConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_yaml_str(&text)
    }

    /// §6/§7: rejects any system entry whose `mode` is missing fields that
    /// mode requires, any ACL string that fails to parse, and any bridge
    /// rule naming an unconfigured system or violating §3's TGID/timeslot
    /// invariants.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, system) in &self.systems {
            match system.mode {
                SystemMode::Master => {
                    if system.port.is_none() {
                        return Err(ConfigError::MasterMissingPort { name: name.clone() });
                    }
                }
                SystemMode::Peer => {
                    if system.master_ip.is_none() || system.master_port.is_none() {
                        return Err(ConfigError::PeerMissingMasterAddress { name: name.clone() });
                    }
                    if system.radio_id.is_none() {
                        return Err(ConfigError::PeerMissingRadioId { name: name.clone() });
                    }
                }
                SystemMode::OpenBridge => {
                    if system.passphrase.is_none()
                        || system.target_ip.is_none()
                        || system.target_port.is_none()
                        || system.port.is_none()
                        || system.network_id.is_none()
                    {
                        return Err(ConfigError::OpenBridgeMissingFields { name: name.clone() });
                    }
                }
            }
            for (field, value) in [
                ("reg_acl", &system.reg_acl),
                ("sub_acl", &system.sub_acl),
                ("tg1_acl", &system.tg1_acl),
                ("tg2_acl", &system.tg2_acl),
                ("tg_acl", &system.tg_acl),
            ] {
                if let Some(text) = value {
                    Acl::parse(text).map_err(|source| ConfigError::Acl {
                        field: format!("systems.{name}.{field}"),
                        acl: text.clone(),
                        source,
                    })?;
                }
            }
        }

        for (bridge_name, rules) in &self.bridges {
            for rule in rules {
                if !self.systems.contains_key(&rule.system) {
                    return Err(ConfigError::UnknownBridgeSystem {
                        bridge: bridge_name.clone(),
                        system: rule.system.clone(),
                        tgid: rule.tgid,
                    });
                }
                rule.compile(bridge_name)?;
            }
        }
        Ok(())
    }

    /// Compiles the validated bridge document into the router's runtime
    /// rule representation.
    pub fn compiled_bridges(&self) -> ConfigResult<HashMap<String, Vec<BridgeRuleConfig>>> {
        self.bridges
            .iter()
            .map(|(name, rules)| -> ConfigResult<_> {
                let compiled = rules.iter().map(|r| r.compile(name)).collect::<ConfigResult<Vec<_>>>()?;
                Ok((name.clone(), compiled))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global:
  use_acl: true
systems:
  MASTER-A:
    mode: MASTER
    port: 62031
    reg_acl: "PERMIT:ALL"
  PEER-B:
    mode: PEER
    master_ip: "127.0.0.1"
    master_port: 62031
    radio_id: 312001
bridges:
  WORLD:
    - system: PEER-B
      tgid: 3100
      timeslot: 1
      active: true
"#;

    #[test]
    fn parses_and_validates_a_well_formed_document() {
        let cfg = NexusConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(cfg.global.use_acl);
        assert_eq!(cfg.systems.len(), 2);
        assert_eq!(cfg.bridges["WORLD"].len(), 1);
        assert!(cfg.compiled_bridges().is_ok());
    }

    #[test]
    fn master_without_port_is_rejected() {
        let yaml = "systems:\n  M:\n    mode: MASTER\n";
        assert!(matches!(
            NexusConfig::from_yaml_str(yaml),
            Err(ConfigError::MasterMissingPort { .. })
        ));
    }

    #[test]
    fn openbridge_without_passphrase_is_rejected() {
        let yaml = "systems:\n  O:\n    mode: OPENBRIDGE\n    target_ip: \"10.0.0.1\"\n    target_port: 62032\n";
        assert!(matches!(
            NexusConfig::from_yaml_str(yaml),
            Err(ConfigError::OpenBridgeMissingFields { .. })
        ));
    }

    #[test]
    fn openbridge_without_bind_port_is_rejected() {
        let yaml = "systems:\n  O:\n    mode: OPENBRIDGE\n    passphrase: \"x\"\n    target_ip: \"10.0.0.1\"\n    target_port: 62032\n";
        assert!(matches!(
            NexusConfig::from_yaml_str(yaml),
            Err(ConfigError::OpenBridgeMissingFields { .. })
        ));
    }

    #[test]
    fn bridge_rule_naming_unknown_system_is_rejected() {
        let yaml = r#"
systems:
  MASTER-A:
    mode: MASTER
    port: 62031
bridges:
  WORLD:
    - system: GHOST
      tgid: 1
      timeslot: 1
"#;
        assert!(matches!(
            NexusConfig::from_yaml_str(yaml),
            Err(ConfigError::UnknownBridgeSystem { .. })
        ));
    }

    #[test]
    fn invalid_acl_string_is_rejected() {
        let yaml = "systems:\n  M:\n    mode: MASTER\n    port: 62031\n    reg_acl: \"NOPE\"\n";
        assert!(matches!(NexusConfig::from_yaml_str(yaml), Err(ConfigError::Acl { .. })));
    }
}
