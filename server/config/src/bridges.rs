use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use nexus_core::router::{BridgeRuleConfig, ToType};
use nexus_wire::Timeslot;

use crate::error::ConfigError;

/// One YAML entry of a `bridges.<name>` list (§6 bridge-rule configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRuleDoc {
    pub system: String,
    pub tgid: u32,
    pub timeslot: u8,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub on: Vec<u32>,
    #[serde(default)]
    pub off: Vec<u32>,
    #[serde(default)]
    pub timeout_minutes: u32,
    /// `"ON"`, `"OFF"`, or absent/empty — the rule's initial activation
    /// state as the original textual bridge-rule format encodes it.
    #[serde(default)]
    pub to_type: Option<String>,
}

impl BridgeRuleDoc {
    /// §3 Bridge Rule invariants: `timeslot ∈ {1,2}`, `TGID > 0`, and
    /// `system-name` must resolve to a known system (checked by the
    /// caller, which has the full systems map).
    pub fn compile(&self, bridge_name: &str) -> Result<BridgeRuleConfig, ConfigError> {
        if self.tgid == 0 {
            return Err(ConfigError::BadTgid { bridge: bridge_name.to_string() });
        }
        let timeslot = match self.timeslot {
            1 => Timeslot::Ts1,
            2 => Timeslot::Ts2,
            other => return Err(ConfigError::BadTimeslot { bridge: bridge_name.to_string(), timeslot: other }),
        };
        let to_type = match self.to_type.as_deref() {
            Some(s) if s.eq_ignore_ascii_case("ON") => ToType::On,
            Some(s) if s.eq_ignore_ascii_case("OFF") => ToType::Off,
            _ => ToType::Unspecified,
        };
        Ok(BridgeRuleConfig {
            system_name: self.system.clone(),
            tgid: self.tgid,
            timeslot,
            active: self.active,
            activate_on: self.on.iter().copied().collect::<HashSet<u32>>(),
            deactivate_on: self.off.iter().copied().collect::<HashSet<u32>>(),
            to_type,
            timeout_minutes: self.timeout_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_tgid() {
        let doc = BridgeRuleDoc {
            system: "PEER-B".into(),
            tgid: 0,
            timeslot: 1,
            active: false,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
            to_type: None,
        };
        assert!(matches!(doc.compile("WORLD"), Err(ConfigError::BadTgid { .. })));
    }

    #[test]
    fn rejects_bad_timeslot() {
        let doc = BridgeRuleDoc {
            system: "PEER-B".into(),
            tgid: 9,
            timeslot: 3,
            active: false,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
            to_type: None,
        };
        assert!(matches!(doc.compile("WORLD"), Err(ConfigError::BadTimeslot { .. })));
    }

    #[test]
    fn to_type_overrides_active_flag() {
        let doc = BridgeRuleDoc {
            system: "PEER-B".into(),
            tgid: 9,
            timeslot: 1,
            active: false,
            on: vec![],
            off: vec![],
            timeout_minutes: 0,
            to_type: Some("on".into()),
        };
        let compiled = doc.compile("WORLD").unwrap();
        assert_eq!(compiled.to_type, ToType::On);
    }
}
