use serde::{Deserialize, Serialize};

/// §6 "Recognized configuration options", the `global.*` subset, plus the
/// §5 timing knobs the spec calls out as configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub ping_time_seconds: u64,
    pub max_missed: u32,
    pub use_acl: bool,
    pub private_calls_enabled: bool,
    pub cleanup_period_seconds: u64,
    pub nak_cooldown_seconds: u64,
    pub mute_window_seconds: u64,
    pub subscriber_location_ttl_seconds: u64,
    pub dynamic_bridge_idle_seconds: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            ping_time_seconds: 5,
            max_missed: 6, // 6 * 5s ~= the 30s ping timeout below
            use_acl: false,
            private_calls_enabled: true,
            cleanup_period_seconds: 10,
            nak_cooldown_seconds: 5,
            mute_window_seconds: 2,
            subscriber_location_ttl_seconds: 15 * 60,
            dynamic_bridge_idle_seconds: 5 * 60,
        }
    }
}

impl GlobalConfig {
    /// `max_missed` pings at `ping_time_seconds` apart: the peer is reaped
    /// once its last activity is older than this.
    pub fn ping_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ping_time_seconds * self.max_missed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_timings() {
        let g = GlobalConfig::default();
        assert_eq!(g.cleanup_period_seconds, 10);
        assert_eq!(g.nak_cooldown_seconds, 5);
        assert_eq!(g.mute_window_seconds, 2);
        assert_eq!(g.subscriber_location_ttl_seconds, 900);
        assert_eq!(g.dynamic_bridge_idle_seconds, 300);
        assert_eq!(g.ping_timeout(), std::time::Duration::from_secs(30));
    }
}
