use std::net::SocketAddr;
use std::time::Duration;

use nexus_acl::Acl;

/// Everything the routing core needs from a `systems.<name>` entry with
/// `mode: MASTER`, already resolved out of the YAML document by
/// `nexus-config` / `nexus-hub`.
pub struct MasterConfig {
    /// This system's own configured name, excluded as a bridge-routing
    /// target so a frame never bridges back to its own source system.
    pub system_name: String,
    pub bind_addr: SocketAddr,
    pub passphrase: String,
    /// Unconditionally forwards every group frame to every other CONNECTED
    /// peer, on top of the ordinary static/dynamic target computation
    /// (§4.5 step 13).
    pub repeat: bool,
    /// §6 `max_peers`: caps the number of distinct repeater IDs this
    /// system will register at once. `None` means unlimited.
    pub max_peers: Option<usize>,
    pub use_acl: bool,
    pub reg_acl: Option<Acl>,
    pub sub_acl: Option<Acl>,
    pub tg1_acl: Option<Acl>,
    pub tg2_acl: Option<Acl>,
    pub private_calls_enabled: bool,
    pub ping_timeout: Duration,
    pub cleanup_period: Duration,
    pub nak_cooldown: Duration,
    pub dynamic_bridge_idle: Duration,
}

impl MasterConfig {
    /// `true` unless `use_acl` is set and the ACL in question denies `id`.
    fn admitted(acl: &Option<Acl>, use_acl: bool, id: u32) -> bool {
        if !use_acl {
            return true;
        }
        match acl {
            Some(acl) => acl.check(id),
            None => true,
        }
    }

    pub fn registration_admitted(&self, repeater_id: u32) -> bool {
        Self::admitted(&self.reg_acl, self.use_acl, repeater_id)
    }

    pub fn subscriber_admitted(&self, radio_id: u32) -> bool {
        Self::admitted(&self.sub_acl, self.use_acl, radio_id)
    }

    pub fn talkgroup_admitted(&self, tgid: u32, ts: nexus_wire::Timeslot) -> bool {
        let acl = match ts {
            nexus_wire::Timeslot::Ts1 => &self.tg1_acl,
            nexus_wire::Timeslot::Ts2 => &self.tg2_acl,
        };
        Self::admitted(acl, self.use_acl, tgid)
    }
}
