use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use nexus_wire::Timeslot;

/// Textual ON/OFF/unspecified tag a bridge-rule config entry carries for its
/// initial activation state (§3 Bridge Rule `to-type`). Purely a load-time
/// default; once loaded, `BridgeRule::active` is the live state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToType {
    On,
    Off,
    Unspecified,
}

/// One static bridge rule as loaded from configuration.
#[derive(Clone, Debug)]
pub struct BridgeRuleConfig {
    pub system_name: String,
    pub tgid: u32,
    pub timeslot: Timeslot,
    pub active: bool,
    pub activate_on: HashSet<u32>,
    pub deactivate_on: HashSet<u32>,
    pub to_type: ToType,
    pub timeout_minutes: u32,
}

/// Live state of a loaded bridge rule. Identity (`system_name`, `tgid`,
/// `timeslot`) is immutable after load; `active` and `last_activated` are
/// the only fields mutation ever touches (§4.6: "the static table is
/// immutable after load; mutation touches only the `active` flag").
pub struct BridgeRule {
    pub system_name: String,
    pub tgid: u32,
    pub timeslot: Timeslot,
    pub activate_on: HashSet<u32>,
    pub deactivate_on: HashSet<u32>,
    pub timeout: Duration,
    active: RwLock<bool>,
    last_activated: RwLock<Instant>,
}

impl BridgeRule {
    fn from_config(cfg: &BridgeRuleConfig) -> Self {
        let active = match cfg.to_type {
            ToType::On => true,
            ToType::Off => false,
            ToType::Unspecified => cfg.active,
        };
        Self {
            system_name: cfg.system_name.clone(),
            tgid: cfg.tgid,
            timeslot: cfg.timeslot,
            activate_on: cfg.activate_on.clone(),
            deactivate_on: cfg.deactivate_on.clone(),
            timeout: Duration::from_secs(cfg.timeout_minutes as u64 * 60),
            active: RwLock::new(active),
            last_activated: RwLock::new(Instant::now()),
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    fn activate(&self) {
        *self.active.write() = true;
        *self.last_activated.write() = Instant::now();
    }

    fn deactivate(&self) {
        *self.active.write() = false;
    }

    fn idle_timeout_elapsed(&self) -> bool {
        self.timeout > Duration::ZERO && self.last_activated.read().elapsed() > self.timeout
    }
}

/// Per-talkgroup conference auto-created when a peer keys up a TG with no
/// matching static rule (§3 Dynamic Bridge). Tracks idle time and its own
/// subscriber set for housekeeping; the live routing decision (§4.5 step
/// 12) is made directly off peer subscription state, not this set.
struct DynamicBridge {
    last_activity: Instant,
    subscribers: HashSet<u32>,
}

impl DynamicBridge {
    fn new() -> Self {
        Self { last_activity: Instant::now(), subscribers: HashSet::new() }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// A named, ordered transition report: which rules of a bridge flipped
/// active/inactive as a result of one activation/deactivation trigger.
pub type Transitions = HashMap<String, Vec<(u32, Timeslot)>>;

/// Holds the immutable static bridge table plus the auto-created dynamic
/// bridge table, and answers routing/activation queries against both.
pub struct BridgeRouter {
    /// bridge name -> rules
    bridges: HashMap<String, Vec<BridgeRule>>,
    /// destination TGID -> rules naming that TGID, across all bridges
    by_tgid: HashMap<u32, Vec<(String, usize)>>,
    /// trigger TGID -> rules to activate when that TGID is keyed
    activation_index: HashMap<u32, Vec<(String, usize)>>,
    /// trigger TGID -> rules to deactivate when that TGID is keyed
    deactivation_index: HashMap<u32, Vec<(String, usize)>>,
    dynamic: RwLock<HashMap<u32, DynamicBridge>>,
}

impl BridgeRouter {
    pub fn new(bridges: HashMap<String, Vec<BridgeRuleConfig>>) -> Self {
        let mut compiled: HashMap<String, Vec<BridgeRule>> = HashMap::new();
        let mut by_tgid: HashMap<u32, Vec<(String, usize)>> = HashMap::new();
        let mut activation_index: HashMap<u32, Vec<(String, usize)>> = HashMap::new();
        let mut deactivation_index: HashMap<u32, Vec<(String, usize)>> = HashMap::new();

        for (name, rules) in &bridges {
            let mut live = Vec::with_capacity(rules.len());
            for (idx, cfg) in rules.iter().enumerate() {
                by_tgid.entry(cfg.tgid).or_default().push((name.clone(), idx));
                for tg in &cfg.activate_on {
                    activation_index.entry(*tg).or_default().push((name.clone(), idx));
                }
                for tg in &cfg.deactivate_on {
                    deactivation_index.entry(*tg).or_default().push((name.clone(), idx));
                }
                live.push(BridgeRule::from_config(cfg));
            }
            compiled.insert(name.clone(), live);
        }

        Self { bridges: compiled, by_tgid, activation_index, deactivation_index, dynamic: RwLock::new(HashMap::new()) }
    }

    fn rule(&self, name: &str, idx: usize) -> &BridgeRule {
        &self.bridges[name][idx]
    }

    /// §4.6 `routePacket` / §4.5 step 12 static half: every active rule for
    /// `dest_tgid` whose system differs from the source's, naming that
    /// rule's destination system.
    pub fn route_packet(&self, dest_tgid: u32, source_system: &str) -> Vec<String> {
        let Some(candidates) = self.by_tgid.get(&dest_tgid) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter(|(name, idx)| {
                let rule = self.rule(name, *idx);
                rule.is_active() && rule.system_name != source_system
            })
            .map(|(name, idx)| self.rule(name, *idx).system_name.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect()
    }

    /// Activates every rule whose `activate_on` contains `tgid`. Returns the
    /// transitions actually made (rules already active are not reported).
    pub fn process_activation(&self, tgid: u32) -> Transitions {
        let mut transitions = Transitions::new();
        let Some(targets) = self.activation_index.get(&tgid) else {
            return transitions;
        };
        for (name, idx) in targets {
            let rule = self.rule(name, *idx);
            if !rule.is_active() {
                rule.activate();
                transitions.entry(name.clone()).or_default().push((rule.tgid, rule.timeslot));
            } else {
                rule.activate(); // re-arm the idle timer even if already active
            }
        }
        transitions
    }

    /// Deactivates every rule whose `deactivate_on` contains `tgid`.
    /// Returns the transitions actually made.
    pub fn process_deactivation(&self, tgid: u32) -> Transitions {
        let mut transitions = Transitions::new();
        let Some(targets) = self.deactivation_index.get(&tgid) else {
            return transitions;
        };
        for (name, idx) in targets {
            let rule = self.rule(name, *idx);
            if rule.is_active() {
                rule.deactivate();
                transitions.entry(name.clone()).or_default().push((rule.tgid, rule.timeslot));
            }
        }
        transitions
    }

    /// Reactivates any rule whose idle timer has lapsed since it last
    /// activated (§4.6 "deactivate a rule automatically after inactivity").
    pub fn deactivate_timed_out_rules(&self) -> Transitions {
        let mut transitions = Transitions::new();
        for (name, rules) in &self.bridges {
            for rule in rules {
                if rule.is_active() && rule.idle_timeout_elapsed() {
                    rule.deactivate();
                    transitions.entry(name.clone()).or_default().push((rule.tgid, rule.timeslot));
                }
            }
        }
        transitions
    }

    /// Touches (or creates) the dynamic bridge for `tgid` and records
    /// `peer_id` as one of its subscribers.
    pub fn touch_dynamic_bridge(&self, tgid: u32, peer_id: u32) {
        let mut dyn_bridges = self.dynamic.write();
        let bridge = dyn_bridges.entry(tgid).or_insert_with(DynamicBridge::new);
        bridge.touch();
        bridge.subscribers.insert(peer_id);
    }

    pub fn has_dynamic_bridge(&self, tgid: u32) -> bool {
        self.dynamic.read().contains_key(&tgid)
    }

    /// Removes `peer_id` from every dynamic bridge's subscriber set
    /// (§4.5 TG 4000 handling; also called on peer removal). Returns how
    /// many bridges the peer was removed from.
    pub fn remove_subscriber_from_all_dynamic_bridges(&self, peer_id: u32) -> usize {
        let mut count = 0;
        for bridge in self.dynamic.write().values_mut() {
            if bridge.subscribers.remove(&peer_id) {
                count += 1;
            }
        }
        count
    }

    /// Removes dynamic bridges idle at least `idle_window` with zero
    /// subscribers, per an externally-injected subscriber count (so the
    /// router doesn't need to know about the peer registry's internals).
    /// Returns how many were removed.
    pub fn cleanup_inactive_dynamic_bridges(
        &self,
        idle_window: Duration,
        count_subscribers_for: impl Fn(u32) -> usize,
    ) -> usize {
        let mut dyn_bridges = self.dynamic.write();
        let stale: Vec<u32> = dyn_bridges
            .iter()
            .filter(|(tgid, b)| b.last_activity.elapsed() >= idle_window && count_subscribers_for(**tgid) == 0)
            .map(|(tgid, _)| *tgid)
            .collect();
        for tgid in &stale {
            dyn_bridges.remove(tgid);
        }
        stale.len()
    }

    pub fn dynamic_bridge_count(&self) -> usize {
        self.dynamic.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(system: &str, tgid: u32, on: &[u32], off: &[u32], active: bool) -> BridgeRuleConfig {
        BridgeRuleConfig {
            system_name: system.to_string(),
            tgid,
            timeslot: Timeslot::Ts1,
            active,
            activate_on: on.iter().copied().collect(),
            deactivate_on: off.iter().copied().collect(),
            to_type: ToType::Unspecified,
            timeout_minutes: 0,
        }
    }

    #[test]
    fn inactive_rule_is_not_a_routing_target() {
        let mut bridges = HashMap::new();
        bridges.insert("WORLD".to_string(), vec![rule("PEER-B", 3100, &[], &[], false)]);
        let router = BridgeRouter::new(bridges);
        assert!(router.route_packet(3100, "PEER-A").is_empty());
    }

    #[test]
    fn active_rule_routes_to_its_system_except_the_source() {
        let mut bridges = HashMap::new();
        bridges.insert("WORLD".to_string(), vec![rule("PEER-B", 3100, &[], &[], true)]);
        let router = BridgeRouter::new(bridges);
        assert_eq!(router.route_packet(3100, "PEER-A"), vec!["PEER-B".to_string()]);
        assert!(router.route_packet(3100, "PEER-B").is_empty(), "never route back to the source system");
    }

    #[test]
    fn activation_trigger_flips_only_matching_rules_and_reports_transition() {
        let mut bridges = HashMap::new();
        bridges.insert("WORLD".to_string(), vec![rule("PEER-B", 3100, &[9], &[], false)]);
        let router = BridgeRouter::new(bridges);

        let transitions = router.process_activation(9);
        assert_eq!(transitions.get("WORLD"), Some(&vec![(3100, Timeslot::Ts1)]));
        assert!(router.route_packet(3100, "PEER-A").contains(&"PEER-B".to_string()));
    }

    #[test]
    fn deactivation_trigger_flips_only_active_rules() {
        let mut bridges = HashMap::new();
        bridges.insert("WORLD".to_string(), vec![rule("PEER-B", 3100, &[], &[8], true)]);
        let router = BridgeRouter::new(bridges);

        let transitions = router.process_deactivation(8);
        assert_eq!(transitions.get("WORLD"), Some(&vec![(3100, Timeslot::Ts1)]));
        assert!(router.route_packet(3100, "PEER-A").is_empty());

        // Second deactivation of an already-inactive rule reports nothing.
        assert!(router.process_deactivation(8).is_empty());
    }

    #[test]
    fn idle_timeout_deactivates_stale_active_rule() {
        let mut bridges = HashMap::new();
        let mut r = rule("PEER-B", 3100, &[], &[], true);
        r.timeout_minutes = 0;
        bridges.insert("WORLD".to_string(), vec![r]);
        let router = BridgeRouter::new(bridges);
        // timeout_minutes=0 means no timer (never auto-deactivates).
        assert!(router.deactivate_timed_out_rules().is_empty());
    }

    #[test]
    fn dynamic_bridge_lifecycle() {
        let router = BridgeRouter::new(HashMap::new());
        assert!(!router.has_dynamic_bridge(3100));
        router.touch_dynamic_bridge(3100, 1);
        assert!(router.has_dynamic_bridge(3100));

        assert_eq!(router.remove_subscriber_from_all_dynamic_bridges(1), 1);
        let removed = router.cleanup_inactive_dynamic_bridges(Duration::ZERO, |_| 0);
        assert_eq!(removed, 1);
        assert!(!router.has_dynamic_bridge(3100));
    }

    #[test]
    fn cleanup_spares_bridges_with_subscribers() {
        let router = BridgeRouter::new(HashMap::new());
        router.touch_dynamic_bridge(3100, 1);
        let removed = router.cleanup_inactive_dynamic_bridges(Duration::ZERO, |_| 1);
        assert_eq!(removed, 0);
        assert!(router.has_dynamic_bridge(3100));
    }
}
