use std::collections::HashMap;
use std::time::{Duration, Instant};

use nexus_wire::{OptionsDirective, Timeslot, DEFAULT_AUTO_TTL_SECONDS};

/// How long a talkgroup stays subscribed on a slot. A tagged union rather
/// than a sentinel TTL so "never expires" can't be confused with "expires
/// at the zero instant".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    /// Declared via an OPTIONS `TS1=`/`TS2=` static list; cleared only by a
    /// later OPTIONS directive that redeclares or unlinks that slot.
    Static,
    /// Dynamically activated with auto-TTL configured to 0: never expires
    /// until `DROP=ALL`/`UNLINK` or another dynamic activation evicts it.
    Unlimited,
    /// Dynamically activated by a first keyup; expires at the given
    /// instant unless refreshed by another transmission first.
    UntilInstant(Instant),
}

impl Expiry {
    fn is_expired(&self) -> bool {
        matches!(self, Expiry::UntilInstant(at) if Instant::now() > *at)
    }
}

#[derive(Default)]
struct SlotSubscriptions {
    entries: HashMap<u32, Expiry>,
}

impl SlotSubscriptions {
    fn set_static_list(&mut self, talkgroups: &[u32]) {
        self.entries.retain(|_, e| !matches!(e, Expiry::Static));
        for tg in talkgroups {
            self.entries.insert(*tg, Expiry::Static);
        }
    }

    fn clear_static(&mut self) {
        self.entries.retain(|_, e| !matches!(e, Expiry::Static));
    }

    fn clear_dynamic(&mut self) {
        self.entries.retain(|_, e| !matches!(e, Expiry::UntilInstant(_)));
    }

    /// §4.4 `addDynamic`: if `talkgroup` is already present (static, unlimited,
    /// or an unexpired TTL-dynamic entry), refresh its TTL only when it was
    /// TTL-dynamic and `auto_ttl` is positive, and report "not new". Otherwise
    /// evict every other dynamic entry on this slot (static/unlimited entries
    /// are untouched), install the new one, and report "new" — this is the
    /// signal that drives the first-keyup mute.
    fn add_dynamic(&mut self, talkgroup: u32, auto_ttl: Duration) -> bool {
        match self.entries.get(&talkgroup) {
            Some(Expiry::Static) | Some(Expiry::Unlimited) => return false,
            Some(Expiry::UntilInstant(at)) if *at > Instant::now() => {
                if !auto_ttl.is_zero() {
                    self.entries.insert(talkgroup, Expiry::UntilInstant(Instant::now() + auto_ttl));
                }
                return false;
            }
            _ => {}
        }

        self.entries.retain(|tg, e| *tg == talkgroup || !matches!(e, Expiry::UntilInstant(_)));
        let expiry = if auto_ttl.is_zero() {
            Expiry::Unlimited
        } else {
            Expiry::UntilInstant(Instant::now() + auto_ttl)
        };
        self.entries.insert(talkgroup, expiry);
        true
    }

    fn is_subscribed(&self, talkgroup: u32) -> bool {
        match self.entries.get(&talkgroup) {
            Some(e) => !e.is_expired(),
            None => false,
        }
    }

    fn active_talkgroups(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .map(|(tg, _)| *tg)
            .collect()
    }

    fn reap_expired(&mut self) {
        self.entries.retain(|_, e| !e.is_expired());
    }
}

/// A peer's TS1/TS2 talkgroup subscription state: the static list declared
/// via OPTIONS plus whatever talkgroups have been dynamically activated by
/// traffic, each tracked with its own `Expiry`.
pub struct SubscriptionState {
    ts1: SlotSubscriptions,
    ts2: SlotSubscriptions,
    auto_ttl: Duration,
}

impl SubscriptionState {
    pub fn new() -> Self {
        Self {
            ts1: SlotSubscriptions::default(),
            ts2: SlotSubscriptions::default(),
            auto_ttl: Duration::from_secs(DEFAULT_AUTO_TTL_SECONDS as u64),
        }
    }

    fn slot_mut(&mut self, ts: Timeslot) -> &mut SlotSubscriptions {
        match ts {
            Timeslot::Ts1 => &mut self.ts1,
            Timeslot::Ts2 => &mut self.ts2,
        }
    }

    fn slot(&self, ts: Timeslot) -> &SlotSubscriptions {
        match ts {
            Timeslot::Ts1 => &self.ts1,
            Timeslot::Ts2 => &self.ts2,
        }
    }

    /// Applies a parsed OPTIONS directive. `TS1=`/`TS2=` replace that slot's
    /// static list (dynamic entries are untouched); `AUTO=` updates the TTL
    /// used by future dynamic activations; `DROP=ALL` clears every
    /// subscription on both slots; `UNLINK=` clears only the static list of
    /// the named slot.
    pub fn update(&mut self, directive: &OptionsDirective) {
        if directive.drop_all {
            self.ts1 = SlotSubscriptions::default();
            self.ts2 = SlotSubscriptions::default();
        }
        if let Some(list) = &directive.ts1 {
            self.ts1.set_static_list(list);
        }
        if let Some(list) = &directive.ts2 {
            self.ts2.set_static_list(list);
        }
        if let Some(seconds) = directive.auto_ttl_seconds {
            self.auto_ttl = Duration::from_secs(seconds as u64);
        }
        for ts in &directive.unlink {
            self.slot_mut(*ts).clear_static();
        }
    }

    /// Activates a talkgroup dynamically (first keyup). Returns `true` iff
    /// this activation is new — the caller's signal to start a first-keyup
    /// mute window (§4.5 step 8). A no-op (returns `false`) if the
    /// talkgroup is already statically, unconditionally, or (within its
    /// TTL) dynamically subscribed; in the TTL-dynamic case the TTL is
    /// refreshed when `auto_ttl` is positive.
    pub fn add_dynamic(&mut self, ts: Timeslot, talkgroup: u32) -> bool {
        let ttl = self.auto_ttl;
        self.slot_mut(ts).add_dynamic(talkgroup, ttl)
    }

    pub fn is_subscribed_to_talkgroup(&self, ts: Timeslot, talkgroup: u32) -> bool {
        self.slot(ts).is_subscribed(talkgroup)
    }

    pub fn has_talkgroup(&self, talkgroup: u32) -> bool {
        self.ts1.is_subscribed(talkgroup) || self.ts2.is_subscribed(talkgroup)
    }

    pub fn get_talkgroups(&self, ts: Timeslot) -> Vec<u32> {
        self.slot(ts).active_talkgroups()
    }

    pub fn clear_all_dynamic(&mut self) {
        self.ts1.clear_dynamic();
        self.ts2.clear_dynamic();
    }

    pub fn reap_expired(&mut self) {
        self.ts1.reap_expired();
        self.ts2.reap_expired();
    }
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_list_replaces_previous_static_list_only() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { ts1: Some(vec![100, 200]), ..Default::default() });
        s.add_dynamic(Timeslot::Ts1, 999);

        s.update(&OptionsDirective { ts1: Some(vec![300]), ..Default::default() });

        assert!(!s.is_subscribed_to_talkgroup(Timeslot::Ts1, 100));
        assert!(!s.is_subscribed_to_talkgroup(Timeslot::Ts1, 200));
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 300));
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 999), "dynamic entry must survive a static replace");
    }

    #[test]
    fn dynamic_activation_respects_configured_ttl() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { auto_ttl_seconds: Some(1), ..Default::default() });
        assert!(s.add_dynamic(Timeslot::Ts1, 91));
        // TTL hasn't elapsed yet: still subscribed, and a second add is not new.
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 91));
        assert!(!s.add_dynamic(Timeslot::Ts1, 91));
    }

    #[test]
    fn zero_auto_ttl_installs_an_unlimited_dynamic_entry() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { auto_ttl_seconds: Some(0), ..Default::default() });
        assert!(s.add_dynamic(Timeslot::Ts1, 91));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 91), "AUTO=0 means unlimited-dynamic, not instant expiry");
    }

    #[test]
    fn dynamic_activation_does_not_override_static() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective {
            ts1: Some(vec![91]),
            auto_ttl_seconds: Some(0),
            ..Default::default()
        });
        assert!(!s.add_dynamic(Timeslot::Ts1, 91), "already-static membership is never reported as a new activation");
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 91), "static membership must not be demoted to dynamic");
    }

    #[test]
    fn second_add_dynamic_on_same_talkgroup_is_not_new() {
        let mut s = SubscriptionState::new();
        assert!(s.add_dynamic(Timeslot::Ts1, 3100));
        assert!(!s.add_dynamic(Timeslot::Ts1, 3100));
    }

    #[test]
    fn activating_a_new_dynamic_talkgroup_evicts_the_slots_other_dynamic_entries() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { ts1: Some(vec![91]), ..Default::default() });
        assert!(s.add_dynamic(Timeslot::Ts1, 3100));
        assert!(s.add_dynamic(Timeslot::Ts1, 3101));

        assert!(!s.is_subscribed_to_talkgroup(Timeslot::Ts1, 3100), "prior dynamic entry on this slot is evicted");
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 3101));
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts1, 91), "static entries are never evicted by dynamic activation");
        // The other timeslot is independent.
        assert!(s.add_dynamic(Timeslot::Ts2, 3100));
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts2, 3100));
    }

    #[test]
    fn drop_all_clears_both_slots_entirely() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { ts1: Some(vec![91]), ts2: Some(vec![92]), ..Default::default() });
        s.add_dynamic(Timeslot::Ts1, 999);

        s.update(&OptionsDirective { drop_all: true, ..Default::default() });

        assert!(!s.has_talkgroup(91));
        assert!(!s.has_talkgroup(92));
        assert!(!s.has_talkgroup(999));
    }

    #[test]
    fn unlink_clears_only_the_named_slots_static_list() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { ts1: Some(vec![91]), ts2: Some(vec![92]), ..Default::default() });

        s.update(&OptionsDirective { unlink: vec![Timeslot::Ts1], ..Default::default() });

        assert!(!s.is_subscribed_to_talkgroup(Timeslot::Ts1, 91));
        assert!(s.is_subscribed_to_talkgroup(Timeslot::Ts2, 92));
    }

    #[test]
    fn get_talkgroups_excludes_expired_dynamic_entries() {
        let mut s = SubscriptionState::new();
        s.update(&OptionsDirective { auto_ttl_seconds: Some(1), ..Default::default() });
        s.add_dynamic(Timeslot::Ts2, 5);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(s.get_talkgroups(Timeslot::Ts2).is_empty());
    }
}
