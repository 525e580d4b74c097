use std::time::{Duration, Instant};

use dashmap::DashMap;
use nexus_wire::Timeslot;

/// How long a subscriber's last-known location stays usable for private-call
/// routing before it is treated as unknown.
pub const LOCATION_STALE_AFTER: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Copy, Debug)]
struct LocationEntry {
    peer_id: u32,
    timeslot: Timeslot,
    last_seen: Instant,
}

/// Tracks which repeater each subscriber radio was last heard transmitting
/// from, so a private call can be routed to that repeater instead of
/// broadcast to every peer subscribed to the destination talkgroup.
#[derive(Default)]
pub struct SubscriberLocations {
    by_subscriber: DashMap<u32, LocationEntry>,
}

impl SubscriberLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, subscriber_id: u32, peer_id: u32, timeslot: Timeslot) {
        self.by_subscriber.insert(subscriber_id, LocationEntry { peer_id, timeslot, last_seen: Instant::now() });
    }

    /// Returns the peer and timeslot the subscriber was last heard on, if
    /// that observation is still within the staleness window.
    pub fn locate(&self, subscriber_id: u32) -> Option<(u32, Timeslot)> {
        let entry = self.by_subscriber.get(&subscriber_id)?;
        if entry.last_seen.elapsed() > LOCATION_STALE_AFTER {
            return None;
        }
        Some((entry.peer_id, entry.timeslot))
    }

    pub fn remove_peer(&self, peer_id: u32) {
        self.by_subscriber.retain(|_, e| e.peer_id != peer_id);
    }

    pub fn reap_stale(&self) {
        self.by_subscriber.retain(|_, e| e.last_seen.elapsed() <= LOCATION_STALE_AFTER);
    }

    pub fn len(&self) -> usize {
        self.by_subscriber.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subscriber.is_empty()
    }
}
