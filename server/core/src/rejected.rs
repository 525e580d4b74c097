use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default NAK cooldown (§5): at most one negative acknowledgement per
/// (repeater-id-claimed-in-packet, source-address) pair per window.
pub const DEFAULT_NAK_COOLDOWN: Duration = Duration::from_secs(5);

/// Rate-limits NAKs sent to unknown or not-yet-authenticated senders so a
/// misbehaving or flooding origin cannot make the master hammer it (or
/// itself) with responses.
pub struct RejectedOrigins {
    last_sent: DashMap<(u32, SocketAddr), Instant>,
    cooldown: Duration,
}

impl RejectedOrigins {
    pub fn new(cooldown: Duration) -> Self {
        Self { last_sent: DashMap::new(), cooldown }
    }

    /// Returns `true` iff a NAK should be sent now for this origin, and
    /// records that decision. Callers should send the NAK (or not) based
    /// solely on this return value.
    pub fn should_send(&self, claimed_id: u32, addr: SocketAddr) -> bool {
        let key = (claimed_id, addr);
        let now = Instant::now();
        match self.last_sent.get(&key) {
            Some(last) if now.duration_since(*last) < self.cooldown => false,
            _ => {
                self.last_sent.insert(key, now);
                true
            }
        }
    }

    pub fn reap_expired(&self) {
        let cooldown = self.cooldown;
        let now = Instant::now();
        self.last_sent.retain(|_, last| now.duration_since(*last) < cooldown);
    }

    pub fn len(&self) -> usize {
        self.last_sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_sent.is_empty()
    }
}

impl Default for RejectedOrigins {
    fn default() -> Self {
        Self::new(DEFAULT_NAK_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1000)
    }

    #[test]
    fn first_attempt_is_always_sent() {
        let r = RejectedOrigins::new(Duration::from_millis(100));
        assert!(r.should_send(1, addr()));
    }

    #[test]
    fn repeated_attempts_within_cooldown_are_suppressed() {
        let r = RejectedOrigins::new(Duration::from_millis(100));
        assert!(r.should_send(1, addr()));
        assert!(!r.should_send(1, addr()));
        assert!(!r.should_send(1, addr()));
    }

    #[test]
    fn distinct_origins_are_independent() {
        let r = RejectedOrigins::new(Duration::from_millis(100));
        assert!(r.should_send(1, addr()));
        assert!(r.should_send(2, addr()));
    }

    #[test]
    fn cooldown_eventually_expires() {
        let r = RejectedOrigins::new(Duration::from_millis(5));
        assert!(r.should_send(1, addr()));
        std::thread::sleep(Duration::from_millis(10));
        assert!(r.should_send(1, addr()));
    }
}
