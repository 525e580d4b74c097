use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;

use nexus_wire::RptcConfig;

use crate::subscription::SubscriptionState;

/// Where a peer sits in the RPTL -> RPTK -> RPTC -> CONNECTED sequence.
/// A peer only ever advances forward; any handshake message received out
/// of order is rejected rather than causing a phase to be skipped or
/// revisited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakePhase {
    LoginReceived,
    Authenticated,
    Connected,
}

/// The fields of the repeater's RPTC record that matter beyond the initial
/// handshake (kept verbatim; `description` is also parsed for an embedded
/// `OPTIONS:` directive).
#[derive(Clone, Debug, Default)]
pub struct PeerConfig {
    pub callsign: String,
    pub rx_freq: String,
    pub tx_freq: String,
    pub color_code: String,
    pub location: String,
    pub description: String,
    pub software: String,
}

impl From<&RptcConfig> for PeerConfig {
    fn from(c: &RptcConfig) -> Self {
        Self {
            callsign: c.callsign.clone(),
            rx_freq: c.rx_freq.clone(),
            tx_freq: c.tx_freq.clone(),
            color_code: c.color_code.clone(),
            location: c.location.clone(),
            description: c.description.clone(),
            software: c.software.clone(),
        }
    }
}

/// Mutable per-peer state, guarded by its own lock so that one peer's
/// handshake or subscription update never blocks another's.
pub struct PeerState {
    pub addr: SocketAddr,
    pub phase: HandshakePhase,
    pub salt: Option<[u8; 32]>,
    pub config: PeerConfig,
    pub subscriptions: SubscriptionState,
    pub last_activity: Instant,
    pub connected_at: Option<Instant>,
    /// Repeat-all mode (§4.5 special TGID 777/4000): when set, this peer
    /// receives every group frame regardless of its subscriptions.
    pub repeat_all: bool,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
}

impl PeerState {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            phase: HandshakePhase::LoginReceived,
            salt: None,
            config: PeerConfig::default(),
            subscriptions: SubscriptionState::new(),
            last_activity: Instant::now(),
            connected_at: None,
            repeat_all: false,
            rx_packets: 0,
            rx_bytes: 0,
            tx_packets: 0,
            tx_bytes: 0,
        }
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn record_rx(&mut self, bytes: usize) {
        self.rx_packets += 1;
        self.rx_bytes += bytes as u64;
    }

    pub fn record_tx(&mut self, bytes: usize) {
        self.tx_packets += 1;
        self.tx_bytes += bytes as u64;
    }
}

/// A registered repeater. Identity (`id`) is immutable; everything else
/// lives behind `state` so callers can read or mutate without taking the
/// registry-wide lock.
pub struct PeerHandle {
    pub id: u32,
    state: RwLock<PeerState>,
}

impl PeerHandle {
    fn new(id: u32, addr: SocketAddr) -> Self {
        Self { id, state: RwLock::new(PeerState::new(addr)) }
    }

    pub fn state(&self) -> parking_lot::RwLockReadGuard<'_, PeerState> {
        self.state.read()
    }

    pub fn state_mut(&self) -> parking_lot::RwLockWriteGuard<'_, PeerState> {
        self.state.write()
    }

    pub fn phase(&self) -> HandshakePhase {
        self.state.read().phase
    }

    pub fn addr(&self) -> SocketAddr {
        self.state.read().addr
    }
}

/// All currently registered peers, indexed by radio ID with a secondary
/// index by socket address for datagrams whose sender isn't yet known by
/// ID (e.g. a stray RPTL retransmit after a NAT rebind).
#[derive(Default)]
pub struct PeerRegistry {
    by_id: DashMap<u32, Arc<PeerHandle>>,
    by_addr: DashMap<SocketAddr, u32>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new peer or re-keys an existing one to a new address
    /// (a repeater that re-sent RPTL, e.g. after a NAT rebind, restarts the
    /// handshake from scratch rather than resuming mid-sequence).
    pub fn add_or_update(&self, id: u32, addr: SocketAddr) -> Arc<PeerHandle> {
        if let Some(existing) = self.by_id.get(&id) {
            self.by_addr.remove(&existing.addr());
        }
        let handle = Arc::new(PeerHandle::new(id, addr));
        self.by_id.insert(id, handle.clone());
        self.by_addr.insert(addr, id);
        handle
    }

    pub fn get(&self, id: u32) -> Option<Arc<PeerHandle>> {
        self.by_id.get(&id).map(|e| e.clone())
    }

    pub fn get_by_addr(&self, addr: SocketAddr) -> Option<Arc<PeerHandle>> {
        let id = *self.by_addr.get(&addr)?;
        self.get(id)
    }

    pub fn remove(&self, id: u32) -> Option<Arc<PeerHandle>> {
        let (_, handle) = self.by_id.remove(&id)?;
        self.by_addr.remove(&handle.addr());
        Some(handle)
    }

    pub fn snapshot_all(&self) -> Vec<Arc<PeerHandle>> {
        self.by_id.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Removes every peer whose last activity is older than `timeout` and
    /// returns their IDs, so callers can also purge location/mute state
    /// keyed by the same ID.
    pub fn reap(&self, timeout: Duration) -> Vec<u32> {
        let stale: Vec<u32> = self
            .by_id
            .iter()
            .filter(|e| e.value().state().is_expired(timeout))
            .map(|e| *e.key())
            .collect();
        for id in &stale {
            self.remove(*id);
        }
        stale
    }
}
