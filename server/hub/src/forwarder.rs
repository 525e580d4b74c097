use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use nexus_core::BridgeRouter;
use nexus_master::{MasterServer, SystemForwarder};
use nexus_openbridge::OpenBridgeEndpoint;
use nexus_peer::PeerClient;
use nexus_wire::{CallType, Dmrd};

/// One running system this process hosts, keyed by its configured name.
/// `Peer`'s `u32` is the repeater ID it authenticates as, needed to stamp
/// outbound frames (its own `send_dmrd` sends raw bytes verbatim, unlike
/// `OpenBridgeEndpoint::send_dmrd`, which stamps its own `network_id`).
pub enum RunningSystem {
    Master(Arc<MasterServer>),
    Peer(Arc<PeerClient>, u32),
    OpenBridge(Arc<OpenBridgeEndpoint>),
}

/// Cross-system bridge dispatch (§4.6): a single `BridgeRouter` instance
/// shared by every system this process hosts, plus the means to deliver an
/// accepted frame into whichever one a rule names.
///
/// `MasterServer` implements its own local registry/ACL/subscription
/// pipeline and calls back into this as a `SystemForwarder` once it has
/// already decided a frame bridges out. `PeerClient` and `OpenBridgeEndpoint`
/// have no pipeline of their own — inbound traffic on those systems is
/// routed here directly via `route_from_leaf`.
pub struct HubForwarder {
    router: Arc<BridgeRouter>,
    systems: HashMap<String, RunningSystem>,
}

impl HubForwarder {
    pub fn new(router: Arc<BridgeRouter>, systems: HashMap<String, RunningSystem>) -> Self {
        Self { router, systems }
    }

    async fn deliver(&self, system_name: &str, raw: &[u8]) {
        match self.systems.get(system_name) {
            Some(RunningSystem::Master(master)) => master.deliver_bridged(raw).await,
            Some(RunningSystem::Peer(peer, repeater_id)) => {
                let Ok(mut dmrd) = Dmrd::parse(raw) else {
                    debug!(system = system_name, "hub dropped unparsable frame bound for a PEER system");
                    return;
                };
                dmrd.repeater_id = *repeater_id;
                if let Err(e) = peer.send_dmrd(&dmrd.encode()).await {
                    warn!(%e, system = system_name, "hub failed to forward frame to PEER system");
                }
            }
            Some(RunningSystem::OpenBridge(endpoint)) => {
                let Ok(dmrd) = Dmrd::parse(raw) else {
                    debug!(system = system_name, "hub dropped unparsable frame bound for an OPENBRIDGE system");
                    return;
                };
                if let Err(e) = endpoint.send_dmrd(&dmrd).await {
                    warn!(%e, system = system_name, "hub failed to forward frame to OPENBRIDGE system");
                }
            }
            None => debug!(system = system_name, "hub has no running system by this name"),
        }
    }

    /// Entry point for a DMRD arriving on a system with no routing pipeline
    /// of its own (PEER, OpenBridge): applies the same bridge-membership
    /// decision `MasterServer::route_group_call` makes, then fans out to
    /// every other member system. Private calls never originate a bridge
    /// hop here — only a MASTER system tracks subscriber locations.
    pub async fn route_from_leaf(&self, source_system: &str, raw: &[u8]) {
        let Ok(dmrd) = Dmrd::parse(raw) else {
            debug!(system = source_system, "hub dropped an unparsable frame from a leaf system");
            return;
        };
        if dmrd.slot.call_type != CallType::Group {
            return;
        }

        self.router.process_activation(dmrd.dst_id);
        self.router.process_deactivation(dmrd.dst_id);
        let targets = self.router.route_packet(dmrd.dst_id, source_system);
        for target in &targets {
            self.deliver(target, raw).await;
        }
    }
}

#[async_trait]
impl SystemForwarder for HubForwarder {
    async fn forward_to_system(&self, system_name: &str, raw: &[u8]) {
        self.deliver(system_name, raw).await;
    }
}

/// Adapts one leaf system's inbound-frame callback (`nexus_peer::DmrdSink`
/// or `nexus_openbridge::DmrdSink`) to `HubForwarder::route_from_leaf`,
/// tagged with the name of the system the frame arrived on.
pub struct LeafSink {
    pub forwarder: Arc<DeferredForwarder>,
    pub system_name: String,
}

#[async_trait]
impl nexus_peer::DmrdSink for LeafSink {
    async fn on_dmrd(&self, raw: &[u8]) {
        self.forwarder.route_from_leaf(&self.system_name, raw).await;
    }
}

#[async_trait]
impl nexus_openbridge::DmrdSink for LeafSink {
    async fn on_dmrd(&self, raw: &[u8]) {
        self.forwarder.route_from_leaf(&self.system_name, raw).await;
    }
}

/// Breaks the construction cycle between `MasterServer` (needs an
/// `Arc<dyn SystemForwarder>` at construction time) and `HubForwarder`
/// (needs every already-constructed system handle before it can exist).
/// `nexus-hub`'s runtime builds one of these first, hands clones of it to
/// every system as their forwarder/sink, builds every system, then
/// finally constructs the real `HubForwarder` and calls `install` once.
/// Any frame that arrives before `install` runs — there should be none,
/// since nothing is serving yet — is dropped with a warning rather than
/// panicking.
#[derive(Default)]
pub struct DeferredForwarder {
    inner: OnceCell<Arc<HubForwarder>>,
}

impl DeferredForwarder {
    pub fn new() -> Self {
        Self { inner: OnceCell::new() }
    }

    /// Panics if called twice; the runtime calls this exactly once, after
    /// every system has been constructed.
    pub fn install(&self, hub: Arc<HubForwarder>) {
        self.inner.set(hub).unwrap_or_else(|_| panic!("DeferredForwarder::install called twice"));
    }

    pub async fn route_from_leaf(&self, source_system: &str, raw: &[u8]) {
        match self.inner.get() {
            Some(hub) => hub.route_from_leaf(source_system, raw).await,
            None => warn!(system = source_system, "dropped leaf frame: hub forwarder not installed yet"),
        }
    }
}

#[async_trait]
impl SystemForwarder for DeferredForwarder {
    async fn forward_to_system(&self, system_name: &str, raw: &[u8]) {
        match self.inner.get() {
            Some(hub) => hub.forward_to_system(system_name, raw).await,
            None => warn!(system_name, "dropped bridged frame: hub forwarder not installed yet"),
        }
    }
}
