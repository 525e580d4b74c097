use std::collections::HashSet;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::debug;

use nexus_core::special_tgid;
use nexus_wire::{CallType, Dmrd, FrameType};

use crate::server::MasterServer;

impl MasterServer {
    /// The full group/private-call routing decision for one DMRD frame,
    /// from an already-CONNECTED source peer down to every wire send it
    /// produces. Follows §4.5's step order: liveness → subscriber ACL →
    /// location tracking (unconditional) → private branch, or talkgroup ACL
    /// → special TGID → group routing.
    pub(crate) async fn handle_dmrd(&self, dmrd: &Dmrd, raw: &[u8], addr: SocketAddr, socket: &UdpSocket) {
        let Some(peer) = self.registry.get_by_addr(addr) else {
            self.maybe_nak(dmrd.repeater_id, addr, socket).await;
            return;
        };
        if peer.phase() != nexus_core::HandshakePhase::Connected {
            self.maybe_nak(dmrd.repeater_id, addr, socket).await;
            return;
        }

        {
            let mut state = peer.state_mut();
            state.record_rx(raw.len());
            state.touch();
        }
        self.metrics.dmrd_received(raw.len());

        if !self.config.subscriber_admitted(dmrd.src_id) {
            self.metrics.dmrd_dropped("subscriber-denied");
            return;
        }

        // §4.5 step 4: recorded unconditionally, before the call-type
        // branch, since this is the only mechanism private-call lookups
        // have to resolve a destination radio's current peer.
        self.locations.record(dmrd.src_id, peer.id, dmrd.slot.timeslot);

        if dmrd.slot.call_type == CallType::Private {
            self.route_private_call(&peer, dmrd, raw, socket).await;
            return;
        }

        if !self.config.talkgroup_admitted(dmrd.dst_id, dmrd.slot.timeslot) {
            self.metrics.dmrd_dropped("talkgroup-denied");
            return;
        }
        if self.handle_special_tgid(&peer, dmrd.dst_id) {
            return;
        }

        self.route_group_call(&peer, dmrd, raw, socket).await;
    }

    /// TGID 777 (repeat-all-on) and 4000 (disconnect-all) never reach the
    /// routing pipeline proper; both consume their triggering frame.
    /// Returns `true` iff `dst_id` was one of these.
    fn handle_special_tgid(&self, peer: &nexus_core::PeerHandle, dst_id: u32) -> bool {
        match dst_id {
            special_tgid::REPEAT_ALL_ON => {
                peer.state_mut().repeat_all = true;
                true
            }
            special_tgid::DISCONNECT_ALL => {
                let mut state = peer.state_mut();
                state.repeat_all = false;
                state.subscriptions.clear_all_dynamic();
                drop(state);
                self.router.remove_subscriber_from_all_dynamic_bridges(peer.id);
                true
            }
            _ => false,
        }
    }

    async fn route_private_call(&self, peer: &nexus_core::PeerHandle, dmrd: &Dmrd, raw: &[u8], socket: &UdpSocket) {
        if !self.config.private_calls_enabled {
            self.metrics.dmrd_dropped("private-calls-disabled");
            return;
        }
        let Some((target_peer_id, _ts)) = self.locations.locate(dmrd.dst_id) else {
            self.metrics.dmrd_dropped("unknown-subscriber-location");
            return;
        };
        // §4.5 step 5: the owning peer must differ from the source peer,
        // or a radio last heard on its own repeater would have every
        // private call it originates looped straight back to it.
        if target_peer_id == peer.id {
            self.metrics.dmrd_dropped("private-call-targets-source-peer");
            return;
        }
        let Some(target) = self.registry.get(target_peer_id) else {
            self.metrics.dmrd_dropped("private-target-gone");
            return;
        };
        if target.phase() != nexus_core::HandshakePhase::Connected {
            return;
        }
        self.forward_to_peer(&target, raw, socket).await;
        self.metrics.dmrd_forwarded(1);
    }

    async fn route_group_call(&self, peer: &nexus_core::PeerHandle, dmrd: &Dmrd, raw: &[u8], socket: &UdpSocket) {
        let newly_activated = peer.state_mut().subscriptions.add_dynamic(dmrd.slot.timeslot, dmrd.dst_id);
        if newly_activated {
            self.muted.mute(dmrd.stream_id);
        } else if dmrd.slot.frame_type == FrameType::VoiceTerminator {
            self.muted.end_stream(dmrd.stream_id);
        }

        self.router.process_activation(dmrd.dst_id);
        self.router.process_deactivation(dmrd.dst_id);

        if newly_activated {
            // §4.5 step 8: the frame whose own arrival is what subscribed
            // this source to the talkgroup is never forwarded anywhere —
            // to a bridge target or to a local peer — it is an act of
            // subscribing, not of speaking. Only this one frame is
            // suppressed: the very next frame on the same stream is
            // ordinary traffic and must reach every other listener, so
            // the decision is made once here and never re-checked against
            // a time window later.
            debug!(stream_id = dmrd.stream_id, "suppressing first-keyup frame");
            return;
        }

        let bridged_systems = self.router.route_packet(dmrd.dst_id, &self.config.system_name);
        if bridged_systems.is_empty() {
            self.router.touch_dynamic_bridge(dmrd.dst_id, peer.id);
        }
        for system in &bridged_systems {
            self.forwarder.forward_to_system(system, raw).await;
        }

        let mut delivered: HashSet<u32> = HashSet::new();
        delivered.insert(peer.id);
        let mut fanout = 0usize;

        for other in self.registry.snapshot_all() {
            if delivered.contains(&other.id) || other.phase() != nexus_core::HandshakePhase::Connected {
                continue;
            }
            let wants_it = {
                let state = other.state();
                state.repeat_all || state.subscriptions.is_subscribed_to_talkgroup(dmrd.slot.timeslot, dmrd.dst_id)
            };
            if wants_it {
                self.forward_to_peer(&other, raw, socket).await;
                delivered.insert(other.id);
                fanout += 1;
            }
        }

        // The source peer's own repeat-all flag is an unconditional
        // broadcast layered on top of ordinary subscription-based fanout.
        if peer.state().repeat_all {
            for other in self.registry.snapshot_all() {
                if delivered.contains(&other.id) || other.phase() != nexus_core::HandshakePhase::Connected {
                    continue;
                }
                self.forward_to_peer(&other, raw, socket).await;
                delivered.insert(other.id);
                fanout += 1;
            }
        }

        if fanout > 0 {
            self.metrics.dmrd_forwarded(fanout);
        }
    }

    /// Delivers a frame that arrived here via bridge forwarding from another
    /// configured system (`nexus-hub`'s `SystemForwarder`): local fanout to
    /// this system's own connected peers only. Never re-enters
    /// `BridgeRouter::route_packet` — each bridge names every member system
    /// up front, so re-routing here would bounce the frame straight back to
    /// where it came from.
    pub async fn deliver_bridged(&self, raw: &[u8]) {
        let Some(socket) = self.socket.get() else {
            return;
        };
        let dmrd = match Dmrd::parse(raw) {
            Ok(d) => d,
            Err(e) => {
                debug!(%e, "MASTER dropped unparsable bridged frame");
                return;
            }
        };
        if dmrd.slot.call_type != CallType::Group {
            return;
        }

        let mut fanout = 0usize;
        for other in self.registry.snapshot_all() {
            if other.phase() != nexus_core::HandshakePhase::Connected {
                continue;
            }
            let wants_it = {
                let state = other.state();
                state.repeat_all || state.subscriptions.is_subscribed_to_talkgroup(dmrd.slot.timeslot, dmrd.dst_id)
            };
            if wants_it {
                self.forward_to_peer(&other, raw, socket).await;
                fanout += 1;
            }
        }
        if fanout > 0 {
            self.metrics.dmrd_forwarded(fanout);
        }
    }

    /// Sends `raw` to `target` exactly as received. §4.5 step 13 forwards
    /// the raw packet verbatim, byte-for-byte — no field of it, including
    /// `repeater_id`, is rewritten, and it is never round-tripped through
    /// the codec.
    async fn forward_to_peer(&self, target: &nexus_core::PeerHandle, raw: &[u8], socket: &UdpSocket) {
        target.state_mut().record_tx(raw.len());
        self.send_raw(raw, target.addr(), socket).await;
    }
}
