use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::info;

use nexus_core::auth;
use nexus_core::{HandshakePhase, PeerConfig};
use nexus_wire::{Handshake, OptionsDirective};

use crate::server::MasterServer;

impl MasterServer {
    /// §4.7 MASTER-side transitions. Every branch that fails admits the
    /// peer nowhere: it either never enters the registry or is removed
    /// from it before returning.
    pub(crate) async fn handle_handshake(&self, hs: Handshake, addr: SocketAddr, socket: &UdpSocket) {
        match hs {
            Handshake::Rptl { repeater_id } => self.on_rptl(repeater_id, addr, socket).await,
            Handshake::Rptk { repeater_id, challenge } => self.on_rptk(repeater_id, addr, challenge, socket).await,
            Handshake::Rptc { repeater_id, config } => self.on_rptc(repeater_id, addr, config, socket).await,
            Handshake::Rpto { repeater_id, options } => self.on_rpto(repeater_id, addr, &options, socket).await,
            Handshake::RptPing { repeater_id } => self.on_ping(repeater_id, addr, socket).await,
            Handshake::Rptcl { repeater_id } | Handshake::Mstcl { repeater_id } => {
                self.on_close(repeater_id, addr).await
            }
            // These only ever originate from a MASTER; a peer socket would
            // never legitimately send them to us.
            Handshake::Rptack { .. } | Handshake::Mstpong { .. } | Handshake::Mstnak { .. } => {}
        }
    }

    async fn on_rptl(&self, repeater_id: u32, addr: SocketAddr, socket: &UdpSocket) {
        if !self.config.registration_admitted(repeater_id) {
            self.metrics.dmrd_dropped("registration-denied");
            self.send_handshake(&Handshake::Mstcl { repeater_id }, addr, socket).await;
            return;
        }
        if let Some(limit) = self.config.max_peers {
            let already_known = self.registry.get(repeater_id).is_some();
            if !already_known && self.registry.len() >= limit {
                self.metrics.dmrd_dropped("max-peers-reached");
                self.send_handshake(&Handshake::Mstcl { repeater_id }, addr, socket).await;
                return;
            }
        }

        let peer = self.registry.add_or_update(repeater_id, addr);
        let salt = auth::generate_salt();
        {
            let mut state = peer.state_mut();
            state.salt = Some(salt);
            state.phase = HandshakePhase::LoginReceived;
            state.touch();
        }
        self.send_handshake(&Handshake::Rptack { repeater_id, salt: Some(salt) }, addr, socket).await;
    }

    async fn on_rptk(&self, repeater_id: u32, addr: SocketAddr, challenge: [u8; 32], socket: &UdpSocket) {
        let Some(peer) = self.registry.get_by_addr(addr) else {
            self.maybe_nak(repeater_id, addr, socket).await;
            return;
        };

        let verified = {
            let state = peer.state();
            state.phase == HandshakePhase::LoginReceived
                && state.salt.map(|salt| auth::verify_challenge(&salt, &self.config.passphrase, &challenge)).unwrap_or(false)
        };

        if !verified {
            self.registry.remove(peer.id);
            self.send_handshake(&Handshake::Mstcl { repeater_id }, addr, socket).await;
            return;
        }

        peer.state_mut().phase = HandshakePhase::Authenticated;
        peer.state_mut().touch();
        self.send_handshake(&Handshake::Rptack { repeater_id, salt: None }, addr, socket).await;
    }

    async fn on_rptc(&self, repeater_id: u32, addr: SocketAddr, config: nexus_wire::RptcConfig, socket: &UdpSocket) {
        let Some(peer) = self.registry.get_by_addr(addr) else {
            self.maybe_nak(repeater_id, addr, socket).await;
            return;
        };
        if peer.phase() != HandshakePhase::Authenticated {
            self.registry.remove(peer.id);
            self.send_handshake(&Handshake::Mstcl { repeater_id }, addr, socket).await;
            return;
        }

        let embedded = OptionsDirective::from_embedded_description(&config.description).ok().flatten();
        {
            let mut state = peer.state_mut();
            state.config = PeerConfig::from(&config);
            if let Some(directive) = &embedded {
                state.subscriptions.update(directive);
            }
            state.phase = HandshakePhase::Connected;
            state.connected_at = Some(std::time::Instant::now());
            state.touch();
        }
        info!(id = repeater_id, callsign = %config.callsign, "peer connected");
        self.metrics.peer_connected(repeater_id);
        self.send_handshake(&Handshake::Rptack { repeater_id, salt: None }, addr, socket).await;
    }

    async fn on_rpto(&self, repeater_id: u32, addr: SocketAddr, options: &str, socket: &UdpSocket) {
        let Some(peer) = self.registry.get_by_addr(addr) else {
            self.maybe_nak(repeater_id, addr, socket).await;
            return;
        };
        if peer.phase() != HandshakePhase::Connected {
            self.registry.remove(peer.id);
            self.send_handshake(&Handshake::Mstcl { repeater_id }, addr, socket).await;
            return;
        }
        let Ok(directive) = OptionsDirective::parse(options) else {
            // malformed OPTIONS is a *config*-at-runtime error, never fatal (§7 *parse*).
            return;
        };
        {
            let mut state = peer.state_mut();
            state.subscriptions.update(&directive);
            state.touch();
        }
        self.send_handshake(&Handshake::Rptack { repeater_id, salt: None }, addr, socket).await;
    }

    async fn on_ping(&self, repeater_id: u32, addr: SocketAddr, socket: &UdpSocket) {
        let Some(peer) = self.registry.get_by_addr(addr) else {
            self.maybe_nak(repeater_id, addr, socket).await;
            return;
        };
        peer.state_mut().touch();
        self.send_handshake(&Handshake::Mstpong { repeater_id }, addr, socket).await;
    }

    async fn on_close(&self, repeater_id: u32, addr: SocketAddr) {
        let Some(peer) = self.registry.get_by_addr(addr) else {
            return;
        };
        self.locations.remove_peer(peer.id);
        self.router.remove_subscriber_from_all_dynamic_bridges(peer.id);
        self.registry.remove(peer.id);
        self.metrics.peer_removed(repeater_id);
    }

    /// At most one MSTNAK per (claimed-id, address) per cooldown window,
    /// for any message from an address the registry doesn't recognize.
    pub(crate) async fn maybe_nak(&self, repeater_id: u32, addr: SocketAddr, socket: &UdpSocket) {
        if self.rejected.should_send(repeater_id, addr) {
            self.metrics.nak_sent(repeater_id);
            self.send_handshake(&Handshake::Mstnak { repeater_id }, addr, socket).await;
        }
    }
}
