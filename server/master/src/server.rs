use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nexus_core::{BridgeRouter, BridgeRuleConfig, Metrics, MutedStreams, NoopMetrics, PeerRegistry, RejectedOrigins, SubscriberLocations};
use nexus_wire::Packet;

use crate::config::MasterConfig;
use crate::forwarder::{NoopSystemForwarder, SystemForwarder};

/// Reads close enough to the standard 53-byte DMRD to cover the 73-byte
/// OpenBridge variant too, though the MASTER socket only ever expects the
/// former; a generous buffer keeps a misbehaving peer's oversized packet
/// from truncating silently mid-field.
const RECV_BUF_LEN: usize = 2048;

/// Central UDP listener for one configured MASTER system (§4.5). Owns the
/// peer registry, the bridge router, and the per-server bookkeeping maps;
/// delegates cross-system delivery to an injected `SystemForwarder`.
pub struct MasterServer {
    pub(crate) config: MasterConfig,
    pub(crate) registry: PeerRegistry,
    pub(crate) router: Arc<BridgeRouter>,
    pub(crate) locations: SubscriberLocations,
    pub(crate) muted: MutedStreams,
    pub(crate) rejected: RejectedOrigins,
    pub(crate) forwarder: Arc<dyn SystemForwarder>,
    pub(crate) metrics: Arc<dyn Metrics>,
    /// Cached once `serve` binds, so `deliver_bridged` (driven by
    /// `nexus-hub`'s cross-system forwarding, not this system's own
    /// `recv_from` loop) has a socket to fan frames out on.
    pub(crate) socket: OnceCell<Arc<UdpSocket>>,
}

impl MasterServer {
    pub fn new(config: MasterConfig, bridges: HashMap<String, Vec<BridgeRuleConfig>>) -> Self {
        Self::with_collaborators(config, bridges, Arc::new(NoopSystemForwarder), Arc::new(NoopMetrics))
    }

    pub fn with_collaborators(
        config: MasterConfig,
        bridges: HashMap<String, Vec<BridgeRuleConfig>>,
        forwarder: Arc<dyn SystemForwarder>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        Self::with_shared_router(config, Arc::new(BridgeRouter::new(bridges)), forwarder, metrics)
    }

    /// Used by `nexus-hub`, which builds a single `BridgeRouter` for the
    /// whole configuration document and shares it across every system that
    /// document names — a bridge rule's `active` flag and dynamic-bridge
    /// membership are process-wide state, not per-MASTER-instance state.
    pub fn with_shared_router(
        config: MasterConfig,
        router: Arc<BridgeRouter>,
        forwarder: Arc<dyn SystemForwarder>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        let rejected = RejectedOrigins::new(config.nak_cooldown);
        Self {
            config,
            registry: PeerRegistry::new(),
            router,
            locations: SubscriberLocations::new(),
            muted: MutedStreams::new(),
            rejected,
            forwarder,
            metrics,
            socket: OnceCell::new(),
        }
    }

    /// Binds the UDP socket, spawns the cleanup loop, and serves datagrams
    /// until `cancel` fires. Each datagram is dispatched on its own task so
    /// one peer's slow handshake round-trip never blocks another's.
    pub async fn serve(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let socket = UdpSocket::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("bind MASTER UDP socket on {}", self.config.bind_addr))?;
        info!(addr = %self.config.bind_addr, system = %self.config.system_name, "MASTER listening");
        let socket = Arc::new(socket);
        let _ = self.socket.set(socket.clone());

        let cleanup_handle = {
            let this = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.run_cleanup_loop(cancel).await })
        };

        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(system = %self.config.system_name, "MASTER shutting down");
                    break;
                }
                result = socket.recv_from(&mut buf) => {
                    let (len, addr) = match result {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, "MASTER recv_from failed");
                            continue;
                        }
                    };
                    let bytes = buf[..len].to_vec();
                    let this = self.clone();
                    let socket = socket.clone();
                    tokio::spawn(async move { this.handle_datagram(&bytes, addr, &socket).await });
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    async fn handle_datagram(&self, bytes: &[u8], addr: SocketAddr, socket: &UdpSocket) {
        let packet = match Packet::parse(bytes) {
            Ok(p) => p,
            Err(e) => {
                debug!(%e, %addr, "MASTER dropped unparsable packet");
                return;
            }
        };
        match packet {
            Packet::Handshake(hs) => self.handle_handshake(hs, addr, socket).await,
            Packet::Dmrd(dmrd) => self.handle_dmrd(&dmrd, bytes, addr, socket).await,
        }
    }

    pub(crate) async fn send_handshake(&self, hs: &nexus_wire::Handshake, addr: SocketAddr, socket: &UdpSocket) {
        let bytes = match hs.encode() {
            Ok(b) => b,
            Err(e) => {
                warn!(%e, "failed to encode outgoing handshake message");
                return;
            }
        };
        self.send_raw(&bytes, addr, socket).await;
    }

    pub(crate) async fn send_raw(&self, bytes: &[u8], addr: SocketAddr, socket: &UdpSocket) {
        if let Err(e) = socket.send_to(bytes, addr).await {
            warn!(%e, %addr, "MASTER send failed");
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn router(&self) -> &BridgeRouter {
        self.router.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::auth;
    use nexus_wire::{CallType, Dmrd, FrameType, Handshake, RptcConfig, SlotByte, Timeslot};
    use std::time::Duration;

    fn config(bind: SocketAddr, passphrase: &str, max_peers: Option<usize>) -> MasterConfig {
        MasterConfig {
            system_name: "MASTER-A".into(),
            bind_addr: bind,
            passphrase: passphrase.into(),
            repeat: false,
            max_peers,
            use_acl: false,
            reg_acl: None,
            sub_acl: None,
            tg1_acl: None,
            tg2_acl: None,
            private_calls_enabled: true,
            ping_timeout: Duration::from_secs(30),
            cleanup_period: Duration::from_secs(3600),
            nak_cooldown: Duration::from_secs(5),
            dynamic_bridge_idle: Duration::from_secs(300),
        }
    }

    fn rptc_record(callsign: &str) -> RptcConfig {
        RptcConfig {
            callsign: callsign.into(),
            rx_freq: "000000000".into(),
            tx_freq: "000000000".into(),
            tx_power: "00".into(),
            color_code: "01".into(),
            lat: "0.0000".into(),
            lon: "0.00000".into(),
            height: "0".into(),
            location: String::new(),
            description: String::new(),
            slots: "0".into(),
            url: String::new(),
            software: "test".into(),
            package: "1".into(),
        }
    }

    /// Drives a full RPTL->RPTK->RPTC handshake over `socket` from a fake
    /// repeater client. Panics (via `unwrap`) on any unexpected reply,
    /// which is exactly what a test should do.
    async fn handshake(socket: &UdpSocket, master_addr: SocketAddr, id: u32, passphrase: &str, callsign: &str) {
        let mut buf = [0u8; 2048];
        socket.send_to(&Handshake::Rptl { repeater_id: id }.encode().unwrap(), master_addr).await.unwrap();
        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        let salt = match Handshake::parse(&buf[..len]).unwrap() {
            Handshake::Rptack { salt: Some(s), .. } => s,
            other => panic!("expected RPTACK with salt, got {other:?}"),
        };

        let challenge = auth::compute_challenge(&salt, passphrase);
        socket.send_to(&Handshake::Rptk { repeater_id: id, challenge }.encode().unwrap(), master_addr).await.unwrap();
        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        assert!(matches!(Handshake::parse(&buf[..len]).unwrap(), Handshake::Rptack { salt: None, .. }));

        socket
            .send_to(&Handshake::Rptc { repeater_id: id, config: rptc_record(callsign) }.encode().unwrap(), master_addr)
            .await
            .unwrap();
        let (len, _) = socket.recv_from(&mut buf).await.unwrap();
        assert!(matches!(Handshake::parse(&buf[..len]).unwrap(), Handshake::Rptack { salt: None, .. }));
    }

    fn sample_dmrd(src: u32, dst: u32, repeater_id: u32, stream_id: u32, frame_type: FrameType) -> Dmrd {
        Dmrd {
            seq: 0,
            src_id: src,
            dst_id: dst,
            repeater_id,
            slot: SlotByte { timeslot: Timeslot::Ts1, call_type: CallType::Group, frame_type, data_type: 0 },
            stream_id,
            payload: [0x5A; nexus_wire::dmrd::DMRD_PAYLOAD_LEN],
            hmac: None,
        }
    }

    #[tokio::test]
    async fn two_connected_peers_exchange_a_group_call() {
        let server = Arc::new(MasterServer::new(config("127.0.0.1:0".parse().unwrap(), "s3cret", None), Default::default()));
        let cancel = CancellationToken::new();
        let bind_addr = {
            let listener = server.clone();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move { listener.serve(cancel_clone).await });
            loop {
                if let Some(s) = server.socket.get() {
                    break s.local_addr().unwrap();
                }
                tokio::task::yield_now().await;
            }
        };

        let repeater_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let repeater_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        handshake(&repeater_a, bind_addr, 312_001, "s3cret", "W1AAA").await;
        handshake(&repeater_b, bind_addr, 312_002, "s3cret", "W1BBB").await;

        // repeater_b opts into repeat-all (TGID 777) so it gets every group
        // frame regardless of its own talkgroup subscriptions.
        let repeat_all_on = sample_dmrd(3_120_002, nexus_core::special_tgid::REPEAT_ALL_ON, 312_002, 1, FrameType::Voice);
        repeater_b.send_to(&repeat_all_on.encode(), bind_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The header frame activates repeater_a's dynamic subscription to
        // TG 3100 and is the first-keyup frame on this stream, so it is
        // never fanned out anywhere. The terminator on the same stream is
        // ordinary traffic and reaches repeater_b, unchanged down to its
        // original repeater_id.
        let header = sample_dmrd(3_120_001, 3100, 312_001, 42, FrameType::VoiceHeader);
        repeater_a.send_to(&header.encode(), bind_addr).await.unwrap();
        let terminator = sample_dmrd(3_120_001, 3100, 312_001, 42, FrameType::VoiceTerminator);
        repeater_a.send_to(&terminator.encode(), bind_addr).await.unwrap();

        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), repeater_b.recv_from(&mut buf)).await.unwrap().unwrap();
        let forwarded = Dmrd::parse(&buf[..len]).unwrap();
        assert_eq!(forwarded.src_id, 3_120_001);
        assert_eq!(forwarded.repeater_id, 312_001, "forwarding must be byte-for-byte verbatim, never rewriting the source's own repeater_id");

        cancel.cancel();
    }

    #[tokio::test]
    async fn max_peers_rejects_a_new_registration_once_the_limit_is_reached() {
        let server = Arc::new(MasterServer::new(config("127.0.0.1:0".parse().unwrap(), "s3cret", Some(1)), Default::default()));
        let cancel = CancellationToken::new();
        let bind_addr = {
            let listener = server.clone();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move { listener.serve(cancel_clone).await });
            loop {
                if let Some(s) = server.socket.get() {
                    break s.local_addr().unwrap();
                }
                tokio::task::yield_now().await;
            }
        };

        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        handshake(&first, bind_addr, 312_001, "s3cret", "W1AAA").await;

        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 2048];
        second.send_to(&Handshake::Rptl { repeater_id: 312_002 }.encode().unwrap(), bind_addr).await.unwrap();
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), second.recv_from(&mut buf)).await.unwrap().unwrap();
        assert!(matches!(Handshake::parse(&buf[..len]).unwrap(), Handshake::Mstcl { repeater_id: 312_002 }));

        cancel.cancel();
    }
}
