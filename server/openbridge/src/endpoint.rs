use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nexus_core::{Metrics, NoopMetrics};
use nexus_wire::{CallType, Dmrd, Timeslot, DMRD_OPENBRIDGE_LEN, DMRD_STANDARD_LEN, DMRD_TAG};

use crate::config::OpenBridgeConfig;
use crate::error::{OpenBridgeError, OpenBridgeResult};
use crate::hmac;
use crate::sink::{DmrdSink, NoopDmrdSink};

/// No handshake in this dialect: binding the socket *is* "connecting".
/// Every inbound 73-byte DMRD is independently verified; there is no
/// per-sender state to track.
pub struct OpenBridgeEndpoint {
    config: OpenBridgeConfig,
    sink: Arc<dyn DmrdSink>,
    metrics: Arc<dyn Metrics>,
    socket: OnceCell<Arc<UdpSocket>>,
}

impl OpenBridgeEndpoint {
    pub fn new(config: OpenBridgeConfig) -> Self {
        Self::with_collaborators(config, Arc::new(NoopDmrdSink), Arc::new(NoopMetrics))
    }

    pub fn with_collaborators(config: OpenBridgeConfig, sink: Arc<dyn DmrdSink>, metrics: Arc<dyn Metrics>) -> Self {
        Self { config, sink, metrics, socket: OnceCell::new() }
    }

    /// Binds the UDP socket and serves inbound frames until `cancel`
    /// fires. There is no cleanup loop (§3: no per-sender state here to
    /// age out).
    pub async fn serve(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let socket = UdpSocket::bind(self.config.bind_addr)
            .await
            .map_err(|source| OpenBridgeError::Bind { addr: self.config.bind_addr, source })?;
        info!(addr = %self.config.bind_addr, system = %self.config.system_name, "OpenBridge listening");
        let socket = Arc::new(socket);
        let _ = self.socket.set(socket.clone());

        let mut buf = vec![0u8; 2048];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(system = %self.config.system_name, "OpenBridge shutting down");
                    return Ok(());
                }
                result = socket.recv_from(&mut buf) => {
                    let (len, addr) = match result {
                        Ok(v) => v,
                        Err(e) => { warn!(error = %e, "OpenBridge recv_from failed"); continue; }
                    };
                    self.handle_datagram(&buf[..len], addr).await;
                }
            }
        }
    }

    /// §4.8 ingress: length, tag, HMAC, then the both-slots policy. Any
    /// failure is a silent drop at debug level; there is no NAK in this
    /// dialect.
    async fn handle_datagram(&self, bytes: &[u8], addr: SocketAddr) {
        if bytes.len() != DMRD_OPENBRIDGE_LEN {
            debug!(len = bytes.len(), %addr, "OpenBridge dropped frame of unexpected length");
            return;
        }
        if &bytes[0..4] != DMRD_TAG {
            debug!(%addr, "OpenBridge dropped frame with wrong tag");
            return;
        }
        let (body, tag) = bytes.split_at(DMRD_STANDARD_LEN);
        if !hmac::verify(body, &self.config.passphrase, tag) {
            debug!(%addr, "OpenBridge rejected frame: HMAC verification failed");
            self.metrics.dmrd_dropped("openbridge-hmac");
            return;
        }

        let dmrd = match Dmrd::parse(body) {
            Ok(d) => d,
            Err(e) => {
                debug!(%e, %addr, "OpenBridge dropped unparsable frame body");
                return;
            }
        };
        if !self.admits(&dmrd) {
            debug!(tgid = dmrd.dst_id, "OpenBridge dropped TS2 group call: both_slots disabled");
            return;
        }

        self.metrics.dmrd_received(bytes.len());
        self.sink.on_dmrd(body).await;
    }

    /// Private calls and TS1 traffic always pass; TS2 group calls pass
    /// only when `both_slots` is enabled (§4.8).
    fn admits(&self, dmrd: &Dmrd) -> bool {
        if self.config.both_slots {
            return true;
        }
        !(dmrd.slot.call_type == CallType::Group && dmrd.slot.timeslot == Timeslot::Ts2)
    }

    /// §4.8 egress: stamp the configured network ID into the repeater-ID
    /// field, sign, and send to the remote endpoint. Errors if called
    /// before `serve` has bound a socket.
    pub async fn send_dmrd(&self, dmrd: &Dmrd) -> OpenBridgeResult<usize> {
        let socket = self.socket.get().ok_or(OpenBridgeError::Io(std::io::Error::other("OpenBridge socket not bound yet")))?;
        let mut outgoing = dmrd.clone();
        outgoing.repeater_id = self.config.network_id;
        outgoing.hmac = None;
        let body = outgoing.encode();
        let tag = hmac::sign(&body, &self.config.passphrase);

        let mut out = body;
        out.extend_from_slice(&tag);
        self.metrics.dmrd_forwarded(1);
        socket.send_to(&out, self.config.remote_addr).await.map_err(OpenBridgeError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nexus_wire::{FrameType, SlotByte};
    use tokio::sync::mpsc;

    struct CollectingSink(mpsc::UnboundedSender<Vec<u8>>);

    #[async_trait]
    impl DmrdSink for CollectingSink {
        async fn on_dmrd(&self, raw: &[u8]) {
            let _ = self.0.send(raw.to_vec());
        }
    }

    fn sample_dmrd(dst: u32, ts: Timeslot, call: CallType) -> Dmrd {
        Dmrd {
            seq: 0,
            src_id: 0x312001,
            dst_id: dst,
            repeater_id: 0,
            slot: SlotByte { timeslot: ts, call_type: call, frame_type: FrameType::Voice, data_type: 0 },
            stream_id: 7,
            payload: [0x55; nexus_wire::dmrd::DMRD_PAYLOAD_LEN],
            hmac: None,
        }
    }

    fn cfg(bind: SocketAddr, remote: SocketAddr, both_slots: bool) -> OpenBridgeConfig {
        OpenBridgeConfig {
            system_name: "OB-A".into(),
            bind_addr: bind,
            remote_addr: remote,
            passphrase: "password".into(),
            network_id: 99999,
            both_slots,
        }
    }

    #[tokio::test]
    async fn accepts_a_correctly_signed_frame_and_rejects_a_wrong_passphrase() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Arc::new(CollectingSink(tx));
        let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let endpoint = Arc::new(OpenBridgeEndpoint::with_collaborators(
            cfg(bind_addr, "127.0.0.1:1".parse().unwrap(), true),
            sink,
            Arc::new(NoopMetrics),
        ));

        let cancel = CancellationToken::new();
        let listener = endpoint.clone();
        let cancel_clone = cancel.clone();
        let serve_task = tokio::spawn(async move { listener.serve(cancel_clone).await });

        // Poll until the socket is bound.
        let bound_addr = loop {
            if let Some(s) = endpoint.socket.get() {
                break s.local_addr().unwrap();
            }
            tokio::task::yield_now().await;
        };

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let body = sample_dmrd(3100, Timeslot::Ts1, CallType::Group).encode();
        let tag = hmac::sign(&body, "password");
        let mut good = body.clone();
        good.extend_from_slice(&tag);
        sender.send_to(&good, bound_addr).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(received, body);

        let wrong_tag = hmac::sign(&body, "wrongpass");
        let mut bad = body;
        bad.extend_from_slice(&wrong_tag);
        sender.send_to(&bad, bound_addr).await.unwrap();

        let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err(), "a mis-signed frame must never reach the sink");

        cancel.cancel();
        let _ = serve_task.await;
    }

    #[tokio::test]
    async fn both_slots_disabled_drops_ts2_group_but_keeps_private_and_ts1() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Arc::new(CollectingSink(tx));
        let endpoint = Arc::new(OpenBridgeEndpoint::with_collaborators(
            cfg("127.0.0.1:0".parse().unwrap(), "127.0.0.1:1".parse().unwrap(), false),
            sink,
            Arc::new(NoopMetrics),
        ));

        let cancel = CancellationToken::new();
        let listener = endpoint.clone();
        let cancel_clone = cancel.clone();
        let serve_task = tokio::spawn(async move { listener.serve(cancel_clone).await });
        let bound_addr = loop {
            if let Some(s) = endpoint.socket.get() {
                break s.local_addr().unwrap();
            }
            tokio::task::yield_now().await;
        };
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let ts2_group = sample_dmrd(3100, Timeslot::Ts2, CallType::Group).encode();
        let mut signed = ts2_group.clone();
        signed.extend_from_slice(&hmac::sign(&ts2_group, "password"));
        sender.send_to(&signed, bound_addr).await.unwrap();
        let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err(), "TS2 group calls must be dropped when both_slots is disabled");

        let private = sample_dmrd(3120002, Timeslot::Ts2, CallType::Private).encode();
        let mut signed = private.clone();
        signed.extend_from_slice(&hmac::sign(&private, "password"));
        sender.send_to(&signed, bound_addr).await.unwrap();
        let received = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(received, private);

        cancel.cancel();
        let _ = serve_task.await;
    }
}
