use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nexus_core::auth;
use nexus_wire::{Handshake, Packet};

use crate::config::PeerConfig;
use crate::error::{PeerError, PeerResult};
use crate::sink::{DmrdSink, NoopDmrdSink};

const RECV_BUF_LEN: usize = 2048;

/// The PEER-side mirror of §4.7's handshake: retransmits RPTL until
/// RPTACK, then RPTK, then RPTC, then settles into a 5 s keepalive loop.
/// Tears down on `MSTCL` or on losing pongs past `ping_timeout`.
pub struct PeerClient {
    config: PeerConfig,
    sink: Arc<dyn DmrdSink>,
    socket: OnceCell<Arc<UdpSocket>>,
}

impl PeerClient {
    pub fn new(config: PeerConfig) -> Self {
        Self::with_sink(config, Arc::new(NoopDmrdSink))
    }

    pub fn with_sink(config: PeerConfig, sink: Arc<dyn DmrdSink>) -> Self {
        Self { config, sink, socket: OnceCell::new() }
    }

    /// Runs one connection lifetime: handshake, then keepalive loop until
    /// the master closes, a pong is missed, or `cancel` fires. Callers
    /// that want automatic reconnection should loop this call themselves,
    /// observing the returned error to decide on backoff.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let socket = self.connect(&cancel).await?;
        info!(system = %self.config.system_name, id = self.config.repeater_id, master = %self.config.master_addr, "PEER connected");
        self.keepalive_loop(&socket, cancel).await;
        Ok(())
    }

    /// Binds a UDP socket, connects it to the configured master address,
    /// and drives the handshake to completion. On success the socket is
    /// cached for `send_dmrd` and also returned so `run` can drive the
    /// keepalive loop over the same handle.
    async fn connect(&self, cancel: &CancellationToken) -> PeerResult<Arc<UdpSocket>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(PeerError::Io)?;
        socket.connect(self.config.master_addr).await.map_err(PeerError::Io)?;
        let socket = Arc::new(socket);

        self.handshake(&socket, cancel).await?;
        let _ = self.socket.set(socket.clone());
        Ok(socket)
    }

    async fn handshake(&self, socket: &UdpSocket, cancel: &CancellationToken) -> PeerResult<()> {
        let salt = self
            .send_until_ack(socket, cancel, &Handshake::Rptl { repeater_id: self.config.repeater_id })
            .await?
            .ok_or(PeerError::HandshakeProtocol("RPTACK to RPTL carried no salt"))?;

        let challenge = auth::compute_challenge(&salt, &self.config.passphrase);
        self.send_until_ack(socket, cancel, &Handshake::Rptk { repeater_id: self.config.repeater_id, challenge }).await?;

        let record = self.config.to_rptc_config();
        self.send_until_ack(socket, cancel, &Handshake::Rptc { repeater_id: self.config.repeater_id, config: record }).await?;

        Ok(())
    }

    /// Retransmits `msg` every `retry_interval` until an RPTACK addressed
    /// to our own id arrives, `handshake_timeout` elapses in total, an
    /// MSTCL arrives, or `cancel` fires. Returns the ack's salt field
    /// (only meaningful for the RPTL -> RPTACK exchange; `None` otherwise).
    async fn send_until_ack(
        &self,
        socket: &UdpSocket,
        cancel: &CancellationToken,
        msg: &Handshake,
    ) -> PeerResult<Option<[u8; 32]>> {
        let deadline = Instant::now() + self.config.handshake_timeout;
        let bytes = msg.encode().map_err(PeerError::Wire)?;
        let mut buf = vec![0u8; RECV_BUF_LEN];

        loop {
            if Instant::now() >= deadline {
                return Err(PeerError::HandshakeTimeout);
            }
            socket.send(&bytes).await.map_err(PeerError::Io)?;

            let wait = deadline.saturating_duration_since(Instant::now()).min(self.config.retry_interval);
            tokio::select! {
                _ = cancel.cancelled() => return Err(PeerError::Cancelled),
                _ = tokio::time::sleep(wait) => continue,
                result = socket.recv(&mut buf) => {
                    let len = result.map_err(PeerError::Io)?;
                    match Handshake::parse(&buf[..len]) {
                        Ok(Handshake::Rptack { repeater_id, salt }) if repeater_id == self.config.repeater_id => {
                            return Ok(salt);
                        }
                        Ok(Handshake::Mstcl { repeater_id }) if repeater_id == self.config.repeater_id => {
                            return Err(PeerError::ClosedByMaster);
                        }
                        Ok(_) => continue,
                        Err(e) => {
                            debug!(%e, "PEER dropped unparsable handshake reply");
                            continue;
                        }
                    }
                }
            }
        }
    }

    async fn keepalive_loop(&self, socket: &UdpSocket, cancel: CancellationToken) {
        let mut ping_timer = tokio::time::interval(self.config.ping_interval);
        let mut last_pong = Instant::now();
        let mut buf = vec![0u8; RECV_BUF_LEN];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.send_close(socket).await;
                    return;
                }
                _ = ping_timer.tick() => {
                    if last_pong.elapsed() > self.config.ping_timeout {
                        warn!(id = self.config.repeater_id, "PEER lost master: no pong within timeout");
                        return;
                    }
                    if let Ok(bytes) = (Handshake::RptPing { repeater_id: self.config.repeater_id }).encode() {
                        if let Err(e) = socket.send(&bytes).await {
                            warn!(%e, "PEER ping send failed");
                        }
                    }
                }
                result = socket.recv(&mut buf) => {
                    match result {
                        Ok(len) if self.handle_datagram(&buf[..len], &mut last_pong).await => return,
                        Ok(_) => {}
                        Err(e) => warn!(%e, "PEER recv failed"),
                    }
                }
            }
        }
    }

    /// Returns `true` iff the connection should end (master closed us).
    async fn handle_datagram(&self, bytes: &[u8], last_pong: &mut Instant) -> bool {
        match Packet::parse(bytes) {
            Ok(Packet::Dmrd(_)) => {
                self.sink.on_dmrd(bytes).await;
                false
            }
            Ok(Packet::Handshake(Handshake::Mstpong { repeater_id })) if repeater_id == self.config.repeater_id => {
                *last_pong = Instant::now();
                false
            }
            Ok(Packet::Handshake(Handshake::Mstcl { repeater_id })) if repeater_id == self.config.repeater_id => {
                info!(id = self.config.repeater_id, "PEER closed by master");
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(%e, "PEER dropped unparsable datagram");
                false
            }
        }
    }

    async fn send_close(&self, socket: &UdpSocket) {
        if let Ok(bytes) = (Handshake::Rptcl { repeater_id: self.config.repeater_id }).encode() {
            let _ = socket.send(&bytes).await;
        }
    }

    /// Sends a raw DMRD frame verbatim to the connected master. Errors if
    /// called before the handshake has completed.
    pub async fn send_dmrd(&self, raw: &[u8]) -> PeerResult<usize> {
        let socket = self.socket.get().ok_or(PeerError::NotConnected)?;
        socket.send(raw).await.map_err(PeerError::Io)
    }
}
