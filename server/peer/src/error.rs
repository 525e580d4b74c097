use thiserror::Error;

/// §7 *resource*/*auth* errors for the PEER client side of the handshake.
/// None of these are fatal to the host process: a caller that wants
/// reconnection loops `PeerClient::run` and logs the error.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("socket I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[error("failed to encode outgoing packet: {0}")]
    Wire(#[source] nexus_wire::WireError),

    #[error("handshake timed out waiting for an acknowledgement")]
    HandshakeTimeout,

    #[error("handshake protocol violation: {0}")]
    HandshakeProtocol(&'static str),

    #[error("master closed the connection (MSTCL)")]
    ClosedByMaster,

    #[error("cancelled before the handshake completed")]
    Cancelled,

    #[error("send_dmrd called before the handshake completed")]
    NotConnected,
}

pub type PeerResult<T> = Result<T, PeerError>;
