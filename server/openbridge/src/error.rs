use thiserror::Error;

/// §7 errors for the OpenBridge endpoint. HMAC mismatch is an *auth*
/// error (§7): never surfaced on the wire (the dialect has no NAK/close of
/// its own), just a dropped packet and a debug log.
#[derive(Error, Debug)]
pub enum OpenBridgeError {
    #[error("failed to bind OpenBridge UDP socket on {addr}: {source}")]
    Bind { addr: std::net::SocketAddr, #[source] source: std::io::Error },

    #[error("socket I/O error: {0}")]
    Io(#[source] std::io::Error),
}

pub type OpenBridgeResult<T> = Result<T, OpenBridgeError>;
