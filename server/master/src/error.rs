use thiserror::Error;

/// §7 *resource* errors for the MASTER server. Bind failure is fatal at
/// startup; everything else the server degrades into a logged drop.
#[derive(Error, Debug)]
pub enum MasterError {
    #[error("failed to bind MASTER UDP socket on {addr}: {source}")]
    Bind { addr: std::net::SocketAddr, #[source] source: std::io::Error },
}

pub type MasterResult<T> = Result<T, MasterError>;
