use thiserror::Error;

/// Core-domain errors, grouped by the kinds spec'd for this system: *parse*
/// and *stale* never surface past a debug log and a dropped packet; *auth*
/// produces a rate-limited NAK or a close-connection; *config* is fatal at
/// startup only (validated in `nexus-config`, not here).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("registration denied by ACL for id {0}")]
    RegistrationDenied(u32),

    #[error("handshake message received out of order for current phase")]
    AuthBadState,

    #[error("challenge response did not match expected hash")]
    AuthChallengeMismatch,

    #[error("unknown peer id {0}")]
    UnknownPeer(u32),

    #[error("wire parse error: {0}")]
    Wire(#[from] nexus_wire::WireError),
}

pub type CoreResult<T> = Result<T, CoreError>;
