use thiserror::Error;

/// Wire-level parse failures. Never surfaced to a peer; callers log at
/// debug level and drop the packet (spec §7: *parse* errors degrade into
/// drops, they are never fatal).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("packet too short: {len} bytes")]
    TooShort { len: usize },

    #[error("unrecognized tag prefix")]
    UnknownTag,

    #[error("length {len} does not match expected length for tag {tag:?}")]
    BadLength { tag: &'static str, len: usize },

    #[error("non-ascii byte in fixed-width text field")]
    NotAscii,

    #[error("invalid OPTIONS syntax: {0}")]
    BadOptions(&'static str),

    #[error("numeric field out of range: {0}")]
    OutOfRange(&'static str),
}

pub type WireResult<T> = Result<T, WireError>;
