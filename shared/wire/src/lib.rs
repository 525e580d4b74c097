//! Wire codec for the HomeBrew/MMDVM DMR repeater protocol.
//!
//! Pure parse/encode, no I/O. `Dmrd` is the hot-path voice/data frame;
//! `Handshake` covers the ten control messages (§6). Multi-byte integers
//! are big-endian; 24-bit radio IDs live in the low 24 bits of a `u32`.

pub mod dmrd;
pub mod error;
pub mod handshake;
pub mod options;
pub mod slot;

pub use dmrd::{Dmrd, DMRD_OPENBRIDGE_LEN, DMRD_STANDARD_LEN, DMRD_TAG};
pub use error::{WireError, WireResult};
pub use handshake::{Handshake, RptcConfig};
pub use options::{
    OptionsDirective, AUTO_TTL_MAX_SECONDS, AUTO_TTL_MIN_SECONDS, DEFAULT_AUTO_TTL_SECONDS,
    MAX_STATIC_TALKGROUPS_PER_SLOT,
};
pub use slot::{CallType, FrameType, SlotByte, Timeslot};

/// Any wire packet this protocol family can carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Dmrd(Dmrd),
    Handshake(Handshake),
}

impl Packet {
    /// Tries DMRD first since it is the hot path and has a cheap tag check;
    /// falls back to the handshake family.
    pub fn parse(bytes: &[u8]) -> WireResult<Self> {
        if bytes.len() >= 4 && &bytes[0..4] == DMRD_TAG {
            return Ok(Packet::Dmrd(Dmrd::parse(bytes)?));
        }
        Ok(Packet::Handshake(Handshake::parse(bytes)?))
    }

    pub fn encode(&self) -> WireResult<Vec<u8>> {
        match self {
            Packet::Dmrd(d) => Ok(d.encode()),
            Packet::Handshake(h) => h.encode(),
        }
    }
}
