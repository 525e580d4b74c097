use crate::error::{WireError, WireResult};
use crate::slot::SlotByte;

pub const DMRD_TAG: &[u8] = b"DMRD";
pub const DMRD_STANDARD_LEN: usize = 53;
pub const DMRD_OPENBRIDGE_LEN: usize = 73;
const DMRD_HMAC_LEN: usize = 20;
pub const DMRD_PAYLOAD_LEN: usize = 33;

/// A parsed DMR Data frame. 24-bit source/destination IDs are stored in the
/// low 24 bits of a `u32`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dmrd {
    pub seq: u8,
    pub src_id: u32,
    pub dst_id: u32,
    pub repeater_id: u32,
    pub slot: SlotByte,
    pub stream_id: u32,
    pub payload: [u8; DMRD_PAYLOAD_LEN],
    /// Present only for the 73-byte OpenBridge variant.
    pub hmac: Option<[u8; DMRD_HMAC_LEN]>,
}

impl Dmrd {
    /// Parses a DMRD frame. Accepts both the 53-byte standard length and
    /// the 73-byte OpenBridge length (with its trailing HMAC-SHA1).
    pub fn parse(bytes: &[u8]) -> WireResult<Self> {
        if bytes.len() != DMRD_STANDARD_LEN && bytes.len() != DMRD_OPENBRIDGE_LEN {
            return Err(WireError::BadLength { tag: "DMRD", len: bytes.len() });
        }
        if &bytes[0..4] != DMRD_TAG {
            return Err(WireError::UnknownTag);
        }

        let seq = bytes[4];
        let src_id = read_u24(&bytes[5..8]);
        let dst_id = read_u24(&bytes[8..11]);
        let repeater_id = u32::from_be_bytes(bytes[11..15].try_into().unwrap());
        let slot = SlotByte::parse(bytes[15])?;
        let stream_id = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
        let mut payload = [0u8; DMRD_PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[20..53]);

        let hmac = if bytes.len() == DMRD_OPENBRIDGE_LEN {
            let mut h = [0u8; DMRD_HMAC_LEN];
            h.copy_from_slice(&bytes[53..73]);
            Some(h)
        } else {
            None
        };

        Ok(Self { seq, src_id, dst_id, repeater_id, slot, stream_id, payload, hmac })
    }

    /// Total byte length this frame would encode to (53 or 73).
    pub fn encoded_len(&self) -> usize {
        if self.hmac.is_some() {
            DMRD_OPENBRIDGE_LEN
        } else {
            DMRD_STANDARD_LEN
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(DMRD_TAG);
        out.push(self.seq);
        out.extend_from_slice(&write_u24(self.src_id));
        out.extend_from_slice(&write_u24(self.dst_id));
        out.extend_from_slice(&self.repeater_id.to_be_bytes());
        out.push(self.slot.encode());
        out.extend_from_slice(&self.stream_id.to_be_bytes());
        out.extend_from_slice(&self.payload);
        if let Some(hmac) = self.hmac {
            out.extend_from_slice(&hmac);
        }
        out
    }
}

fn read_u24(b: &[u8]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32)
}

fn write_u24(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}
