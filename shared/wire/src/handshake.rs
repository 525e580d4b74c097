use crate::error::{WireError, WireResult};

const CHALLENGE_LEN: usize = 32;

/// Fixed-width ASCII fields of an RPTC configuration record (space-padded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RptcConfig {
    pub callsign: String,
    pub rx_freq: String,
    pub tx_freq: String,
    pub tx_power: String,
    pub color_code: String,
    pub lat: String,
    pub lon: String,
    pub height: String,
    pub location: String,
    pub description: String,
    pub slots: String,
    pub url: String,
    pub software: String,
    pub package: String,
}

/// (field name, width) in wire order, after the 4-byte repeater id.
const RPTC_FIELDS: &[(&str, usize)] = &[
    ("callsign", 8),
    ("rx_freq", 9),
    ("tx_freq", 9),
    ("tx_power", 2),
    ("color_code", 2),
    ("lat", 8),
    ("lon", 9),
    ("height", 3),
    ("location", 20),
    ("description", 19),
    ("slots", 1),
    ("url", 124),
    ("software", 40),
    ("package", 40),
];

pub const RPTC_BODY_LEN: usize = 298; // repeater(4) + sum of RPTC_FIELDS
pub const RPTC_LEN: usize = 4 + RPTC_BODY_LEN; // tag + body

impl RptcConfig {
    fn parse(bytes: &[u8]) -> WireResult<Self> {
        let mut offset = 0usize;
        let mut values: Vec<String> = Vec::with_capacity(RPTC_FIELDS.len());
        for (_name, width) in RPTC_FIELDS {
            let field = &bytes[offset..offset + width];
            if !field.is_ascii() {
                return Err(WireError::NotAscii);
            }
            let s = std::str::from_utf8(field).map_err(|_| WireError::NotAscii)?;
            values.push(s.trim_end().to_string());
            offset += width;
        }
        let mut it = values.into_iter();
        Ok(Self {
            callsign: it.next().unwrap(),
            rx_freq: it.next().unwrap(),
            tx_freq: it.next().unwrap(),
            tx_power: it.next().unwrap(),
            color_code: it.next().unwrap(),
            lat: it.next().unwrap(),
            lon: it.next().unwrap(),
            height: it.next().unwrap(),
            location: it.next().unwrap(),
            description: it.next().unwrap(),
            slots: it.next().unwrap(),
            url: it.next().unwrap(),
            software: it.next().unwrap(),
            package: it.next().unwrap(),
        })
    }

    fn encode(&self) -> WireResult<Vec<u8>> {
        let fields = [
            &self.callsign,
            &self.rx_freq,
            &self.tx_freq,
            &self.tx_power,
            &self.color_code,
            &self.lat,
            &self.lon,
            &self.height,
            &self.location,
            &self.description,
            &self.slots,
            &self.url,
            &self.software,
            &self.package,
        ];
        let mut out = Vec::with_capacity(RPTC_BODY_LEN - 4);
        for (value, (name, width)) in fields.iter().zip(RPTC_FIELDS.iter()) {
            if !value.is_ascii() {
                return Err(WireError::NotAscii);
            }
            if value.len() > *width {
                return Err(WireError::OutOfRange(name));
            }
            out.extend_from_slice(value.as_bytes());
            out.extend(std::iter::repeat(b' ').take(width - value.len()));
        }
        Ok(out)
    }
}

/// A HomeBrew/MMDVM handshake or control message. `DMRD` is handled
/// separately in `dmrd.rs` since it carries the hot-path voice/data frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handshake {
    /// Login: repeater announces its ID.
    Rptl { repeater_id: u32 },
    /// Key: repeater sends its 32-byte login challenge.
    Rptk { repeater_id: u32, challenge: [u8; CHALLENGE_LEN] },
    /// Config: repeater sends its fixed-width configuration record.
    Rptc { repeater_id: u32, config: RptcConfig },
    /// Options: repeater sends a free-form OPTIONS string.
    Rpto { repeater_id: u32, options: String },
    /// Keepalive ping from a repeater.
    RptPing { repeater_id: u32 },
    /// Repeater-initiated close.
    Rptcl { repeater_id: u32 },
    /// Master's acknowledgement of RPTL/RPTK/RPTC/RPTO. The login
    /// acknowledgement additionally carries the 32-byte salt the master
    /// generated for this peer; every later acknowledgement carries none.
    Rptack { repeater_id: u32, salt: Option<[u8; CHALLENGE_LEN]> },
    /// Master's keepalive pong.
    Mstpong { repeater_id: u32 },
    /// Master's negative acknowledgement.
    Mstnak { repeater_id: u32 },
    /// Master-initiated close.
    Mstcl { repeater_id: u32 },
}

fn read_repeater_id(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().unwrap())
}

/// Candidate tags ordered so that a longer tag is always tried before any
/// tag it is a byte-prefix of (`RPTCL` before `RPTC`). Parsing additionally
/// requires the total length to match, so a coincidental prefix collision
/// inside a repeater id can never misroute a packet (see tests).
const TAG_ORDER: &[&[u8]] = &[
    b"RPTPING", b"RPTACK", b"MSTPONG", b"MSTNAK", b"RPTCL", b"MSTCL", b"RPTL", b"RPTK", b"RPTC", b"RPTO",
];

impl Handshake {
    pub fn parse(bytes: &[u8]) -> WireResult<Self> {
        for tag in TAG_ORDER {
            if bytes.len() < tag.len() || &bytes[..tag.len()] != *tag {
                continue;
            }
            let body = &bytes[tag.len()..];
            return Self::parse_body(tag, body);
        }
        Err(WireError::UnknownTag)
    }

    fn parse_body(tag: &[u8], body: &[u8]) -> WireResult<Self> {
        let tag_name = || -> &'static str {
            match tag {
                b"RPTPING" => "RPTPING",
                b"RPTACK" => "RPTACK",
                b"MSTPONG" => "MSTPONG",
                b"MSTNAK" => "MSTNAK",
                b"RPTCL" => "RPTCL",
                b"MSTCL" => "MSTCL",
                b"RPTL" => "RPTL",
                b"RPTK" => "RPTK",
                b"RPTC" => "RPTC",
                b"RPTO" => "RPTO",
                _ => "?",
            }
        };
        match tag {
            b"RPTL" => {
                if body.len() != 4 {
                    return Err(WireError::BadLength { tag: tag_name(), len: body.len() + tag.len() });
                }
                Ok(Handshake::Rptl { repeater_id: read_repeater_id(body) })
            }
            b"RPTK" => {
                if body.len() != 4 + CHALLENGE_LEN {
                    return Err(WireError::BadLength { tag: tag_name(), len: body.len() + tag.len() });
                }
                let mut challenge = [0u8; CHALLENGE_LEN];
                challenge.copy_from_slice(&body[4..4 + CHALLENGE_LEN]);
                Ok(Handshake::Rptk { repeater_id: read_repeater_id(&body[0..4]), challenge })
            }
            b"RPTC" => {
                if body.len() != RPTC_BODY_LEN {
                    return Err(WireError::BadLength { tag: tag_name(), len: body.len() + tag.len() });
                }
                let repeater_id = read_repeater_id(&body[0..4]);
                let config = RptcConfig::parse(&body[4..])?;
                Ok(Handshake::Rptc { repeater_id, config })
            }
            b"RPTO" => {
                if body.len() < 4 {
                    return Err(WireError::BadLength { tag: tag_name(), len: body.len() + tag.len() });
                }
                let repeater_id = read_repeater_id(&body[0..4]);
                let options = std::str::from_utf8(&body[4..])
                    .map_err(|_| WireError::NotAscii)?
                    .trim_matches('\0')
                    .to_string();
                Ok(Handshake::Rpto { repeater_id, options })
            }
            b"RPTPING" => simple(tag, tag_name, body, Handshake::RptPing { repeater_id: 0 }),
            b"RPTCL" => simple(tag, tag_name, body, Handshake::Rptcl { repeater_id: 0 }),
            b"RPTACK" => {
                if body.len() == 4 {
                    Ok(Handshake::Rptack { repeater_id: read_repeater_id(body), salt: None })
                } else if body.len() == 4 + CHALLENGE_LEN {
                    let mut salt = [0u8; CHALLENGE_LEN];
                    salt.copy_from_slice(&body[4..4 + CHALLENGE_LEN]);
                    Ok(Handshake::Rptack { repeater_id: read_repeater_id(&body[0..4]), salt: Some(salt) })
                } else {
                    Err(WireError::BadLength { tag: tag_name(), len: body.len() + tag.len() })
                }
            }
            b"MSTPONG" => simple(tag, tag_name, body, Handshake::Mstpong { repeater_id: 0 }),
            b"MSTNAK" => simple(tag, tag_name, body, Handshake::Mstnak { repeater_id: 0 }),
            b"MSTCL" => simple(tag, tag_name, body, Handshake::Mstcl { repeater_id: 0 }),
            _ => Err(WireError::UnknownTag),
        }
    }

    pub fn encode(&self) -> WireResult<Vec<u8>> {
        Ok(match self {
            Handshake::Rptl { repeater_id } => concat(b"RPTL", repeater_id),
            Handshake::Rptk { repeater_id, challenge } => {
                let mut v = concat(b"RPTK", repeater_id);
                v.extend_from_slice(challenge);
                v
            }
            Handshake::Rptc { repeater_id, config } => {
                let mut v = concat(b"RPTC", repeater_id);
                v.extend_from_slice(&config.encode()?);
                v
            }
            Handshake::Rpto { repeater_id, options } => {
                let mut v = concat(b"RPTO", repeater_id);
                v.extend_from_slice(options.as_bytes());
                v
            }
            Handshake::RptPing { repeater_id } => concat(b"RPTPING", repeater_id),
            Handshake::Rptcl { repeater_id } => concat(b"RPTCL", repeater_id),
            Handshake::Rptack { repeater_id, salt } => {
                let mut v = concat(b"RPTACK", repeater_id);
                if let Some(salt) = salt {
                    v.extend_from_slice(salt);
                }
                v
            }
            Handshake::Mstpong { repeater_id } => concat(b"MSTPONG", repeater_id),
            Handshake::Mstnak { repeater_id } => concat(b"MSTNAK", repeater_id),
            Handshake::Mstcl { repeater_id } => concat(b"MSTCL", repeater_id),
        })
    }

    pub fn repeater_id(&self) -> u32 {
        match self {
            Handshake::Rptl { repeater_id }
            | Handshake::Rptk { repeater_id, .. }
            | Handshake::Rptc { repeater_id, .. }
            | Handshake::Rpto { repeater_id, .. }
            | Handshake::RptPing { repeater_id }
            | Handshake::Rptcl { repeater_id }
            | Handshake::Rptack { repeater_id, .. }
            | Handshake::Mstpong { repeater_id }
            | Handshake::Mstnak { repeater_id }
            | Handshake::Mstcl { repeater_id } => *repeater_id,
        }
    }
}

fn concat(tag: &[u8], repeater_id: &u32) -> Vec<u8> {
    let mut v = Vec::with_capacity(tag.len() + 4);
    v.extend_from_slice(tag);
    v.extend_from_slice(&repeater_id.to_be_bytes());
    v
}

fn simple(
    tag: &[u8],
    tag_name: impl Fn() -> &'static str,
    body: &[u8],
    mut variant: Handshake,
) -> WireResult<Handshake> {
    if body.len() != 4 {
        return Err(WireError::BadLength { tag: tag_name(), len: body.len() + tag.len() });
    }
    let id = read_repeater_id(body);
    match &mut variant {
        Handshake::RptPing { repeater_id }
        | Handshake::Rptcl { repeater_id }
        | Handshake::Mstpong { repeater_id }
        | Handshake::Mstnak { repeater_id }
        | Handshake::Mstcl { repeater_id } => *repeater_id = id,
        _ => unreachable!(),
    }
    Ok(variant)
}
