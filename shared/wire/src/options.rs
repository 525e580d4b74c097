use crate::error::{WireError, WireResult};
use crate::slot::Timeslot;

pub const MAX_STATIC_TALKGROUPS_PER_SLOT: usize = 50;
pub const AUTO_TTL_MIN_SECONDS: u32 = 0;
pub const AUTO_TTL_MAX_SECONDS: u32 = 3600;
pub const DEFAULT_AUTO_TTL_SECONDS: u32 = 600;

/// A parsed OPTIONS directive: `pair (';' pair)*` where pair is one of
/// `TS1=idlist`, `TS2=idlist`, `AUTO=seconds`, `DROP=ALL`, `UNLINK=TS1|TS2`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionsDirective {
    pub ts1: Option<Vec<u32>>,
    pub ts2: Option<Vec<u32>>,
    pub auto_ttl_seconds: Option<u32>,
    pub drop_all: bool,
    pub unlink: Vec<Timeslot>,
}

impl OptionsDirective {
    /// Parses the OPTIONS string grammar (§6). Case-insensitive, whitespace
    /// trimmed, null bytes stripped. Empty input parses to an all-default
    /// (no-op) directive, matching an RPTO/RPTC with no OPTIONS at all.
    pub fn parse(text: &str) -> WireResult<Self> {
        let cleaned = text.replace('\0', "");
        let cleaned = cleaned.trim();
        let mut out = OptionsDirective::default();
        if cleaned.is_empty() {
            return Ok(out);
        }

        for raw_pair in cleaned.split(';') {
            let pair = raw_pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair
                .split_once('=')
                .ok_or(WireError::BadOptions("missing '=' in OPTIONS pair"))?;
            let key_upper = key.trim().to_ascii_uppercase();
            let value = value.trim();

            match key_upper.as_str() {
                "TS1" => out.ts1 = Some(parse_idlist(value)?),
                "TS2" => out.ts2 = Some(parse_idlist(value)?),
                "AUTO" => {
                    let seconds: u32 = value
                        .parse()
                        .map_err(|_| WireError::BadOptions("AUTO value not numeric"))?;
                    if seconds > AUTO_TTL_MAX_SECONDS {
                        return Err(WireError::OutOfRange("AUTO seconds"));
                    }
                    out.auto_ttl_seconds = Some(seconds);
                }
                "DROP" => {
                    if value.eq_ignore_ascii_case("ALL") {
                        out.drop_all = true;
                    } else {
                        return Err(WireError::BadOptions("DROP only accepts ALL"));
                    }
                }
                "UNLINK" => match value.to_ascii_uppercase().as_str() {
                    "TS1" => out.unlink.push(Timeslot::Ts1),
                    "TS2" => out.unlink.push(Timeslot::Ts2),
                    _ => return Err(WireError::BadOptions("UNLINK only accepts TS1 or TS2")),
                },
                _ => return Err(WireError::BadOptions("unknown OPTIONS key")),
            }
        }

        if let Some(ts1) = &out.ts1 {
            if ts1.len() > MAX_STATIC_TALKGROUPS_PER_SLOT {
                return Err(WireError::OutOfRange("TS1 static talkgroup count"));
            }
        }
        if let Some(ts2) = &out.ts2 {
            if ts2.len() > MAX_STATIC_TALKGROUPS_PER_SLOT {
                return Err(WireError::OutOfRange("TS2 static talkgroup count"));
            }
        }

        Ok(out)
    }

    /// Extracts an embedded `OPTIONS:...` directive from an RPTC
    /// description field, if present.
    pub fn from_embedded_description(description: &str) -> WireResult<Option<Self>> {
        match description.find("OPTIONS:") {
            Some(idx) => Ok(Some(Self::parse(&description[idx + "OPTIONS:".len()..])?)),
            None => Ok(None),
        }
    }
}

fn parse_idlist(value: &str) -> WireResult<Vec<u32>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|tok| {
            tok.trim()
                .parse::<u32>()
                .map_err(|_| WireError::BadOptions("non-numeric talkgroup id"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_pairs() {
        let d = OptionsDirective::parse("ts1=3100,3101;AUTO=120;ts2=3102").unwrap();
        assert_eq!(d.ts1, Some(vec![3100, 3101]));
        assert_eq!(d.ts2, Some(vec![3102]));
        assert_eq!(d.auto_ttl_seconds, Some(120));
    }

    #[test]
    fn drop_all_and_unlink() {
        let d = OptionsDirective::parse("DROP=ALL;UNLINK=TS1").unwrap();
        assert!(d.drop_all);
        assert_eq!(d.unlink, vec![Timeslot::Ts1]);
    }

    #[test]
    fn empty_string_is_a_no_op() {
        let d = OptionsDirective::parse("  ").unwrap();
        assert_eq!(d, OptionsDirective::default());
    }

    #[test]
    fn null_bytes_are_stripped() {
        let d = OptionsDirective::parse("TS1=91\0").unwrap();
        assert_eq!(d.ts1, Some(vec![91]));
    }

    #[test]
    fn rejects_auto_over_max() {
        assert!(matches!(
            OptionsDirective::parse("AUTO=3601"),
            Err(WireError::OutOfRange(_))
        ));
        assert!(OptionsDirective::parse("AUTO=3600").is_ok());
    }

    #[test]
    fn rejects_51st_static_talkgroup() {
        let ids: Vec<String> = (1..=51).map(|i| i.to_string()).collect();
        let text = format!("TS1={}", ids.join(","));
        assert!(matches!(
            OptionsDirective::parse(&text),
            Err(WireError::OutOfRange(_))
        ));
    }

    #[test]
    fn accepts_exactly_50_static_talkgroups() {
        let ids: Vec<String> = (1..=50).map(|i| i.to_string()).collect();
        let text = format!("TS1={}", ids.join(","));
        assert!(OptionsDirective::parse(&text).is_ok());
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(OptionsDirective::parse("FOO=1").is_err());
    }

    #[test]
    fn extracts_embedded_options_from_description() {
        let d = OptionsDirective::from_embedded_description("Hub. OPTIONS:TS1=91;AUTO=60")
            .unwrap()
            .unwrap();
        assert_eq!(d.ts1, Some(vec![91]));
        assert_eq!(d.auto_ttl_seconds, Some(60));
    }

    #[test]
    fn no_embedded_options_returns_none() {
        assert!(OptionsDirective::from_embedded_description("Hub.").unwrap().is_none());
    }
}
