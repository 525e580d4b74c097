use thiserror::Error;

/// §7 *config* errors: always fatal at startup, never recovered.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid ACL {acl:?} for {field}: {source}")]
    Acl { field: String, acl: String, #[source] source: nexus_acl::AclParseError },

    #[error("system {name:?}: mode MASTER requires `port`")]
    MasterMissingPort { name: String },

    #[error("system {name:?}: mode PEER requires `master_ip` and `master_port`")]
    PeerMissingMasterAddress { name: String },

    #[error("system {name:?}: mode OPENBRIDGE requires `port`, `passphrase`, `target_ip`, `target_port` and `network_id`")]
    OpenBridgeMissingFields { name: String },

    #[error("system {name:?}: mode PEER requires `radio_id`")]
    PeerMissingRadioId { name: String },

    #[error("bridge {bridge:?} rule for tgid {tgid}: system {system:?} is not a configured system")]
    UnknownBridgeSystem { bridge: String, system: String, tgid: u32 },

    #[error("bridge {bridge:?} rule: timeslot must be 1 or 2, got {timeslot}")]
    BadTimeslot { bridge: String, timeslot: u8 },

    #[error("bridge {bridge:?} rule: tgid must be > 0")]
    BadTgid { bridge: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
