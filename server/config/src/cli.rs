use std::path::PathBuf;

use clap::Parser;

/// Process-level flags for the `nexus-hub` binary.
#[derive(Debug, Parser)]
#[command(name = "nexus-hub", about = "DMR-Nexus network hub", version)]
pub struct Cli {
    /// Path to the YAML systems/bridges configuration document.
    #[arg(short, long, default_value = "nexus.yaml")]
    pub config: PathBuf,

    /// Overrides `global.use_acl` regardless of what the config file says.
    #[arg(long)]
    pub force_acl: bool,

    /// Overrides the `tracing` log level (e.g. `debug`, `nexus_master=trace`).
    #[arg(long, env = "NEXUS_LOG")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_nexus_yaml_in_the_current_directory() {
        let cli = Cli::parse_from(["nexus-hub"]);
        assert_eq!(cli.config, PathBuf::from("nexus.yaml"));
        assert!(!cli.force_acl);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn accepts_an_explicit_config_path() {
        let cli = Cli::parse_from(["nexus-hub", "--config", "/etc/nexus/nexus.yaml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/nexus/nexus.yaml"));
    }
}
