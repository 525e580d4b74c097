mod build;
mod forwarder;
mod runtime;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use nexus_config::Cli;
use runtime::Hub;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());
    if let Some(level) = &cli.log_level {
        filter = filter.add_directive(level.parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let hub = Hub::build(&cli.config, cli.force_acl)?;
    hub.run().await
}
