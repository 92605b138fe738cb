use anyhow::Context;
use clap::Parser;
use rediscluster_inspect::cli::{Cli, CliHandler};
use rediscluster_inspect::{logging, InspectConfig, VersionInfo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = InspectConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init(&config.logging, cli.verbose)?;

    let handler = CliHandler::new(config, VersionInfo::current()).with_verbose(cli.verbose);
    handler
        .run(&cli.command, &mut std::io::stdout(), &mut std::io::stderr())
        .await?;
    Ok(())
}
