//! CLI Handler for rediscluster-inspect
//!
//! Provides command-line interface functionality for:
//! - Printing build version details
//! - Showing the slot distribution with placement risks
//! - Showing per-node status

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use crate::collector::{Collector, CollectorSettings};
use crate::config::InspectConfig;
use crate::error::Result;
use crate::inventory::Inventory;
use crate::reconcile::{reconcile, Topology};
use crate::render::{render, OutputFormat, View};
use crate::tunnel::{Forwarder, TcpForwarder, TunnelLog};
use crate::version::VersionInfo;

#[derive(Parser)]
#[command(name = "rediscluster-inspect", author, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show verbose logs, including tunnel diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show version details
    Version,
    /// Show slots distribution of the cluster
    Slots(InspectArgs),
    /// Show role, keys and slot totals of every member
    Nodes(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Discovery snapshot listing the service endpoints and pods
    #[arg(long)]
    pub inventory: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

pub struct CliHandler {
    config: InspectConfig,
    version: VersionInfo,
    forwarder: Arc<dyn Forwarder>,
    verbose: bool,
}

impl CliHandler {
    pub fn new(config: InspectConfig, version: VersionInfo) -> Self {
        let forwarder = Arc::new(TcpForwarder::new(config.tunnel.ready_timeout()));
        Self {
            config,
            version,
            forwarder,
            verbose: false,
        }
    }

    /// Replaces the relay transport.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Queries every candidate in the inventory and reconciles the answers.
    pub async fn inspect(&self, inventory: &Inventory) -> Topology {
        let log = if self.verbose {
            TunnelLog::Trace
        } else {
            TunnelLog::Quiet
        };
        let collector = Collector::new(self.forwarder.clone(), CollectorSettings::from(&self.config))
            .with_log(log);

        info!("Querying {} candidates", inventory.candidates.len());
        let results = collector.collect(inventory.candidates.clone()).await;
        reconcile(results, &inventory.placement, self.config.remote_port)
    }

    pub async fn run(
        &self,
        command: &Commands,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> Result<()> {
        let (view, args) = match command {
            Commands::Version => {
                write!(out, "{}", self.version)?;
                return Ok(());
            }
            Commands::Slots(args) => (View::Slots, args),
            Commands::Nodes(args) => (View::Nodes, args),
        };

        let inventory = Inventory::load(&args.inventory)?;
        let topology = self.inspect(&inventory).await;
        render(&topology, view, args.output, out, err)
    }
}
