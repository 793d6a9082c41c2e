//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use ironnode_cli::simulation::SimulationMode;
use std::path::PathBuf;

/// IronNode - concurrent dispatch core for blockchain node gateways
#[derive(Parser, Debug)]
#[command(
    name = "ironnode",
    author,
    version,
    about = "Concurrent dispatch core for blockchain node gateways",
    long_about = "Fans requests out to upstream blockchain nodes, runs background work on a \n\
                  bounded worker pool and persists request logs write-behind.\n\n\
                  This binary validates configuration and drives the core against \n\
                  simulated nodes."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "IRONNODE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "IRONNODE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the dispatch core against simulated nodes
    Simulate(SimulateArgs),

    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to configuration file (TOML or JSON); defaults apply without one
    #[arg(short, long, env = "IRONNODE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dispatch operation exercised by every request
    #[arg(long, value_enum, default_value = "failover")]
    pub mode: SimulationMode,

    /// Number of simulated client requests
    #[arg(short = 'n', long, default_value = "100")]
    pub requests: usize,

    /// Synthetic endpoints used when the configuration lists no nodes
    #[arg(long, default_value = "3")]
    pub nodes: usize,

    /// Median node latency in milliseconds
    #[arg(long, default_value = "50")]
    pub latency_ms: u64,

    /// Relative latency spread in [0, 1]
    #[arg(long, default_value = "0.5")]
    pub jitter: f64,

    /// Probability that one attempt fails, in [0, 1]
    #[arg(long, default_value = "0.1")]
    pub failure_rate: f64,

    /// Attempt bound of the retry mode (defaults to dispatcher.max_attempts)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Requests per batch in batch mode
    #[arg(long, default_value = "4")]
    pub batch_size: usize,

    /// Chain name written into request logs
    #[arg(long, default_value = "ethereum")]
    pub chain: String,

    /// Shutdown budget in seconds
    #[arg(long, default_value = "30")]
    pub shutdown_timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "IRONNODE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ironnode.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ironnode.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show every configured node
    #[arg(long)]
    pub nodes: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
