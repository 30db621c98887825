//! Command-line argument definitions for corral.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Default grace period, in seconds, before a stopped container is killed.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Command-line interface for corral.
#[derive(Debug, Parser)]
#[command(name = "corral")]
#[command(
    author,
    version,
    about = "Attach to, start, and stop containers managed by the corral engine"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Engine socket path or `unix://` URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Attach local standard streams to a running container.
    Attach(AttachArgs),

    /// Start a container, optionally attaching to it.
    Start(StartArgs),

    /// Stop a running container.
    Stop(StopArgs),
}

/// Arguments for the `attach` subcommand.
#[derive(Debug, Parser)]
pub struct AttachArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,

    /// Do not forward local stdin to the container.
    #[arg(long)]
    pub no_stdin: bool,
}

/// Arguments for the `start` subcommand.
#[derive(Debug, Parser)]
pub struct StartArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,

    /// Attach the container's output and report its exit code.
    #[arg(short, long)]
    pub attach: bool,

    /// Forward local stdin to the container (implies `--attach`).
    #[arg(short, long)]
    pub interactive: bool,
}

/// Arguments for the `stop` subcommand.
#[derive(Debug, Parser)]
pub struct StopArgs {
    /// Container ID or name.
    #[arg(required = true)]
    pub container: String,

    /// Seconds to wait before killing the container.
    #[arg(short, long, default_value_t = DEFAULT_STOP_TIMEOUT_SECS)]
    pub timeout: u64,
}
