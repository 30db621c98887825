//! `corral` application entry point.
//!
//! It uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/corral/config.toml` or path from `CORRAL_CONFIG_PATH`)
//! 3. Environment variables (`CORRAL_*`)
//! 4. Command-line arguments
//!
//! Diagnostics go to stderr, filtered by `CORRAL_LOG` (default `warn`), so
//! they never interleave with container output on stdout.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use corral::api::{self, CommandContext, CommandOutcome, LocalStreams, StartMode};
use corral::config::{AppConfig, Cli, Commands, load_config};
use corral::engine::{EngineConnector, SocketResolver};
use corral::error::{EngineError, Result as CorralResult};
use corral::terminal::{SystemTerminal, TerminalManager};
use eyre::{Report, Result as EyreResult};
use tokio::io::{Stdin, Stdout};
use tracing_subscriber::EnvFilter;

/// How long runtime shutdown waits for the blocking stdin reader.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Application entry point.
///
/// Loads configuration, runs the command on a multi-threaded runtime, and
/// mirrors a non-zero container exit code in the process exit status.
fn main() -> EyreResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|error| {
            Report::from(EngineError::RuntimeCreationFailed {
                message: error.to_string(),
            })
        })?;
    let outcome = runtime.block_on(run(&cli, &config));
    // Reading stdin parks a blocking thread that never returns on its own.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    Ok(exit_code(outcome.map_err(Report::from)?))
}

fn init_tracing() -> EyreResult<()> {
    let filter = EnvFilter::try_from_env("CORRAL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| eyre::eyre!(error))
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, config: &AppConfig) -> CorralResult<CommandOutcome> {
    let env = mockable::DefaultEnv::new();
    let resolver = SocketResolver::new(&env);
    let engine =
        EngineConnector::connect_with_fallback(config.engine_socket.as_deref(), &resolver).await?;
    let terminal = TerminalManager::new(SystemTerminal);
    let ctx = CommandContext {
        engine: &engine,
        terminal: &terminal,
        config,
    };

    match &cli.command {
        Commands::Attach(args) => {
            api::attach(&ctx, &args.container, !args.no_stdin, local_streams()).await
        }
        Commands::Start(args) => {
            let mode = StartMode::from_flags(args.attach, args.interactive);
            api::start(&ctx, &args.container, mode, local_streams()).await
        }
        Commands::Stop(args) => {
            api::stop(&engine, &args.container, Duration::from_secs(args.timeout)).await
        }
    }
}

fn local_streams() -> LocalStreams<Stdin, Stdout> {
    LocalStreams {
        stdin: tokio::io::stdin(),
        stdout: tokio::io::stdout(),
    }
}

/// Exit codes outside `1..=255` still report failure.
fn exit_code(outcome: CommandOutcome) -> ExitCode {
    match outcome {
        CommandOutcome::Success => ExitCode::SUCCESS,
        CommandOutcome::CommandExit { code } => ExitCode::from(
            u8::try_from(code)
                .ok()
                .filter(|&byte| byte != 0)
                .unwrap_or(1),
        ),
    }
}
