//! Orchestration API for corral commands.
//!
//! One function per command: [`attach`], [`start`], and [`stop`]. They hold
//! the command logic so the CLI binary and library embedders share it.
//!
//! All functions accept library-owned types (not clap types) and return
//! [`crate::error::Result<CommandOutcome>`]. They do not print to
//! stdout/stderr or call `std::process::exit`; the engine client and the
//! terminal are passed in so callers choose the transport.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::engine::{ContainerState, EngineClient, check_startable};
use crate::error::{EngineError, Result as CorralResult};
use crate::session::{AttachOptions, AttachSession};
use crate::terminal::{TerminalControl, TerminalManager};

/// Outcome of a corral command.
///
/// Commands return either outright success or a container exit code that
/// the CLI adapter maps to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command completed successfully (exit code 0).
    Success,
    /// The container exited with a non-zero code.
    CommandExit {
        /// The exit code reported by the engine.
        code: i64,
    },
}

impl CommandOutcome {
    /// Map a reported exit code onto an outcome; unknown and zero codes are
    /// success.
    #[must_use]
    pub const fn from_exit_code(code: Option<i64>) -> Self {
        match code {
            Some(code) if code != 0 => Self::CommandExit { code },
            _ => Self::Success,
        }
    }
}

/// How `start` treats the container's streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Start and return immediately.
    Detached,
    /// Start with output attached and wait for the exit code.
    Attached,
    /// As [`StartMode::Attached`], also forwarding local stdin.
    Interactive,
}

impl StartMode {
    /// Derive the mode from the `--attach` and `--interactive` flags.
    #[must_use]
    pub const fn from_flags(attach: bool, interactive: bool) -> Self {
        if interactive {
            Self::Interactive
        } else if attach {
            Self::Attached
        } else {
            Self::Detached
        }
    }
}

/// What every command needs: the engine, the local terminal, and the
/// merged configuration.
pub struct CommandContext<'a, C: EngineClient, T: TerminalControl> {
    /// Engine client.
    pub engine: &'a C,
    /// Local terminal controller.
    pub terminal: &'a TerminalManager<T>,
    /// Merged configuration.
    pub config: &'a AppConfig,
}

/// Local standard streams lent to an attach session.
pub struct LocalStreams<I, O> {
    /// Local input, forwarded when the session attaches stdin.
    pub stdin: I,
    /// Local output receiving the container's output.
    pub stdout: O,
}

/// Attach local streams to a running container until its output ends.
///
/// # Errors
///
/// Returns the session's error; see [`AttachSession::run`].
pub async fn attach<C, T, I, O>(
    ctx: &CommandContext<'_, C, T>,
    container: &str,
    attach_stdin: bool,
    streams: LocalStreams<I, O>,
) -> CorralResult<CommandOutcome>
where
    C: EngineClient,
    T: TerminalControl,
    I: AsyncRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
{
    let options = AttachOptions {
        attach_stdin,
        start: false,
        close_timeout: ctx.config.attach.close_timeout(),
        ..AttachOptions::new(container)
    };
    AttachSession::new(ctx.engine, ctx.terminal, options)
        .run(streams.stdin, streams.stdout)
        .await?;

    let info = ctx.engine.inspect(container).await?;
    let code = match info.state {
        ContainerState::Running | ContainerState::Paused => None,
        _ => info.exit_code,
    };
    Ok(CommandOutcome::from_exit_code(code))
}

/// Start a container, optionally attaching to it first.
///
/// In the attached modes the stream is established before the container is
/// started so no output is lost, and the outcome carries the exit code once
/// the container has stopped.
///
/// # Errors
///
/// Returns [`EngineError::InvalidState`] when the container cannot be
/// started, the engine's error when starting fails, and the session's error
/// in the attached modes.
pub async fn start<C, T, I, O>(
    ctx: &CommandContext<'_, C, T>,
    container: &str,
    mode: StartMode,
    streams: LocalStreams<I, O>,
) -> CorralResult<CommandOutcome>
where
    C: EngineClient,
    T: TerminalControl,
    I: AsyncRead + Send + Unpin + 'static,
    O: AsyncWrite + Send + Unpin + 'static,
{
    if mode == StartMode::Detached {
        let info = ctx.engine.inspect(container).await?;
        check_startable(&info)?;
        ctx.engine.start(container).await?;
        info!(container_id = container, "container started");
        return Ok(CommandOutcome::Success);
    }

    let options = AttachOptions {
        attach_stdin: mode == StartMode::Interactive,
        start: true,
        close_timeout: ctx.config.attach.close_timeout(),
        ..AttachOptions::new(container)
    };
    AttachSession::new(ctx.engine, ctx.terminal, options)
        .run(streams.stdin, streams.stdout)
        .await?;

    let code = wait_for_exit_code(
        ctx.engine,
        container,
        ctx.config.attach.exit_poll_interval(),
    )
    .await?;
    Ok(CommandOutcome::from_exit_code(code))
}

/// Stop a running container, killing it after `timeout`.
///
/// # Errors
///
/// Returns the engine's error when stopping fails.
pub async fn stop<C: EngineClient>(
    engine: &C,
    container: &str,
    timeout: Duration,
) -> CorralResult<CommandOutcome> {
    engine.stop(container, timeout).await?;
    info!(container_id = container, "container stopped");
    Ok(CommandOutcome::Success)
}

/// Poll `inspect` until the container is no longer running and return its
/// exit code, if the engine reports one.
///
/// # Errors
///
/// Returns the engine's error when inspecting fails.
pub async fn wait_for_exit_code<C: EngineClient>(
    engine: &C,
    container: &str,
    poll_interval: Duration,
) -> Result<Option<i64>, EngineError> {
    loop {
        let info = engine.inspect(container).await?;
        if matches!(info.state, ContainerState::Running | ContainerState::Paused) {
            debug!(container_id = container, state = %info.state, "waiting for container to exit");
            sleep(poll_interval).await;
            continue;
        }
        return Ok(info.exit_code);
    }
}
