//! Client-side attach session.
//!
//! [`AttachSession`] wires the local standard streams to a container
//! through the engine's attach stream. It checks the container and the local
//! terminal before touching anything, sends the handshake, switches the
//! terminal to raw mode for TTY containers, forwards both directions on
//! their own tasks, optionally starts the container, and tears everything
//! down in a fixed order on every exit path.

mod forward;

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{ContainerInfo, EngineClient, check_attachable, check_startable};
use crate::error::{CorralError, SessionError};
use crate::protocol::Handshake;
use crate::stream::{AttachEndpoint, Role, StreamReader, StreamWriter, attach_pair};
use crate::terminal::{RawModeGuard, StdStream, TerminalControl, TerminalManager};
use forward::{forward_input, forward_output};

/// Default bound on the final writer close handshake.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of an attach session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has happened yet.
    NotStarted,
    /// The attach stream is being opened and the handshake sent.
    Attaching,
    /// Both directions are being forwarded.
    Forwarding,
    /// The remote output ended and the session was torn down.
    Completed,
    /// The session ended with an error.
    Failed,
}

impl SessionState {
    /// Return the lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Attaching => "attaching",
            Self::Forwarding => "forwarding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an [`AttachSession`] should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOptions {
    /// Container to attach to.
    pub container_id: String,
    /// Forward local stdin when the container keeps stdin open.
    pub attach_stdin: bool,
    /// Start the container once the stream is established.
    pub start: bool,
    /// Bound on the final writer close handshake.
    pub close_timeout: Duration,
}

impl AttachOptions {
    /// Options for attaching to `container_id` with stdin and without
    /// starting it.
    #[must_use]
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            attach_stdin: true,
            start: false,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

/// Orchestrates one attach session against an engine.
pub struct AttachSession<'a, C: EngineClient, T: TerminalControl> {
    engine: &'a C,
    terminal: &'a TerminalManager<T>,
    options: AttachOptions,
    state: SessionState,
    cancel: CancellationToken,
}

impl<'a, C: EngineClient, T: TerminalControl> AttachSession<'a, C, T> {
    /// Create a session that talks to `engine` and controls `terminal`.
    #[must_use]
    pub fn new(engine: &'a C, terminal: &'a TerminalManager<T>, options: AttachOptions) -> Self {
        Self {
            engine,
            terminal,
            options,
            state: SessionState::NotStarted,
            cancel: CancellationToken::new(),
        }
    }

    /// Return the session's current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Return the token that ends the session's output forwarding when
    /// cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn transition(&mut self, next: SessionState) {
        info!(
            container_id = %self.options.container_id,
            from = %self.state,
            to = %next,
            "attach session state changed"
        );
        self.state = next;
    }

    /// Run the session until the container's output ends.
    ///
    /// # Errors
    ///
    /// Returns the engine error when the container is missing or in the
    /// wrong state, [`crate::error::TerminalError`] when a TTY container
    /// would be fed from a non-terminal, the stream error when the handshake
    /// cannot be sent, the engine error when starting fails, and
    /// [`SessionError`] when forwarding fails. The terminal is restored on
    /// every path that changed it.
    pub async fn run<I, O>(&mut self, stdin: I, stdout: O) -> Result<(), CorralError>
    where
        I: AsyncRead + Send + Unpin + 'static,
        O: AsyncWrite + Send + Unpin + 'static,
    {
        let result = self.run_inner(stdin, stdout).await;
        let last = if result.is_ok() {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        self.transition(last);
        result
    }

    async fn run_inner<I, O>(&mut self, stdin: I, stdout: O) -> Result<(), CorralError>
    where
        I: AsyncRead + Send + Unpin + 'static,
        O: AsyncWrite + Send + Unpin + 'static,
    {
        let info = self.check_container().await?;
        let attach_stdin = self.options.attach_stdin && info.open_stdin;
        self.terminal.check_tty(attach_stdin, info.tty)?;

        self.transition(SessionState::Attaching);
        let container_id = self.options.container_id.clone();
        let endpoint = self.engine.open_attach(&container_id).await?;
        let (reader, mut writer) = attach_pair(
            endpoint,
            Role::Client,
            Handshake::new(container_id.as_str(), attach_stdin),
            self.cancel.clone(),
        );
        writer.handshake().await?;

        let terminal = self.terminal;
        let guard = if info.tty {
            let raw_stdout = terminal.is_terminal(StdStream::Stdout);
            Some(terminal.enter_raw_mode(attach_stdin, raw_stdout)?)
        } else {
            None
        };

        self.transition(SessionState::Forwarding);
        let output_task = tokio::spawn(forward_output(reader, stdout));
        let input = InputForwarding::spawn(attach_stdin.then_some(stdin), writer);

        if self.options.start
            && let Err(error) = self.engine.start(&container_id).await
        {
            output_task.abort();
            drop(input.stop().await);
            restore_quietly(guard);
            return Err(error.into());
        }

        let (reader, outcome) = output_task
            .await
            .map_err(|error| SessionError::TaskFailed {
                container_id: container_id.clone(),
                message: error.to_string(),
            })?;
        let writer = input.stop().await;
        self.close_streams(writer, reader).await;

        let restored = guard.map_or(Ok(()), RawModeGuard::restore);
        outcome.map_err(|failure| SessionError::OutputFailed {
            container_id,
            message: failure.message(),
        })?;
        restored?;
        Ok(())
    }

    async fn check_container(&self) -> Result<ContainerInfo, CorralError> {
        let info = self.engine.inspect(&self.options.container_id).await?;
        if self.options.start {
            check_startable(&info)?;
        } else {
            check_attachable(&info)?;
        }
        debug!(
            container_id = %info.id,
            state = %info.state,
            tty = info.tty,
            open_stdin = info.open_stdin,
            "container accepted for attach"
        );
        Ok(info)
    }

    async fn close_streams<E: AttachEndpoint>(
        &self,
        writer: Option<StreamWriter<E>>,
        mut reader: StreamReader<E>,
    ) {
        let container_id = &self.options.container_id;
        if let Some(mut writer) = writer {
            if !reader.is_finished() {
                writer.expect_peer_marker();
            }
            match timeout(self.options.close_timeout, writer.close()).await {
                Ok(Ok(())) => debug!(container_id, written = writer.offset(), "input committed"),
                Ok(Err(error)) => warn!(container_id, %error, "failed to close attach input"),
                Err(_) => warn!(
                    container_id,
                    timeout_secs = self.options.close_timeout.as_secs(),
                    "timed out closing attach input"
                ),
            }
        }
        if let Err(error) = reader.close().await {
            warn!(container_id, %error, "failed to close attach output");
        }
    }
}

/// Restore the terminal on a failure path, logging rather than masking the
/// original error.
fn restore_quietly<T: TerminalControl>(guard: Option<RawModeGuard<'_, T>>) {
    if let Some(Err(error)) = guard.map(RawModeGuard::restore) {
        warn!(%error, "failed to restore local terminal mode");
    }
}

/// The stdin forwarding task, or the idle writer when stdin is not
/// forwarded.
enum InputForwarding<E: AttachEndpoint> {
    Running {
        stop: oneshot::Sender<()>,
        task: JoinHandle<StreamWriter<E>>,
    },
    Idle(StreamWriter<E>),
}

impl<E: AttachEndpoint> InputForwarding<E> {
    fn spawn<I>(stdin: Option<I>, writer: StreamWriter<E>) -> Self
    where
        I: AsyncRead + Send + Unpin + 'static,
    {
        let Some(input) = stdin else {
            return Self::Idle(writer);
        };
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(forward_input(input, writer, stopped));
        Self::Running { stop, task }
    }

    /// Stop forwarding and hand back the writer, unless the task was lost.
    async fn stop(self) -> Option<StreamWriter<E>> {
        match self {
            Self::Idle(writer) => Some(writer),
            Self::Running { stop, task } => {
                drop(stop.send(()));
                match task.await {
                    Ok(writer) => Some(writer),
                    Err(error) => {
                        warn!(%error, "input forwarding task was lost");
                        None
                    }
                }
            }
        }
    }
}
