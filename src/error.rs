//! Semantic error types for corral.
//!
//! Conditions a caller might inspect, retry, or report differently are
//! modelled as `thiserror` enums. Opaque reporting (`eyre::Report`) is reserved
//! for the binary boundary.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error while merging layers.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while talking to the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to connect to the engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the engine socket.
    #[error("permission denied accessing container engine socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// The configured endpoint uses a scheme this client cannot speak.
    #[error("unsupported engine endpoint '{endpoint}': only unix sockets are supported")]
    UnsupportedEndpoint {
        /// The rejected endpoint string.
        endpoint: String,
    },

    /// The async runtime backing a synchronous call could not be created.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// Inspecting a container failed.
    #[error("failed to inspect container '{container_id}': {message}")]
    InspectFailed {
        /// The ID of the inspected container.
        container_id: String,
        /// A description of the failure.
        message: String,
    },

    /// Starting a container failed.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Stopping a container failed.
    #[error("failed to stop container '{container_id}': {message}")]
    StopFailed {
        /// The ID of the container that failed to stop.
        container_id: String,
        /// A description of the stop failure.
        message: String,
    },

    /// Wiring attach streams into a container failed.
    #[error("failed to attach to container '{container_id}': {message}")]
    AttachFailed {
        /// The ID of the target container.
        container_id: String,
        /// A description of the attach failure.
        message: String,
    },

    /// The container is in a state that does not permit the operation.
    #[error("container '{container_id}' is {state}: {reason}")]
    InvalidState {
        /// The ID of the container.
        container_id: String,
        /// The state the container was observed in.
        state: String,
        /// Why that state rules the operation out.
        reason: String,
    },

    /// The engine answered with something the client did not expect.
    #[error("engine RPC failed: {message}")]
    Rpc {
        /// A description of the RPC failure.
        message: String,
    },
}

/// Errors produced by the attach stream adapters.
///
/// The type is `Clone` so a reader or writer can hand back the identical
/// recorded error on every call after the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Sending or receiving a frame failed at the transport level.
    #[error("attach transport failed: {message}")]
    Transport {
        /// A description of the transport failure.
        message: String,
    },

    /// The peer violated the attach protocol.
    #[error("attach protocol violation: {message}")]
    Protocol {
        /// A description of the violation.
        message: String,
    },

    /// The byte count acknowledged by the peer differs from the local count.
    #[error("attach commit mismatch: wrote {written} bytes but peer committed {committed}")]
    CommitMismatch {
        /// Bytes this side sent or received.
        written: i64,
        /// Bytes the peer reported.
        committed: i64,
    },

    /// A read was cancelled while waiting out a backoff delay.
    ///
    /// The reader's `CancellationToken` is the only source of this error,
    /// so the variant records how far the read had got rather than a cause.
    #[error("attach stream read cancelled after {attempts} empty receives")]
    Cancelled {
        /// Empty receives seen before the token fired.
        attempts: u32,
    },

    /// Every receive attempt returned an empty payload.
    #[error("no attach data after {attempts} receive attempts")]
    BackoffExhausted {
        /// The number of receive attempts made.
        attempts: u32,
    },

    /// The stream adapter was used after it was closed.
    #[error("attach stream is closed")]
    Closed,
}

impl StreamError {
    /// Build a transport error from any displayable cause.
    #[must_use]
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: cause.to_string(),
        }
    }

    /// Build a protocol error from a message.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// The `io::ErrorKind` this error maps to when surfaced through
    /// `AsyncRead`/`AsyncWrite`.
    #[must_use]
    pub const fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::Transport { .. } => io::ErrorKind::ConnectionAborted,
            Self::Protocol { .. } | Self::CommitMismatch { .. } => io::ErrorKind::InvalidData,
            Self::Cancelled { .. } => io::ErrorKind::Other,
            Self::BackoffExhausted { .. } => io::ErrorKind::TimedOut,
            Self::Closed => io::ErrorKind::NotConnected,
        }
    }

    /// Recover the stream error carried inside an `io::Error`, if any.
    #[must_use]
    pub fn from_io_error(error: &io::Error) -> Option<&Self> {
        error.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<StreamError> for io::Error {
    fn from(error: StreamError) -> Self {
        Self::new(error.io_kind(), error)
    }
}

/// Errors raised while inspecting or changing the local terminal.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// The container expects a terminal but local stdin is not one.
    #[error("the input device is not a TTY; attach without stdin or run from a terminal")]
    NotATerminal,

    /// Switching a stream to raw mode failed.
    #[error("failed to set {stream} to raw mode: {message}")]
    RawModeFailed {
        /// The stream being switched (`stdin` or `stdout`).
        stream: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// Restoring a stream's saved mode failed.
    #[error("failed to restore {stream} terminal mode: {message}")]
    RestoreFailed {
        /// The stream being restored (`stdin` or `stdout`).
        stream: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// Terminal mode control is not available on this platform.
    #[error("terminal mode control is not supported on this platform")]
    Unsupported,
}

/// Errors raised by the attach session orchestrator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Forwarding remote output to the local terminal failed.
    #[error("attach session for '{container_id}' failed forwarding output: {message}")]
    OutputFailed {
        /// The attached container.
        container_id: String,
        /// A description of the failure.
        message: String,
    },

    /// A forwarding task panicked or was aborted unexpectedly.
    #[error("attach session for '{container_id}' lost a forwarding task: {message}")]
    TaskFailed {
        /// The attached container.
        container_id: String,
        /// A description of the failure.
        message: String,
    },
}

/// Top-level error type for corral.
#[derive(Debug, Error)]
pub enum CorralError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred talking to the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An attach stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The local terminal could not be prepared or restored.
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    /// The attach session failed while forwarding.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A specialised `Result` type for corral operations.
pub type Result<T> = std::result::Result<T, CorralError>;
