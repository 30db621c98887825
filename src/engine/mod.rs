//! Container engine interfaces.
//!
//! The CLI talks to the engine through [`EngineClient`]; the engine side
//! exposes its container lifecycle through [`LifecycleManager`]. Both traits
//! return boxed futures so tests can substitute mocks at either seam.
//!
//! The engine socket is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `CORRAL_ENGINE_SOCKET` environment variable
//! 4. `CORRAL_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. Platform default (`unix:///run/corral/corral.sock`)

mod connection;
mod container;
#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

pub use connection::{EngineConnector, SocketResolver};
pub(crate) use connection::classify_connect_error;
pub use container::{ContainerInfo, ContainerState, check_attachable, check_startable};

use crate::error::EngineError;
use crate::protocol::{AttachRequest, AttachResponse};
use crate::stream::AttachEndpoint;

/// Boxed future returned by engine operations.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

/// Client-side view of the container engine.
pub trait EngineClient: Send + Sync {
    /// Attach stream endpoint returned by [`EngineClient::open_attach`].
    type Endpoint: AttachEndpoint<Outbound = AttachRequest, Inbound = AttachResponse>;

    /// Report the container's current state and IO configuration.
    fn inspect(&self, container_id: &str) -> EngineFuture<'_, ContainerInfo>;

    /// Start a created or stopped container.
    fn start(&self, container_id: &str) -> EngineFuture<'_, ()>;

    /// Stop a running container, killing it after `timeout`.
    fn stop(&self, container_id: &str, timeout: Duration) -> EngineFuture<'_, ()>;

    /// Open a bidirectional attach stream to the engine.
    ///
    /// The container is named by the handshake sent on the stream's first
    /// frame; `container_id` is used for error reporting only.
    fn open_attach(&self, container_id: &str) -> EngineFuture<'_, Self::Endpoint>;
}

/// Container standard streams lent to [`LifecycleManager::attach`].
pub struct AttachIo<'a> {
    /// Bytes the client forwards to the container's stdin, when the client
    /// attached with stdin.
    pub stdin: Option<&'a mut (dyn AsyncRead + Send + Unpin)>,
    /// Sink for the container's stdout and stderr.
    pub output: &'a mut (dyn AsyncWrite + Send + Unpin),
}

/// Engine-side container lifecycle.
pub trait LifecycleManager: Send + Sync {
    /// Report the container's current state and IO configuration.
    fn inspect(&self, container_id: &str) -> EngineFuture<'_, ContainerInfo>;

    /// Start a created or stopped container.
    fn start(&self, container_id: &str) -> EngineFuture<'_, ()>;

    /// Stop a running container, killing it after `timeout`.
    fn stop(&self, container_id: &str, timeout: Duration) -> EngineFuture<'_, ()>;

    /// Wire `io` into the container's standard streams.
    ///
    /// Resolves once the container's output has ended; the streams are only
    /// borrowed for that long.
    fn attach<'a>(&'a self, container_id: &'a str, io: AttachIo<'a>) -> EngineFuture<'a, ()>;
}
