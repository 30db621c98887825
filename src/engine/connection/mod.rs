//! Socket resolution and engine connection.
//!
//! This module resolves the engine endpoint from configuration, environment
//! variables, and the platform default, and turns it into a Unix socket path
//! for the RPC client.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
#[cfg(unix)]
use crate::rpc::SocketEngineClient;

/// Environment variable names checked in fallback order after configuration sources.
const FALLBACK_ENV_VARS: &[&str] = &["CORRAL_HOST", "CONTAINER_HOST"];

/// Default engine endpoint.
const DEFAULT_SOCKET: &str = "unix:///run/corral/corral.sock";

const UNIX_SCHEME: &str = "unix://";

/// Resolves the engine endpoint from environment variables.
///
/// # Type Parameters
///
/// * `E` - An environment provider implementing the `mockable::Env` trait,
///   allowing for testable environment variable access.
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a new socket resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Resolves the endpoint from fallback environment variables.
    ///
    /// Checks `CORRAL_HOST` and then `CONTAINER_HOST`, skipping empty values.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default endpoint, `unix:///run/corral/corral.sock`.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// Resolves engine endpoints and connects to them.
pub struct EngineConnector;

impl EngineConnector {
    /// Resolves the endpoint without connecting.
    ///
    /// Resolution order:
    /// 1. `config_socket` (from CLI, config file, or `CORRAL_ENGINE_SOCKET`)
    /// 2. `CORRAL_HOST`, `CONTAINER_HOST` (via resolver)
    /// 3. Platform default
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|socket| !socket.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }

    /// Extract the filesystem path from an endpoint.
    ///
    /// Accepts `unix://` URIs and bare paths.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedEndpoint`] for any other scheme or
    /// an empty path.
    pub fn socket_path(endpoint: &str) -> Result<PathBuf, EngineError> {
        let path = match endpoint.strip_prefix(UNIX_SCHEME) {
            Some(path) => path,
            None if endpoint.contains("://") => "",
            None => endpoint,
        };
        if path.is_empty() {
            return Err(EngineError::UnsupportedEndpoint {
                endpoint: endpoint.to_owned(),
            });
        }
        Ok(PathBuf::from(path))
    }

    /// Connect to the engine at `endpoint`.
    ///
    /// The socket is pinged once so a missing or inaccessible socket is
    /// reported before any command runs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedEndpoint`] for endpoints that are not
    /// Unix sockets, [`EngineError::SocketNotFound`] or
    /// [`EngineError::PermissionDenied`] when the socket cannot be opened,
    /// and [`EngineError::ConnectionFailed`] otherwise.
    #[cfg(unix)]
    pub async fn connect(endpoint: &str) -> Result<SocketEngineClient, EngineError> {
        let client = SocketEngineClient::new(Self::socket_path(endpoint)?);
        client.ping().await?;
        Ok(client)
    }

    /// Connect using the resolved endpoint from configuration and environment.
    ///
    /// # Errors
    ///
    /// See [`EngineConnector::connect`].
    #[cfg(unix)]
    pub async fn connect_with_fallback<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<SocketEngineClient, EngineError> {
        let socket = Self::resolve_socket(config_socket, resolver);
        Self::connect(&socket).await
    }
}

/// Classify a socket connection failure into a semantic `EngineError`.
pub(crate) fn classify_connect_error(error: &io::Error, path: &Path) -> EngineError {
    match error.kind() {
        io::ErrorKind::NotFound => EngineError::SocketNotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => EngineError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => EngineError::ConnectionFailed {
            message: format!("{}: {error}", path.display()),
        },
    }
}
