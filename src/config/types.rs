//! Configuration data types for corral.

use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Client-side attach session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttachConfig {
    /// Seconds to wait for the engine to acknowledge the final stdin write.
    pub close_timeout_secs: u64,

    /// Milliseconds between state polls while waiting for a container to
    /// exit after `start --attach`.
    pub exit_poll_interval_ms: u64,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            close_timeout_secs: 5,
            exit_poll_interval_ms: 100,
        }
    }
}

impl AttachConfig {
    /// Return the close handshake bound.
    #[must_use]
    pub const fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    /// Return the exit polling interval.
    #[must_use]
    pub const fn exit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exit_poll_interval_ms)
    }
}

/// Engine-side attach stream settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Seconds the engine waits for the client's final write after the
    /// container's output has ended.
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Return the drain bound.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `CORRAL_CONFIG_PATH` environment variable
/// 2. `.corral.toml` in the current working directory
/// 3. `.corral.toml` in the home directory
/// 4. `~/.config/corral/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "CORRAL",
    post_merge_hook,
    discovery(
        app_name = "corral",
        env_var = "CORRAL_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".corral.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The engine socket path or `unix://` URL.
    pub engine_socket: Option<String>,

    /// Attach session configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub attach: AttachConfig,

    /// Engine-side stream configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Check that every duration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first zero duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("attach.close_timeout_secs", self.attach.close_timeout_secs),
            (
                "attach.exit_poll_interval_ms",
                self.attach.exit_poll_interval_ms,
            ),
            ("server.drain_timeout_secs", self.server.drain_timeout_secs),
        ];
        match durations.into_iter().find(|&(_, value)| value == 0) {
            Some((field, _)) => Err(ConfigError::InvalidValue {
                field: String::from(field),
                reason: String::from("must be greater than zero"),
            }),
            None => Ok(()),
        }
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // A blank socket means "resolve from the environment".
        if self
            .engine_socket
            .as_deref()
            .is_some_and(|socket| socket.trim().is_empty())
        {
            self.engine_socket = None;
        }
        Ok(())
    }
}
