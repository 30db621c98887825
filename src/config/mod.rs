//! Configuration system for corral.
//!
//! This module provides the configuration structures and CLI definitions for the
//! corral CLI. Configuration loading and precedence merging is handled by the
//! `ortho_config` crate. Precedence: CLI flags override environment variables,
//! which override configuration files, which override defaults.
//!
//! The configuration file is expected at `~/.config/corral/config.toml` by default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/corral/corral.sock"
//!
//! [attach]
//! close_timeout_secs = 5
//! exit_poll_interval_ms = 100
//!
//! [server]
//! drain_timeout_secs = 5
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{AttachArgs, Cli, Commands, DEFAULT_STOP_TIMEOUT_SECS, StartArgs, StopArgs};
pub use loader::{env_var_names, load_config};
pub use types::{AppConfig, AttachConfig, ServerConfig};
