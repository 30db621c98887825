//! Client/server control plane for a container engine.
//!
//! `corral` attaches a terminal or pipe to a container managed by a remote
//! engine. Both ends of the attach stream share one pair of adapters that
//! turn a bidirectional frame stream into byte-oriented reads and writes with
//! backoff on empty frames and an offset-verified close handshake.
//!
//! # Modules
//!
//! - [`api`]: Command orchestration shared by the CLI and embedders
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Engine traits, container state, and socket resolution
//! - [`error`]: Semantic error types for the application
//! - [`protocol`]: Attach stream frames and handshake
//! - [`stream`]: Byte-stream adapters over attach frames
//! - [`terminal`]: Local terminal detection and raw mode
//! - [`session`]: Client-side attach session
//! - [`server`]: Engine-side attach stream handling
//! - [`rpc`]: Engine socket transport (Unix only)

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
#[cfg(unix)]
pub mod rpc;
pub mod server;
pub mod session;
pub mod stream;
pub mod terminal;
