//! Engine RPC over a Unix domain socket.
//!
//! Every connection carries length-delimited JSON messages. A connection
//! opens with one [`RpcCall`]. Unary calls are answered with exactly one
//! [`RpcReply`] and the connection is closed; an [`RpcCall::Attach`] call
//! turns the rest of the connection into an attach stream, carrying
//! [`AttachRequest`](crate::protocol::AttachRequest) frames from client to
//! server and [`AttachResponse`](crate::protocol::AttachResponse) frames
//! back.

mod client;
mod codec;
mod endpoint;
mod server;

use serde::{Deserialize, Serialize};

pub use client::SocketEngineClient;
pub use endpoint::{ClientSocketEndpoint, ServerSocketEndpoint, SocketEndpoint};
pub use server::serve;

use crate::engine::ContainerInfo;

/// First message on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RpcCall {
    /// Report a container's state.
    Inspect {
        /// Target container.
        container_id: String,
    },
    /// Start a container.
    Start {
        /// Target container.
        container_id: String,
    },
    /// Stop a container.
    Stop {
        /// Target container.
        container_id: String,
        /// Grace period before the container is killed.
        timeout_secs: u64,
    },
    /// Switch the connection to an attach stream.
    Attach,
}

/// Answer to a unary [`RpcCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum RpcReply {
    /// Answer to [`RpcCall::Inspect`].
    Container {
        /// The inspected container.
        info: ContainerInfo,
    },
    /// The call succeeded and has nothing to report.
    Done,
    /// The call failed.
    Error {
        /// Human-readable failure.
        message: String,
    },
}
