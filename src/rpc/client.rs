//! Engine client speaking the socket RPC.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::debug;

use super::codec::{self, FrameReader, FrameWriter};
use super::endpoint::ClientSocketEndpoint;
use super::{RpcCall, RpcReply};
use crate::engine::{ContainerInfo, EngineClient, EngineFuture, classify_connect_error};
use crate::error::{EngineError, StreamError};

/// [`EngineClient`] that opens a fresh socket connection per call.
#[derive(Debug, Clone)]
pub struct SocketEngineClient {
    path: PathBuf,
}

impl SocketEngineClient {
    /// Create a client for the engine socket at `path`.
    ///
    /// No connection is made until the first call.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Return the socket path this client connects to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open and immediately drop one connection, surfacing a missing or
    /// inaccessible socket early.
    ///
    /// # Errors
    ///
    /// Returns the classified connection error.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.connect().await.map(drop)
    }

    async fn connect(&self) -> Result<(FrameReader, FrameWriter), EngineError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|error| classify_connect_error(&error, &self.path))?;
        debug!(socket = %self.path.display(), "connected to engine");
        Ok(codec::split(stream))
    }

    async fn call(&self, call: RpcCall) -> Result<RpcReply, EngineError> {
        let (mut reader, mut writer) = self.connect().await?;
        codec::write_message(&mut writer, &call)
            .await
            .map_err(|error| rpc_failure(&error))?;
        codec::read_message(&mut reader)
            .await
            .map_err(|error| rpc_failure(&error))?
            .ok_or_else(|| EngineError::Rpc {
                message: String::from("engine closed the connection without replying"),
            })
    }

    async fn call_done(
        &self,
        call: RpcCall,
        failure: impl FnOnce(String) -> EngineError,
    ) -> Result<(), EngineError> {
        match self.call(call).await? {
            RpcReply::Done => Ok(()),
            RpcReply::Error { message } => Err(failure(message)),
            other => Err(unexpected(&other)),
        }
    }
}

fn rpc_failure(error: &StreamError) -> EngineError {
    EngineError::Rpc {
        message: error.to_string(),
    }
}

fn unexpected(reply: &RpcReply) -> EngineError {
    EngineError::Rpc {
        message: format!("unexpected reply: {reply:?}"),
    }
}

impl EngineClient for SocketEngineClient {
    type Endpoint = ClientSocketEndpoint;

    fn inspect(&self, container_id: &str) -> EngineFuture<'_, ContainerInfo> {
        let id = container_id.to_owned();
        Box::pin(async move {
            let call = RpcCall::Inspect {
                container_id: id.clone(),
            };
            match self.call(call).await? {
                RpcReply::Container { info } => Ok(info),
                RpcReply::Error { message } => Err(EngineError::InspectFailed {
                    container_id: id,
                    message,
                }),
                other @ RpcReply::Done => Err(unexpected(&other)),
            }
        })
    }

    fn start(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let id = container_id.to_owned();
        Box::pin(async move {
            let call = RpcCall::Start {
                container_id: id.clone(),
            };
            self.call_done(call, |message| EngineError::StartFailed {
                container_id: id,
                message,
            })
            .await
        })
    }

    fn stop(&self, container_id: &str, timeout: Duration) -> EngineFuture<'_, ()> {
        let id = container_id.to_owned();
        Box::pin(async move {
            let call = RpcCall::Stop {
                container_id: id.clone(),
                timeout_secs: timeout.as_secs(),
            };
            self.call_done(call, |message| EngineError::StopFailed {
                container_id: id,
                message,
            })
            .await
        })
    }

    fn open_attach(&self, container_id: &str) -> EngineFuture<'_, ClientSocketEndpoint> {
        let id = container_id.to_owned();
        Box::pin(async move {
            let (reader, mut writer) = self.connect().await?;
            codec::write_message(&mut writer, &RpcCall::Attach)
                .await
                .map_err(|error| EngineError::AttachFailed {
                    container_id: id,
                    message: error.to_string(),
                })?;
            Ok(ClientSocketEndpoint::new(reader, writer))
        })
    }
}
