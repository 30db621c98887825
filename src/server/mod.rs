//! Engine side of an attach stream.
//!
//! [`AttachService`] accepts a client's attach stream, validates the
//! handshake, lends the stream's byte halves to the
//! [`LifecycleManager`] for the life of the container's output, and then
//! completes the stream in the order the client expects: the server's own
//! completion marker first, the acknowledgement of the client's marker last.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{AttachIo, LifecycleManager};
use crate::error::{CorralError, StreamError};
use crate::protocol::{AttachRequest, AttachResponse, Frame, FrameParts, Handshake};
use crate::stream::{AttachEndpoint, Role, StreamReader, StreamWriter};

/// Default bound on waiting for the client's completion marker.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves attach streams for a [`LifecycleManager`].
pub struct AttachService<M> {
    manager: Arc<M>,
    drain_timeout: Duration,
}

impl<M> AttachService<M> {
    /// Create a service over `manager`.
    ///
    /// `drain_timeout` bounds how long the service waits for the client's
    /// completion marker once the container's output has ended.
    #[must_use]
    pub const fn new(manager: Arc<M>, drain_timeout: Duration) -> Self {
        Self {
            manager,
            drain_timeout,
        }
    }

    /// Return the lifecycle manager this service serves.
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.manager
    }
}

impl<M: LifecycleManager> AttachService<M> {
    /// Run one attach stream to completion.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Protocol`] when the stream does not open with a
    /// handshake, the stream error if the handshake reply cannot be sent,
    /// and the manager's error if attaching fails. Failures while completing
    /// the stream are logged only.
    pub async fn serve_attach<E>(
        &self,
        endpoint: E,
        cancel: CancellationToken,
    ) -> Result<(), CorralError>
    where
        E: AttachEndpoint<Outbound = AttachResponse, Inbound = AttachRequest>,
    {
        let endpoint = Arc::new(endpoint);
        let (handshake, first) = accept_handshake(endpoint.as_ref()).await?;
        let container_id = handshake.container_id().to_owned();
        let stdin = handshake.stdin();
        info!(container_id = %container_id, stdin, "attach stream accepted");

        let mut reader =
            StreamReader::new(Arc::clone(&endpoint), Role::Server, cancel).with_first_frame(first);
        let mut writer = StreamWriter::new(endpoint, Role::Server, Some(handshake));
        writer.handshake().await?;

        let stdin_io: Option<&mut (dyn AsyncRead + Send + Unpin)> =
            if stdin { Some(&mut reader) } else { None };
        let io = AttachIo {
            stdin: stdin_io,
            output: &mut writer,
        };
        let attached = self.manager.attach(&container_id, io).await;

        if let Err(error) = writer.close().await {
            warn!(container_id = %container_id, %error, "failed to send attach completion marker");
        }
        self.drain(&container_id, &mut reader).await;
        if let Err(error) = reader.close().await {
            warn!(container_id = %container_id, %error, "failed to acknowledge client completion");
        }

        attached?;
        info!(container_id = %container_id, "attach stream completed");
        Ok(())
    }

    async fn drain<E: AttachEndpoint>(&self, container_id: &str, reader: &mut StreamReader<E>) {
        match timeout(self.drain_timeout, tokio::io::copy(reader, &mut tokio::io::sink())).await {
            Ok(Ok(discarded)) => {
                debug!(container_id, discarded, "client stream drained");
            }
            Ok(Err(error)) => {
                warn!(container_id, %error, "failed draining client stream");
            }
            Err(_) => {
                warn!(
                    container_id,
                    timeout_secs = self.drain_timeout.as_secs(),
                    "client did not finish its stream in time"
                );
            }
        }
    }
}

/// Receive the client's first frame, which must carry the handshake.
async fn accept_handshake<E: AttachEndpoint>(
    endpoint: &E,
) -> Result<(Handshake, FrameParts), StreamError> {
    let Some(frame) = endpoint.recv().await? else {
        return Err(StreamError::protocol(
            "attach stream ended before the handshake",
        ));
    };
    let parts = frame.into_parts();
    let handshake = parts
        .handshake
        .clone()
        .ok_or_else(|| StreamError::protocol("unexpected empty handshake"))?;
    Ok((handshake, parts))
}
