//! Connection loop for the engine socket.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::codec::{self, FrameReader, FrameWriter};
use super::endpoint::ServerSocketEndpoint;
use super::{RpcCall, RpcReply};
use crate::engine::LifecycleManager;
use crate::error::{EngineError, StreamError};
use crate::server::AttachService;

/// Accept engine connections on `listener` until `shutdown` is cancelled.
///
/// Each connection is served on its own task. Attach streams observe a
/// child of `shutdown` while backing off.
///
/// # Errors
///
/// Returns the listener's error if accepting a connection fails.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "false positive triggered inside tokio::select! expansion"
)]
pub async fn serve<M>(
    listener: UnixListener,
    service: Arc<AttachService<M>>,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    M: LifecycleManager + 'static,
{
    info!("engine socket accepting connections");
    loop {
        let stream = tokio::select! {
            () = shutdown.cancelled() => {
                info!("engine socket shutting down");
                return Ok(());
            }
            accepted = listener.accept() => accepted?.0,
        };
        let connection_service = Arc::clone(&service);
        let cancel = shutdown.child_token();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, &connection_service, cancel).await {
                warn!(%error, "engine connection failed");
            }
        });
    }
}

async fn handle_connection<M: LifecycleManager>(
    stream: UnixStream,
    service: &AttachService<M>,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let (mut reader, mut writer) = codec::split(stream);
    let Some(call) = codec::read_message::<RpcCall>(&mut reader).await? else {
        debug!("engine connection closed before a call");
        return Ok(());
    };
    debug!(?call, "engine call received");

    let reply = match call {
        RpcCall::Inspect { container_id } => {
            match service.manager().inspect(&container_id).await {
                Ok(info) => RpcReply::Container { info },
                Err(error) => error_reply(&error),
            }
        }
        RpcCall::Start { container_id } => {
            done_or_error(service.manager().start(&container_id).await)
        }
        RpcCall::Stop {
            container_id,
            timeout_secs,
        } => done_or_error(
            service
                .manager()
                .stop(&container_id, Duration::from_secs(timeout_secs))
                .await,
        ),
        RpcCall::Attach => return serve_attach(reader, writer, service, cancel).await,
    };
    codec::write_message(&mut writer, &reply).await
}

async fn serve_attach<M: LifecycleManager>(
    reader: FrameReader,
    writer: FrameWriter,
    service: &AttachService<M>,
    cancel: CancellationToken,
) -> Result<(), StreamError> {
    let endpoint = ServerSocketEndpoint::new(reader, writer);
    if let Err(error) = service.serve_attach(endpoint, cancel).await {
        warn!(%error, "attach stream failed");
    }
    Ok(())
}

fn done_or_error(result: Result<(), EngineError>) -> RpcReply {
    result.map_or_else(|error| error_reply(&error), |()| RpcReply::Done)
}

/// Reply with the failure's own message; the client wraps it in the error
/// for the call it made.
fn error_reply(error: &EngineError) -> RpcReply {
    let message = match error {
        EngineError::InspectFailed { message, .. }
        | EngineError::StartFailed { message, .. }
        | EngineError::StopFailed { message, .. } => message.clone(),
        other => other.to_string(),
    };
    RpcReply::Error { message }
}
