//! In-process attach transport over bounded channels.
//!
//! Used to wire a client session straight to an in-process server, and as
//! the loopback transport in tests.

use tokio::sync::{Mutex, mpsc};

use super::{AttachEndpoint, RecvFuture, SendFuture};
use crate::error::StreamError;
use crate::protocol::{AttachRequest, AttachResponse, Frame};

/// One end of an in-process attach stream.
pub struct ChannelEndpoint<Out, In> {
    outbound: Mutex<Option<mpsc::Sender<Out>>>,
    inbound: Mutex<mpsc::Receiver<In>>,
}

/// The client end of [`channel_pair`].
pub type ClientChannel = ChannelEndpoint<AttachRequest, AttachResponse>;

/// The server end of [`channel_pair`].
pub type ServerChannel = ChannelEndpoint<AttachResponse, AttachRequest>;

/// Create a connected client and server endpoint, each direction buffering
/// up to `capacity` frames.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn channel_pair(capacity: usize) -> (ClientChannel, ServerChannel) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (response_tx, response_rx) = mpsc::channel(capacity);
    let client = ChannelEndpoint {
        outbound: Mutex::new(Some(request_tx)),
        inbound: Mutex::new(response_rx),
    };
    let server = ChannelEndpoint {
        outbound: Mutex::new(Some(response_tx)),
        inbound: Mutex::new(request_rx),
    };
    (client, server)
}

impl<Out: Frame, In: Frame> AttachEndpoint for ChannelEndpoint<Out, In> {
    type Outbound = Out;
    type Inbound = In;

    fn send(&self, frame: Out) -> SendFuture<'_> {
        Box::pin(async move {
            let sender = self
                .outbound
                .lock()
                .await
                .clone()
                .ok_or(StreamError::Closed)?;
            sender.send(frame).await.map_err(StreamError::transport)
        })
    }

    fn recv(&self) -> RecvFuture<'_, In> {
        Box::pin(async move { Ok(self.inbound.lock().await.recv().await) })
    }

    fn close_send(&self) -> SendFuture<'_> {
        Box::pin(async move {
            drop(self.outbound.lock().await.take());
            Ok(())
        })
    }
}
