//! Byte-stream adapters over a bidirectional attach frame stream.
//!
//! An attach stream is a single bidirectional channel of frames. This module
//! turns one such channel into two independent byte streams: a
//! [`StreamReader`] implementing [`tokio::io::AsyncRead`] and a
//! [`StreamWriter`] implementing [`tokio::io::AsyncWrite`]. Both are written
//! once against the narrow [`AttachEndpoint`] capability and parameterised by
//! [`Role`], so the client and the server share the same code.
//!
//! The two halves share the endpoint but nothing else: the reader owns the
//! receive-side state and the writer owns the offset and handshake state, so
//! each can be moved into its own forwarding task.

mod backoff;
mod buffer;
mod channel;
mod reader;
mod writer;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use backoff::{
    BACKOFF_BASE, BACKOFF_FACTOR, BACKOFF_JITTER, BACKOFF_MAX, Backoff, MAX_TRIES,
};
pub use channel::{ChannelEndpoint, ClientChannel, ServerChannel, channel_pair};
pub use reader::StreamReader;
pub use writer::StreamWriter;

use crate::error::StreamError;
use crate::protocol::{Frame, Handshake};

/// Boxed future returned by [`AttachEndpoint::send`] and
/// [`AttachEndpoint::close_send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + 'a>>;

/// Boxed future returned by [`AttachEndpoint::recv`].
///
/// Resolves to `Ok(None)` once the peer has ended the stream.
pub type RecvFuture<'a, F> =
    Pin<Box<dyn Future<Output = Result<Option<F>, StreamError>> + Send + 'a>>;

/// Transport-level bidirectional attach stream.
///
/// Implementations must serialise concurrent calls internally: the reader
/// and the writer of one stream call into the same endpoint from different
/// tasks.
pub trait AttachEndpoint: Send + Sync + 'static {
    /// Frame type this side sends.
    type Outbound: Frame;
    /// Frame type this side receives.
    type Inbound: Frame;

    /// Send one frame to the peer.
    fn send(&self, frame: Self::Outbound) -> SendFuture<'_>;

    /// Receive the next frame from the peer.
    fn recv(&self) -> RecvFuture<'_, Self::Inbound>;

    /// Signal that this side will send no further frames.
    fn close_send(&self) -> SendFuture<'_>;
}

/// Which end of the attach stream an adapter serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The CLI side: waits for the peer to acknowledge its final write and
    /// half-closes the endpoint when its reader closes.
    Client,
    /// The engine side: acknowledges the client's final write and emits its
    /// own completion marker without waiting for a reply.
    Server,
}

/// Split `endpoint` into a reader and a writer for `role`.
///
/// The writer sends `handshake` on its first frame. The reader observes
/// `cancel` while backing off between empty receives.
#[must_use]
pub fn attach_pair<E: AttachEndpoint>(
    endpoint: E,
    role: Role,
    handshake: Handshake,
    cancel: CancellationToken,
) -> (StreamReader<E>, StreamWriter<E>) {
    let shared = Arc::new(endpoint);
    let reader = StreamReader::new(Arc::clone(&shared), role, cancel);
    let writer = StreamWriter::new(shared, role, Some(handshake));
    (reader, writer)
}

#[cfg(test)]
mod tests;
