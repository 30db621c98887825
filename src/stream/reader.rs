//! Byte-oriented reader over the inbound half of an attach stream.

use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backoff::{self, Backoff, MAX_TRIES};
use super::buffer::ChunkBuffer;
use super::{AttachEndpoint, Role};
use crate::error::StreamError;
use crate::protocol::{Frame, FrameParts, Handshake};

/// Outcome of one successful receive cycle.
enum Chunk {
    Data(Vec<u8>),
    End,
}

type ChunkFuture<E> = Pin<Box<dyn Future<Output = (Receiver<E>, Result<Chunk, StreamError>)> + Send>>;

enum ReadState<E: AttachEndpoint> {
    Idle(Receiver<E>),
    Receiving(ChunkFuture<E>),
    Closed,
}

/// Receive-side state, moved into the in-flight receive future and handed
/// back when it completes.
struct Receiver<E: AttachEndpoint> {
    endpoint: Arc<E>,
    role: Role,
    cancel: CancellationToken,
    received: i64,
    peer: Option<Handshake>,
    acknowledge: Option<i64>,
}

impl<E: AttachEndpoint> Receiver<E> {
    async fn next_chunk(mut self) -> (Self, Result<Chunk, StreamError>) {
        let result = self.receive().await;
        (self, result)
    }

    async fn receive(&mut self) -> Result<Chunk, StreamError> {
        let mut delays = Backoff::new();
        for attempt in 1..=MAX_TRIES {
            let Some(frame) = self.endpoint.recv().await? else {
                debug!(received = self.received, "attach stream ended by peer");
                return Ok(Chunk::End);
            };
            let parts = frame.into_parts();
            self.note_handshake(parts.handshake);

            if parts.finish {
                self.finish(parts.offset)?;
                return Ok(Chunk::End);
            }
            if !parts.data.is_empty() {
                self.received = self.received.saturating_add(byte_count(parts.data.len()));
                return Ok(Chunk::Data(parts.data));
            }
            if attempt < MAX_TRIES {
                backoff::wait(delays.next_delay(), attempt, &self.cancel).await?;
            }
        }
        Err(StreamError::BackoffExhausted {
            attempts: MAX_TRIES,
        })
    }

    fn note_handshake(&mut self, handshake: Option<Handshake>) {
        let Some(incoming) = handshake else {
            return;
        };
        if self.peer.is_some() {
            warn!(
                container_id = incoming.container_id(),
                "ignoring repeated attach handshake"
            );
            return;
        }
        self.peer = Some(incoming);
    }

    fn finish(&mut self, declared: i64) -> Result<(), StreamError> {
        if self.role == Role::Server {
            self.acknowledge = Some(self.received);
        }
        if declared != self.received {
            return Err(StreamError::CommitMismatch {
                written: declared,
                committed: self.received,
            });
        }
        debug!(total = declared, "peer completed its attach stream");
        Ok(())
    }
}

fn byte_count(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Reads the peer's payload bytes from an attach stream.
///
/// Each read consumes the remainder of the last received chunk before
/// receiving another. Empty frames are retried with jittered backoff; when
/// [`MAX_TRIES`] receives in a row bring no data the read fails with
/// [`io::ErrorKind::TimedOut`] and the next read tries again. Every other
/// failure is recorded and returned unchanged by all later reads.
///
/// The peer's completion marker, or the end of the underlying stream, reads
/// as end-of-file. A server-role reader acknowledges the marker with the
/// number of bytes it received when it is closed, so the acknowledgement
/// always follows the server's own completion marker on the wire.
pub struct StreamReader<E: AttachEndpoint> {
    state: ReadState<E>,
    endpoint: Option<Arc<E>>,
    role: Role,
    pending: ChunkBuffer,
    finished: bool,
    failure: Option<StreamError>,
}

impl<E: AttachEndpoint> StreamReader<E> {
    /// Create a reader over `endpoint`.
    #[must_use]
    pub fn new(endpoint: Arc<E>, role: Role, cancel: CancellationToken) -> Self {
        let receiver = Receiver {
            endpoint: Arc::clone(&endpoint),
            role,
            cancel,
            received: 0,
            peer: None,
            acknowledge: None,
        };
        Self {
            state: ReadState::Idle(receiver),
            endpoint: Some(endpoint),
            role,
            pending: ChunkBuffer::default(),
            finished: false,
            failure: None,
        }
    }

    /// Seed the reader with a frame the caller already received.
    ///
    /// The server receives the client's first frame itself to validate the
    /// handshake; this hands that frame's handshake and payload to the reader
    /// so the payload is read first and counted toward the commit total.
    /// A client that never sent its handshake on its own folds it into the
    /// completion marker; such a frame finishes the reader straight away, and
    /// a count that disagrees with the payload is returned by the next read.
    #[must_use]
    pub fn with_first_frame(mut self, parts: FrameParts) -> Self {
        if let ReadState::Idle(receiver) = &mut self.state {
            receiver.note_handshake(parts.handshake);
            receiver.received = receiver.received.saturating_add(byte_count(parts.data.len()));
            if parts.finish {
                self.finished = true;
                if let Err(mismatch) = receiver.finish(parts.offset) {
                    self.failure = Some(mismatch);
                }
            }
        }
        self.pending.fill(parts.data);
        self
    }

    /// Close the reader.
    ///
    /// Any in-flight receive is abandoned. A client-role reader half-closes
    /// the endpoint; a server-role reader that has seen the client's
    /// completion marker sends its acknowledgement. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the endpoint's error if half-closing or acknowledging fails.
    pub async fn close(&mut self) -> Result<(), StreamError> {
        let acknowledge = match mem::replace(&mut self.state, ReadState::Closed) {
            ReadState::Idle(receiver) => receiver.acknowledge,
            ReadState::Receiving(_) | ReadState::Closed => None,
        };
        let Some(endpoint) = self.endpoint.take() else {
            return Ok(());
        };
        match self.role {
            Role::Client => endpoint.close_send().await,
            Role::Server => {
                let Some(received) = acknowledge else {
                    return Ok(());
                };
                let ack = FrameParts::finish(received);
                endpoint.send(E::Outbound::from_parts(ack)).await
            }
        }
    }

    /// Return whether the peer's completion marker or the end of the stream
    /// has been read.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Return whether [`StreamReader::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.endpoint.is_none()
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Result<Chunk, StreamError>> {
        loop {
            match mem::replace(&mut self.state, ReadState::Closed) {
                ReadState::Closed => return Poll::Ready(Err(StreamError::Closed)),
                ReadState::Idle(receiver) => {
                    self.state = ReadState::Receiving(Box::pin(receiver.next_chunk()));
                }
                ReadState::Receiving(mut future) => match future.as_mut().poll(cx) {
                    Poll::Pending => {
                        self.state = ReadState::Receiving(future);
                        return Poll::Pending;
                    }
                    Poll::Ready((receiver, result)) => {
                        self.state = ReadState::Idle(receiver);
                        return Poll::Ready(result);
                    }
                },
            }
        }
    }
}

impl<E: AttachEndpoint> AsyncRead for StreamReader<E> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if let Some(failure) = &this.failure {
                return Poll::Ready(Err(failure.clone().into()));
            }
            if !this.pending.is_empty() {
                this.pending.copy_into(buf);
                return Poll::Ready(Ok(()));
            }
            if this.finished || buf.remaining() == 0 {
                return Poll::Ready(Ok(()));
            }
            match ready!(this.poll_chunk(cx)) {
                Ok(Chunk::Data(data)) => this.pending.fill(data),
                Ok(Chunk::End) => this.finished = true,
                Err(exhausted @ StreamError::BackoffExhausted { .. }) => {
                    return Poll::Ready(Err(exhausted.into()));
                }
                Err(failure) => {
                    this.finished = matches!(failure, StreamError::CommitMismatch { .. });
                    this.failure = Some(failure.clone());
                    return Poll::Ready(Err(failure.into()));
                }
            }
        }
    }
}
