//! Byte-oriented writer over the outbound half of an attach stream.

use std::future::{Future, poll_fn};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::io::AsyncWrite;
use tracing::debug;

use super::{AttachEndpoint, Role};
use crate::error::StreamError;
use crate::protocol::{Frame, FrameParts, Handshake, MAX_BUF_SIZE};

type OpFuture<T> = Pin<Box<dyn Future<Output = Result<T, StreamError>> + Send>>;

enum InFlight {
    Send { len: usize, future: OpFuture<()> },
    Finish(OpFuture<()>),
    Acknowledge(OpFuture<i64>),
}

enum Completed {
    Sent(usize),
    Finished,
    Acknowledged(i64),
}

/// Writes payload bytes to the peer over an attach stream.
///
/// Each write sends at most [`MAX_BUF_SIZE`] bytes as one frame tagged with
/// the offset of its first byte. The handshake rides on the first frame
/// sent, whatever that frame is.
///
/// Finishing happens in two steps. Shutting the writer down
/// ([`AsyncWriteExt::shutdown`](tokio::io::AsyncWriteExt::shutdown)) sends a
/// completion marker carrying the total, after which no more payload can be
/// written. [`StreamWriter::close`] finishes the stream if that has not
/// happened yet and, for a client-role writer, then waits for the peer's
/// acknowledgement, failing with [`StreamError::CommitMismatch`] if the peer
/// committed a different count. The peer acknowledges only after its own
/// completion marker, so a client closes its writer once its reader has
/// reached end-of-file.
///
/// The first failure is recorded and returned by every later call.
pub struct StreamWriter<E: AttachEndpoint> {
    endpoint: Option<Arc<E>>,
    role: Role,
    handshake: Option<Handshake>,
    offset: i64,
    finished: bool,
    peer_marker_pending: bool,
    in_flight: Option<InFlight>,
    failure: Option<StreamError>,
}

impl<E: AttachEndpoint> StreamWriter<E> {
    /// Create a writer over `endpoint` that sends `handshake` first.
    #[must_use]
    pub const fn new(endpoint: Arc<E>, role: Role, handshake: Option<Handshake>) -> Self {
        Self {
            endpoint: Some(endpoint),
            role,
            handshake,
            offset: 0,
            finished: false,
            peer_marker_pending: false,
            in_flight: None,
            failure: None,
        }
    }

    /// Return the number of payload bytes sent so far.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// Return whether the completion marker has been sent.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Return whether [`StreamWriter::close`] has completed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.endpoint.is_none()
    }

    /// Send the handshake on an empty frame unless a frame has already
    /// carried it.
    ///
    /// # Errors
    ///
    /// Returns the send failure, which is also recorded.
    pub async fn handshake(&mut self) -> Result<(), StreamError> {
        poll_fn(|cx| self.poll_handshake(cx)).await
    }

    /// Note that the peer's completion marker is still unread.
    ///
    /// A client that stops reading before end-of-file (on cancellation or a
    /// local output failure) calls this before [`StreamWriter::close`] so
    /// the marker is not mistaken for the acknowledgement.
    pub const fn expect_peer_marker(&mut self) {
        self.peer_marker_pending = true;
    }

    /// Finish the stream and, for the client role, verify the peer's
    /// committed count. Closing twice is a no-op.
    ///
    /// The first completion marker received is taken as the
    /// acknowledgement, so the peer's own marker must already have been
    /// read, or announced with [`StreamWriter::expect_peer_marker`] so that
    /// one marker is skipped.
    ///
    /// # Errors
    ///
    /// Returns the recorded failure, a send or receive failure while
    /// finishing, or [`StreamError::CommitMismatch`].
    pub async fn close(&mut self) -> Result<(), StreamError> {
        poll_fn(|cx| self.poll_close(cx)).await
    }

    fn record(&mut self, failure: StreamError) -> StreamError {
        self.failure = Some(failure.clone());
        failure
    }

    fn live_endpoint(&self) -> Result<Arc<E>, StreamError> {
        match &self.endpoint {
            Some(endpoint) if !self.finished => Ok(Arc::clone(endpoint)),
            _ => Err(StreamError::Closed),
        }
    }

    fn start_send(&mut self, data: Vec<u8>) -> Result<(), StreamError> {
        let endpoint = self.live_endpoint()?;
        let len = data.len();
        let parts = FrameParts::data(data, self.offset).with_handshake(self.handshake.take());
        let frame = E::Outbound::from_parts(parts);
        self.in_flight = Some(InFlight::Send {
            len,
            future: Box::pin(async move { endpoint.send(frame).await }),
        });
        Ok(())
    }

    fn start_finish(&mut self) -> Result<(), StreamError> {
        let endpoint = self.live_endpoint()?;
        let marker = FrameParts::finish(self.offset).with_handshake(self.handshake.take());
        let frame = E::Outbound::from_parts(marker);
        self.in_flight = Some(InFlight::Finish(Box::pin(async move {
            endpoint.send(frame).await
        })));
        Ok(())
    }

    fn poll_in_flight(&mut self, cx: &mut Context<'_>) -> Poll<Result<usize, StreamError>> {
        let Some(op) = self.in_flight.as_mut() else {
            return Poll::Ready(Ok(0));
        };
        let outcome = match op {
            InFlight::Send { len, future } => {
                let sent = *len;
                ready!(future.as_mut().poll(cx)).map(|()| Completed::Sent(sent))
            }
            InFlight::Finish(future) => {
                ready!(future.as_mut().poll(cx)).map(|()| Completed::Finished)
            }
            InFlight::Acknowledge(future) => {
                ready!(future.as_mut().poll(cx)).map(Completed::Acknowledged)
            }
        };
        self.in_flight = None;

        match outcome {
            Ok(Completed::Sent(sent)) => {
                self.offset = self.offset.saturating_add(i64::try_from(sent).unwrap_or(i64::MAX));
                Poll::Ready(Ok(sent))
            }
            Ok(Completed::Finished) => {
                debug!(total = self.offset, "sent attach completion marker");
                self.finished = true;
                Poll::Ready(Ok(0))
            }
            Ok(Completed::Acknowledged(committed)) => {
                self.endpoint = None;
                if committed == self.offset {
                    Poll::Ready(Ok(0))
                } else {
                    Poll::Ready(Err(self.record(StreamError::CommitMismatch {
                        written: self.offset,
                        committed,
                    })))
                }
            }
            Err(failure) => Poll::Ready(Err(self.record(failure))),
        }
    }

    fn poll_handshake(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), StreamError>> {
        loop {
            if let Some(failure) = &self.failure {
                return Poll::Ready(Err(failure.clone()));
            }
            if self.in_flight.is_some() {
                ready!(self.poll_in_flight(cx))?;
                continue;
            }
            if self.handshake.is_none() {
                return Poll::Ready(Ok(()));
            }
            self.start_send(Vec::new())?;
        }
    }

    fn poll_finish(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), StreamError>> {
        loop {
            if let Some(failure) = &self.failure {
                return Poll::Ready(Err(failure.clone()));
            }
            if self.in_flight.is_some() {
                ready!(self.poll_in_flight(cx))?;
                continue;
            }
            if self.finished || self.endpoint.is_none() {
                return Poll::Ready(Ok(()));
            }
            self.start_finish()?;
        }
    }

    fn poll_close(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), StreamError>> {
        loop {
            ready!(self.poll_finish(cx))?;
            let Some(endpoint) = self.endpoint.clone() else {
                return Poll::Ready(Ok(()));
            };
            if self.role == Role::Server {
                self.endpoint = None;
                return Poll::Ready(Ok(()));
            }
            let skip_marker = self.peer_marker_pending;
            self.in_flight = Some(InFlight::Acknowledge(Box::pin(acknowledgement(
                endpoint,
                skip_marker,
            ))));
        }
    }
}

/// Wait for the peer's committed count, skipping any payload still queued
/// ahead of it and, when `skip_marker` is set, the peer's completion marker.
async fn acknowledgement<E: AttachEndpoint>(
    endpoint: Arc<E>,
    mut skip_marker: bool,
) -> Result<i64, StreamError> {
    loop {
        let Some(frame) = endpoint.recv().await? else {
            return Err(StreamError::transport(
                "stream ended before the peer acknowledged the final write",
            ));
        };
        let parts = frame.into_parts();
        if parts.finish && skip_marker {
            debug!(total = parts.offset, "skipping unread peer completion marker");
            skip_marker = false;
            continue;
        }
        if parts.finish {
            return Ok(parts.offset);
        }
        if !parts.data.is_empty() {
            debug!(
                bytes = parts.data.len(),
                "discarding payload received while awaiting write acknowledgement"
            );
        }
    }
}

impl<E: AttachEndpoint> AsyncWrite for StreamWriter<E> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            if let Some(failure) = &this.failure {
                return Poll::Ready(Err(failure.clone().into()));
            }
            match &this.in_flight {
                Some(InFlight::Finish(_) | InFlight::Acknowledge(_)) => {
                    return Poll::Ready(Err(StreamError::Closed.into()));
                }
                Some(InFlight::Send { .. }) => {}
                None => {
                    if buf.is_empty() {
                        return Poll::Ready(Ok(0));
                    }
                    let (chunk, _) = buf.split_at(buf.len().min(MAX_BUF_SIZE));
                    this.start_send(chunk.to_vec())?;
                }
            }
            let sent = ready!(this.poll_in_flight(cx))?;
            if sent > 0 {
                return Poll::Ready(Ok(sent));
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(failure) = &this.failure {
            return Poll::Ready(Err(failure.clone().into()));
        }
        ready!(this.poll_in_flight(cx))?;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_finish(cx).map_err(io::Error::from)
    }
}
