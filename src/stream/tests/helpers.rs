//! Scripted endpoint and frame builders shared by the stream tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::StreamError;
use crate::protocol::{AttachRequest, AttachResponse, Frame, FrameParts, Handshake};
use crate::stream::{AttachEndpoint, RecvFuture, SendFuture};

/// An endpoint that replays a fixed script of inbound results and records
/// every frame sent through it.
pub(super) struct ScriptedEndpoint<Out, In> {
    inbound: Mutex<VecDeque<Result<Option<In>, StreamError>>>,
    sent: Mutex<Vec<Out>>,
    send_failure: Option<StreamError>,
    recv_calls: AtomicUsize,
    send_calls: AtomicUsize,
    close_send_calls: AtomicUsize,
}

/// Client side: sends requests, receives responses.
pub(super) type ClientScript = ScriptedEndpoint<AttachRequest, AttachResponse>;

/// Server side: sends responses, receives requests.
pub(super) type ServerScript = ScriptedEndpoint<AttachResponse, AttachRequest>;

impl<Out, In> ScriptedEndpoint<Out, In> {
    /// Replay `frames` in order, then report end of stream.
    pub(super) fn new(frames: impl IntoIterator<Item = In>) -> Self {
        Self::with_results(frames.into_iter().map(|frame| Ok(Some(frame))))
    }

    /// Replay raw receive results in order, then report end of stream.
    pub(super) fn with_results(
        results: impl IntoIterator<Item = Result<Option<In>, StreamError>>,
    ) -> Self {
        Self {
            inbound: Mutex::new(results.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
            send_failure: None,
            recv_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            close_send_calls: AtomicUsize::new(0),
        }
    }

    /// Make every send fail with `failure`.
    pub(super) fn failing_sends(mut self, failure: StreamError) -> Self {
        self.send_failure = Some(failure);
        self
    }

    pub(super) fn recv_calls(&self) -> usize {
        self.recv_calls.load(Ordering::SeqCst)
    }

    pub(super) fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub(super) fn close_send_calls(&self) -> usize {
        self.close_send_calls.load(Ordering::SeqCst)
    }
}

impl<Out: Clone, In> ScriptedEndpoint<Out, In> {
    pub(super) fn sent(&self) -> Vec<Out> {
        self.sent.lock().expect("sent frames lock").clone()
    }
}

impl<Out: Frame, In: Frame> AttachEndpoint for ScriptedEndpoint<Out, In> {
    type Outbound = Out;
    type Inbound = In;

    fn send(&self, frame: Out) -> SendFuture<'_> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.send_failure.clone().map_or_else(
            || {
                self.sent.lock().expect("sent frames lock").push(frame);
                Ok(())
            },
            Err,
        );
        Box::pin(async move { result })
    }

    fn recv(&self) -> RecvFuture<'_, In> {
        self.recv_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .inbound
            .lock()
            .expect("inbound script lock")
            .pop_front()
            .unwrap_or(Ok(None));
        Box::pin(async move { next })
    }

    fn close_send(&self) -> SendFuture<'_> {
        self.close_send_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

pub(super) fn response_data(bytes: &[u8], offset: i64) -> AttachResponse {
    AttachResponse::from_parts(FrameParts::data(bytes.to_vec(), offset))
}

pub(super) fn response_finish(total: i64) -> AttachResponse {
    AttachResponse::from_parts(FrameParts::finish(total))
}

pub(super) fn response_empty() -> AttachResponse {
    AttachResponse::default()
}

pub(super) fn request_data(bytes: &[u8], offset: i64) -> AttachRequest {
    AttachRequest::from_parts(FrameParts::data(bytes.to_vec(), offset))
}

pub(super) fn request_finish(total: i64) -> AttachRequest {
    AttachRequest::from_parts(FrameParts::finish(total))
}

pub(super) fn with_handshake<F: Frame>(frame: F, container_id: &str) -> F {
    let parts = frame
        .into_parts()
        .with_handshake(Some(Handshake::new(container_id, true)));
    F::from_parts(parts)
}

/// A payload whose bytes encode their own position, so misordered or
/// dropped chunks show up in comparisons.
pub(super) fn patterned_payload(len: usize) -> Vec<u8> {
    (0..=250_u8).cycle().take(len).collect()
}
