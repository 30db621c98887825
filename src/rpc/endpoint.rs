//! Attach stream endpoint over a framed Unix socket connection.

use std::marker::PhantomData;

use futures_util::SinkExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::codec::{self, FrameReader, FrameWriter};
use crate::error::StreamError;
use crate::protocol::{AttachRequest, AttachResponse, Frame};
use crate::stream::{AttachEndpoint, RecvFuture, SendFuture};

/// One end of an attach stream carried by a socket connection.
pub struct SocketEndpoint<Out, In> {
    reader: Mutex<FrameReader>,
    writer: Mutex<Option<FrameWriter>>,
    frames: PhantomData<fn(Out) -> In>,
}

/// The CLI end of a socket attach stream.
pub type ClientSocketEndpoint = SocketEndpoint<AttachRequest, AttachResponse>;

/// The engine end of a socket attach stream.
pub type ServerSocketEndpoint = SocketEndpoint<AttachResponse, AttachRequest>;

impl<Out, In> SocketEndpoint<Out, In> {
    pub(crate) fn new(reader: FrameReader, writer: FrameWriter) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(Some(writer)),
            frames: PhantomData,
        }
    }
}

impl<Out, In> AttachEndpoint for SocketEndpoint<Out, In>
where
    Out: Frame + Serialize + Sync,
    In: Frame + DeserializeOwned,
{
    type Outbound = Out;
    type Inbound = In;

    fn send(&self, frame: Out) -> SendFuture<'_> {
        Box::pin(async move {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or(StreamError::Closed)?;
            codec::write_message(writer, &frame).await
        })
    }

    fn recv(&self) -> RecvFuture<'_, In> {
        Box::pin(async move { codec::read_message(&mut *self.reader.lock().await).await })
    }

    fn close_send(&self) -> SendFuture<'_> {
        Box::pin(async move {
            let Some(mut writer) = self.writer.lock().await.take() else {
                return Ok(());
            };
            SinkExt::<bytes::Bytes>::close(&mut writer)
                .await
                .map_err(StreamError::transport)
        })
    }
}
