//! Length-delimited JSON framing for engine connections.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::StreamError;
use crate::protocol::MAX_BUF_SIZE;

/// Inbound half of a framed connection.
pub(crate) type FrameReader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;

/// Outbound half of a framed connection.
pub(crate) type FrameWriter = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// Largest encoded message accepted. Base64 inflates payloads by a third
/// and JSON adds field names, so a full payload frame needs some headroom.
const MAX_MESSAGE_LEN: usize = 4 * MAX_BUF_SIZE;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_MESSAGE_LEN)
        .new_codec()
}

/// Split `stream` into framed halves.
pub(crate) fn split(stream: UnixStream) -> (FrameReader, FrameWriter) {
    let (read_half, write_half) = stream.into_split();
    (
        FramedRead::new(read_half, codec()),
        FramedWrite::new(write_half, codec()),
    )
}

/// Encode and send one message.
pub(crate) async fn write_message<T: Serialize + Sync>(
    writer: &mut FrameWriter,
    message: &T,
) -> Result<(), StreamError> {
    let encoded = serde_json::to_vec(message).map_err(|error| {
        StreamError::protocol(format!("failed to encode message: {error}"))
    })?;
    writer
        .send(bytes::Bytes::from(encoded))
        .await
        .map_err(StreamError::transport)
}

/// Receive and decode one message, or `None` once the peer has closed its
/// write side.
pub(crate) async fn read_message<T: DeserializeOwned>(
    reader: &mut FrameReader,
) -> Result<Option<T>, StreamError> {
    let Some(next) = reader.next().await else {
        return Ok(None);
    };
    let bytes = next.map_err(StreamError::transport)?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|error| StreamError::protocol(format!("failed to decode message: {error}")))
}
