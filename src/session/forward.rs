//! The two forwarding loops of an attach session.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::stream::{AttachEndpoint, StreamReader, StreamWriter};

/// Read buffer size for the output loop.
const OUTPUT_CHUNK: usize = 32 * 1024;

/// Why the output loop stopped early.
#[derive(Debug)]
pub(super) enum OutputFailure {
    /// The remote stream failed.
    Remote(io::Error),
    /// Local stdout could not be written.
    Local(io::Error),
}

impl OutputFailure {
    pub(super) fn message(&self) -> String {
        match self {
            Self::Remote(error) => format!("remote stream failed: {error}"),
            Self::Local(error) => format!("local output failed: {error}"),
        }
    }
}

/// Copy the remote stream to `stdout` until the remote end finishes.
///
/// Returns the reader so the session can close it. Exhausted retries are
/// not an end of stream and reading simply continues; cancellation ends the
/// loop as if the stream had finished.
pub(super) async fn forward_output<E, O>(
    mut reader: StreamReader<E>,
    mut stdout: O,
) -> (StreamReader<E>, Result<(), OutputFailure>)
where
    E: AttachEndpoint,
    O: AsyncWrite + Unpin,
{
    let mut buf = vec![0_u8; OUTPUT_CHUNK];
    let mut forwarded: u64 = 0;
    let outcome = loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(read) => read,
            Err(error) => match StreamError::from_io_error(&error) {
                Some(StreamError::BackoffExhausted { attempts }) => {
                    debug!(attempts, "no output yet; still waiting");
                    continue;
                }
                Some(StreamError::Cancelled { attempts }) => {
                    info!(attempts, "output forwarding cancelled");
                    break Ok(());
                }
                _ => break Err(OutputFailure::Remote(error)),
            },
        };
        let Some(chunk) = buf.get(..read) else {
            break Ok(());
        };
        if let Err(error) = write_chunk(&mut stdout, chunk).await {
            break Err(OutputFailure::Local(error));
        }
        forwarded = forwarded.saturating_add(u64::try_from(read).unwrap_or(u64::MAX));
    };
    debug!(forwarded, "output forwarding finished");
    (reader, outcome)
}

async fn write_chunk<O: AsyncWrite + Unpin>(stdout: &mut O, chunk: &[u8]) -> io::Result<()> {
    stdout.write_all(chunk).await?;
    stdout.flush().await
}

/// Copy local `stdin` to the remote stream until local end-of-file, a
/// write failure, or `stop`.
///
/// Local end-of-file finishes the writer so the container sees its stdin
/// close. Failures are logged; they never end the session. Returns the
/// writer so the session can close it.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "false positive triggered inside tokio::select! expansion"
)]
pub(super) async fn forward_input<E, I>(
    mut stdin: I,
    mut writer: StreamWriter<E>,
    stop: oneshot::Receiver<()>,
) -> StreamWriter<E>
where
    E: AttachEndpoint,
    I: AsyncRead + Unpin,
{
    tokio::select! {
        biased;
        _ = stop => {
            debug!("input forwarding stopped");
        }
        result = copy_and_finish(&mut stdin, &mut writer) => match result {
            Ok(copied) => debug!(copied, "local input finished"),
            Err(error) => warn!(%error, "input forwarding failed"),
        },
    }
    writer
}

async fn copy_and_finish<E, I>(stdin: &mut I, writer: &mut StreamWriter<E>) -> io::Result<u64>
where
    E: AttachEndpoint,
    I: AsyncRead + Unpin,
{
    let copied = tokio::io::copy(stdin, writer).await?;
    writer.shutdown().await?;
    Ok(copied)
}
