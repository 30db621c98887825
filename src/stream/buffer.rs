//! Holding buffer for partially consumed chunks.

use bytes::{Buf, Bytes};
use tokio::io::ReadBuf;

/// The unconsumed remainder of the most recently received chunk.
#[derive(Debug, Default)]
pub(crate) struct ChunkBuffer {
    pending: Bytes,
}

impl ChunkBuffer {
    pub(crate) fn is_empty(&self) -> bool {
        !self.pending.has_remaining()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.remaining()
    }

    /// Replace the buffer contents with a freshly received chunk.
    pub(crate) fn fill(&mut self, chunk: Vec<u8>) {
        self.pending = Bytes::from(chunk);
    }

    /// Copy as much as fits into `buf`, keeping the rest for the next read.
    pub(crate) fn copy_into(&mut self, buf: &mut ReadBuf<'_>) -> usize {
        let count = self.pending.remaining().min(buf.remaining());
        let head = self.pending.split_to(count);
        buf.put_slice(&head);
        count
    }
}
