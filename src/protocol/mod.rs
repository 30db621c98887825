//! Wire frames exchanged on an attach stream.
//!
//! Each direction of an attach stream carries its own frame type:
//! [`AttachRequest`] flows from client to server and [`AttachResponse`] from
//! server to client. Both reduce to the role-neutral [`FrameParts`] so the
//! stream adapters in [`crate::stream`] are written once for either role.
//!
//! A direction opens with exactly one handshake (container id and stdin
//! flag), carries payload frames in order, and ends with a completion marker
//! stating the total number of payload bytes sent.

mod payload;

use serde::{Deserialize, Serialize};

/// Largest payload carried by a single frame (2 MiB).
pub const MAX_BUF_SIZE: usize = 2 * 1024 * 1024;

/// Session-identifying fields sent on the first frame of a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    container_id: String,
    stdin: bool,
}

impl Handshake {
    /// Create a handshake for `container_id`.
    #[must_use]
    pub fn new(container_id: impl Into<String>, stdin: bool) -> Self {
        Self {
            container_id: container_id.into(),
            stdin,
        }
    }

    /// Return the container the stream is attached to.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Return whether the client forwards stdin on this stream.
    #[must_use]
    pub const fn stdin(&self) -> bool {
        self.stdin
    }
}

/// Role-neutral view of a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameParts {
    /// Handshake fields, present on the first frame of a direction only.
    pub handshake: Option<Handshake>,
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Offset of the payload's first byte, or the total byte count on a
    /// completion marker.
    pub offset: i64,
    /// Whether this frame is a completion marker (or its acknowledgement).
    pub finish: bool,
}

impl FrameParts {
    /// A payload frame starting at `offset`.
    #[must_use]
    pub const fn data(data: Vec<u8>, offset: i64) -> Self {
        Self {
            handshake: None,
            data,
            offset,
            finish: false,
        }
    }

    /// A completion marker declaring `total` bytes.
    #[must_use]
    pub const fn finish(total: i64) -> Self {
        Self {
            handshake: None,
            data: Vec::new(),
            offset: total,
            finish: true,
        }
    }

    /// Attach handshake fields to this frame.
    #[must_use]
    pub fn with_handshake(mut self, handshake: Option<Handshake>) -> Self {
        self.handshake = handshake;
        self
    }
}

/// Conversion between a concrete wire frame and [`FrameParts`].
pub trait Frame: Send + Sized + 'static {
    /// Build a wire frame from its parts.
    fn from_parts(parts: FrameParts) -> Self;

    /// Break a wire frame into its parts.
    fn into_parts(self) -> FrameParts;
}

/// Client-to-server attach frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachRequest {
    /// Container id, set on the first frame only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Whether stdin is forwarded, set on the first frame only.
    #[serde(default)]
    pub std_in: bool,
    /// Payload bytes.
    #[serde(default, with = "payload", skip_serializing_if = "Vec::is_empty")]
    pub data_to_write: Vec<u8>,
    /// Offset of the payload, or the total on the finishing frame.
    #[serde(default)]
    pub write_offset: i64,
    /// Marks the client's final frame.
    #[serde(default)]
    pub finish_write: bool,
}

impl Frame for AttachRequest {
    fn from_parts(parts: FrameParts) -> Self {
        let (id, std_in) = parts
            .handshake
            .map(|handshake| (handshake.container_id, handshake.stdin))
            .unwrap_or_default();
        Self {
            id,
            std_in,
            data_to_write: parts.data,
            write_offset: parts.offset,
            finish_write: parts.finish,
        }
    }

    fn into_parts(self) -> FrameParts {
        let handshake = if self.id.is_empty() {
            None
        } else {
            Some(Handshake::new(self.id, self.std_in))
        };
        FrameParts {
            handshake,
            data: self.data_to_write,
            offset: self.write_offset,
            finish: self.finish_write,
        }
    }
}

/// Server-to-client attach frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachResponse {
    /// Container id, set on the first frame only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Echo of the client's stdin flag, set on the first frame only.
    #[serde(default)]
    pub std_in: bool,
    /// Payload bytes (container stdout and stderr).
    #[serde(default, with = "payload", skip_serializing_if = "Vec::is_empty")]
    pub read_data: Vec<u8>,
    /// Total byte count on the server's completion marker, or the bytes
    /// received from the client on the acknowledgement of its finish frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_committed_size: Option<i64>,
}

impl Frame for AttachResponse {
    fn from_parts(parts: FrameParts) -> Self {
        let (id, std_in) = parts
            .handshake
            .map(|handshake| (handshake.container_id, handshake.stdin))
            .unwrap_or_default();
        Self {
            id,
            std_in,
            read_data: parts.data,
            write_committed_size: parts.finish.then_some(parts.offset),
        }
    }

    fn into_parts(self) -> FrameParts {
        let handshake = if self.id.is_empty() {
            None
        } else {
            Some(Handshake::new(self.id, self.std_in))
        };
        FrameParts {
            handshake,
            data: self.read_data,
            offset: self.write_committed_size.unwrap_or_default(),
            finish: self.write_committed_size.is_some(),
        }
    }
}
