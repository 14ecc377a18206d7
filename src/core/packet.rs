//! Stream frames.
//!
//! Each side opens the stream with the 32-bit protocol id, then sends frames:
//!
//! ```text
//! [PROTOCOL_ID(4)]  once per stream and direction
//! [Length(4)] [Payload(N)]  per message
//! ```
//!
//! A payload holds exactly one message: its opcode and fields.

use crate::config::{MAX_FRAME_SIZE, PROTOCOL_ID};
use crate::error::{constants, ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the length prefix.
pub const HEADER_SIZE: usize = 4;
/// Size of the stream preamble.
pub const PREAMBLE_SIZE: usize = 4;

/// One framed message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub payload: Bytes,
}

impl Packet {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Frame header plus payload, without the stream preamble.
    ///
    /// # Errors
    /// `InvalidLength` if the payload does not fit the `u32` length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let len = length_prefix(self.payload.len())?;
        let mut out = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        out.put_u32(len);
        out.put_slice(&self.payload);
        Ok(out.to_vec())
    }

    /// Parse exactly one frame.
    ///
    /// # Errors
    /// - `TruncatedMessage` if the header or payload is incomplete
    /// - `FramingLost` if the length exceeds [`MAX_FRAME_SIZE`]
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::TruncatedMessage {
                needed: HEADER_SIZE,
                remaining: buf.len(),
            });
        }
        let len = frame_length(buf, MAX_FRAME_SIZE)?;
        let body = &buf[HEADER_SIZE..];
        if body.len() < len {
            return Err(ProtocolError::TruncatedMessage {
                needed: len,
                remaining: body.len(),
            });
        }
        Ok(Self::new(Bytes::copy_from_slice(&body[..len])))
    }
}

/// Payload length as written in the frame header.
pub(crate) fn length_prefix(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ProtocolError::InvalidLength {
        claimed: len,
        remaining: u32::MAX as usize,
    })
}

/// Read and bound the length prefix at the start of `buf`.
pub(crate) fn frame_length(buf: &[u8], max_frame_size: usize) -> Result<usize> {
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > max_frame_size {
        return Err(ProtocolError::FramingLost(format!(
            "{}: {len} > {max_frame_size}",
            constants::ERR_OVERSIZED_FRAME
        )));
    }
    Ok(len)
}

pub fn write_preamble(out: &mut BytesMut) {
    out.put_u32(PROTOCOL_ID);
}

/// Verify the stream preamble.
///
/// # Errors
/// `ProtocolMismatch` carrying the id the peer sent.
pub fn check_preamble(buf: &[u8; PREAMBLE_SIZE]) -> Result<()> {
    let id = u32::from_be_bytes(*buf);
    if id != PROTOCOL_ID {
        return Err(ProtocolError::ProtocolMismatch(id));
    }
    Ok(())
}
