//! `tokio-util` codec for [`Packet`] streams.
//!
//! The decoder expects the peer's preamble before the first frame; the encoder
//! writes ours ahead of the first frame it sends. Partial input is left in
//! the buffer untouched until a whole frame is available.

use crate::config::MAX_FRAME_SIZE;
use crate::core::packet::{
    check_preamble, frame_length, length_prefix, write_preamble, Packet, HEADER_SIZE, PREAMBLE_SIZE,
};
use crate::error::{constants, ProtocolError, Result};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    preamble_seen: bool,
    preamble_sent: bool,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            preamble_seen: false,
            preamble_sent: false,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if !self.preamble_seen {
            if src.len() < PREAMBLE_SIZE {
                return Ok(None);
            }
            let mut id = [0u8; PREAMBLE_SIZE];
            id.copy_from_slice(&src[..PREAMBLE_SIZE]);
            check_preamble(&id)?;
            src.advance(PREAMBLE_SIZE);
            self.preamble_seen = true;
            trace!("peer preamble verified");
        }

        if src.len() < HEADER_SIZE {
            return Ok(None);
        }
        let len = frame_length(src, self.max_frame_size)?;
        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(len).freeze();
        Ok(Some(Packet { payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None if !self.preamble_seen => Err(ProtocolError::FramingLost(
                constants::ERR_TRAILING_PREAMBLE.to_string(),
            )),
            None => Err(ProtocolError::FramingLost(format!(
                "Stream ended inside a frame ({} bytes buffered)",
                src.len()
            ))),
        }
    }
}

impl Encoder<Packet> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        let len = item.payload.len();
        let prefix = match length_prefix(len) {
            Ok(prefix) if len <= self.max_frame_size => prefix,
            _ => {
                return Err(ProtocolError::FramingLost(format!(
                    "{}: {len} > {}",
                    constants::ERR_OVERSIZED_FRAME,
                    self.max_frame_size
                )))
            }
        };

        let preamble = if self.preamble_sent { 0 } else { PREAMBLE_SIZE };
        dst.reserve(preamble + HEADER_SIZE + len);
        if !self.preamble_sent {
            write_preamble(dst);
            self.preamble_sent = true;
        }
        dst.extend_from_slice(&prefix.to_be_bytes());
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}
