//! Integration tests for the stream frame codec
//!
//! These tests check that frames are split out of the read buffer without
//! copying and that partial input is never consumed early.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use voxel_protocol::config::PROTOCOL_ID;
use voxel_protocol::core::codec::FrameCodec;
use voxel_protocol::core::packet::{Packet, HEADER_SIZE, PREAMBLE_SIZE};
use voxel_protocol::protocol::codec::encode;
use voxel_protocol::{ProtocolError, ToClientMessage};

fn encoded(payloads: &[Vec<u8>]) -> BytesMut {
    let mut codec = FrameCodec::default();
    let mut buffer = BytesMut::new();
    for payload in payloads {
        codec.encode(Packet::new(payload.clone()), &mut buffer).expect("encode");
    }
    buffer
}

#[test]
fn test_codec_decode_zero_copy_split() {
    let mut buffer = encoded(&[vec![1, 2, 3, 4, 5]]);
    let payload_ptr = buffer[PREAMBLE_SIZE + HEADER_SIZE..].as_ptr();

    let mut codec = FrameCodec::default();
    let packet = codec.decode(&mut buffer).expect("decode").expect("frame");

    assert_eq!(packet.payload.as_ref(), &[1, 2, 3, 4, 5]);
    // The payload is a view into the read buffer, not a copy.
    assert_eq!(packet.payload.as_ptr(), payload_ptr);
    assert!(buffer.is_empty());
}

#[test]
fn test_codec_partial_decode_preserves_buffer() {
    let mut codec = FrameCodec::default();

    // Preamble plus three bytes of the length prefix.
    let mut buffer = BytesMut::new();
    buffer.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
    buffer.extend_from_slice(&[0, 0, 0]);

    assert!(codec.decode(&mut buffer).expect("no error").is_none());
    // The preamble is consumed once verified; the partial header stays.
    assert_eq!(buffer.len(), 3);
}

#[test]
fn test_codec_byte_at_a_time() {
    let full = encoded(&[vec![9; 40], vec![], vec![7]]);
    let mut codec = FrameCodec::default();
    let mut buffer = BytesMut::new();
    let mut frames = Vec::new();

    for byte in full.iter() {
        buffer.extend_from_slice(&[*byte]);
        while let Some(packet) = codec.decode(&mut buffer).expect("decode") {
            frames.push(packet.payload.len());
        }
    }
    assert_eq!(frames, vec![40, 0, 1]);
}

#[test]
fn test_codec_carries_message_payloads() {
    let payload = encode(&ToClientMessage::Hp { hp: 9 }.into(), 23).unwrap();
    let mut codec = FrameCodec::default();
    let mut buffer = BytesMut::new();
    codec.encode(Packet::new(payload.clone()), &mut buffer).unwrap();

    assert_eq!(buffer.len(), PREAMBLE_SIZE + HEADER_SIZE + payload.len());
    let packet = FrameCodec::default().decode(&mut buffer).unwrap().unwrap();
    assert_eq!(packet.payload, payload);
}

#[test]
fn test_codec_encode_large_payload() {
    let payload = vec![0xAB; 1024 * 1024];
    let mut buffer = encoded(&[payload]);
    assert_eq!(buffer.len(), PREAMBLE_SIZE + HEADER_SIZE + 1024 * 1024);

    let packet = FrameCodec::default().decode(&mut buffer).unwrap().unwrap();
    assert_eq!(packet.payload.len(), 1024 * 1024);
    assert_eq!(packet.payload[0], 0xAB);
}

#[test]
fn test_codec_configured_limit() {
    let mut codec = FrameCodec::new(1024);
    assert_eq!(codec.max_frame_size(), 1024);

    let mut buffer = BytesMut::new();
    assert!(codec.encode(Packet::new(vec![0; 1024]), &mut buffer).is_ok());
    assert!(matches!(
        codec.encode(Packet::new(vec![0; 1025]), &mut buffer),
        Err(ProtocolError::FramingLost(_))
    ));

    let mut decoder = FrameCodec::new(1023);
    assert!(matches!(decoder.decode(&mut buffer), Err(ProtocolError::FramingLost(_))));
}

#[test]
fn test_codec_rejects_foreign_stream() {
    let mut codec = FrameCodec::default();
    let mut buffer = BytesMut::from(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0][..]);
    assert!(matches!(
        codec.decode(&mut buffer),
        Err(ProtocolError::ProtocolMismatch(0xdead_beef))
    ));
}

#[test]
fn test_packet_from_bytes_matches_codec() {
    let bytes = Packet::new(vec![1, 2, 3]).to_bytes().unwrap();
    assert_eq!(bytes.len(), HEADER_SIZE + 3);
    assert_eq!(Packet::from_bytes(&bytes).unwrap().payload.as_ref(), &[1, 2, 3]);
}
