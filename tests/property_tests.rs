//! Property-based tests using proptest
//!
//! These tests check codec and negotiation invariants across a wide range of
//! randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};
use voxel_protocol::core::codec::FrameCodec;
use voxel_protocol::core::packet::Packet;
use voxel_protocol::protocol::codec::{decode, encode};
use voxel_protocol::protocol::handshake::negotiate_version;
use voxel_protocol::{Direction, Message, ProtocolError, ToClientMessage, ToServerMessage, VersionRange};

/// A float that survives fixed-point encoding at `scale` unchanged.
fn fixed(scale: f64) -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000).prop_map(move |n| (f64::from(n) / scale) as f32)
}

fn fixed_v3(scale: f64) -> impl Strategy<Value = [f32; 3]> {
    [fixed(scale), fixed(scale), fixed(scale)]
}

fn range() -> impl Strategy<Value = VersionRange> {
    (1u16..40, 0u16..20).prop_map(|(min, width)| VersionRange { min, max: min + width })
}

// Property: PlayerPos survives a round trip at every supported version
proptest! {
    #[test]
    fn prop_player_pos_roundtrip(
        version in 13u16..=23,
        pos in fixed_v3(100.0),
        speed in fixed_v3(100.0),
        pitch in fixed(100.0),
        yaw in fixed(100.0),
        keys in any::<u32>(),
    ) {
        let keys_pressed = (version >= 14).then_some(keys);
        let msg = Message::from(ToServerMessage::PlayerPos { pos, speed, pitch, yaw, keys_pressed });
        let bytes = encode(&msg, version).expect("encode");
        prop_assert_eq!(bytes.len(), if version >= 14 { 2 + 36 } else { 2 + 32 });
        let decoded = decode(&bytes, Direction::ToServer, version).expect("decode");
        prop_assert_eq!(decoded, msg);
    }
}

// Property: chat text is carried byte for byte
proptest! {
    #[test]
    fn prop_chat_roundtrip(text in "[ -~]{0,300}", version in 13u16..=23) {
        let msg = Message::from(ToClientMessage::ChatMessage { text: text.into() });
        let bytes = encode(&msg, version).unwrap();
        prop_assert_eq!(decode(&bytes, Direction::ToClient, version).unwrap(), msg);
    }
}

// Property: every strict prefix of a valid payload fails to decode
proptest! {
    #[test]
    fn prop_prefixes_are_truncated(
        node in prop::collection::vec(any::<u8>(), 0..64),
        cut in any::<prop::sample::Index>(),
    ) {
        let msg = Message::from(ToClientMessage::AddNode {
            pos: [1, -2, 3],
            node,
            keep_metadata: Some(true),
        });
        let bytes = encode(&msg, 23).unwrap();
        let cut = cut.index(bytes.len());
        let result = decode(&bytes[..cut], Direction::ToClient, 23);
        let is_truncation_error = matches!(
            result,
            Err(ProtocolError::TruncatedMessage { .. }) | Err(ProtocolError::InvalidLength { .. })
        );
        prop_assert!(is_truncation_error);
    }
}

// Property: decoding arbitrary bytes never panics
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(
        data in prop::collection::vec(any::<u8>(), 0..512),
        version in 0u16..32,
        to_server in any::<bool>(),
    ) {
        let direction = if to_server { Direction::ToServer } else { Direction::ToClient };
        let _ = decode(&data, direction, version);
    }
}

// Property: decoding arbitrary bytes behind a known opcode never panics
proptest! {
    #[test]
    fn prop_decode_known_opcode_garbage(
        opcode in 0x10u16..0x50,
        body in prop::collection::vec(any::<u8>(), 0..256),
        version in 1u16..=23,
    ) {
        let mut data = opcode.to_be_bytes().to_vec();
        data.extend(body);
        for direction in [Direction::ToServer, Direction::ToClient] {
            if let Ok(msg) = decode(&data, direction, version) {
                prop_assert_eq!(msg.direction(), direction);
                prop_assert_eq!(msg.opcode().0, opcode);
            }
        }
    }
}

// Property: negotiation picks the highest common version or fails when there is none
proptest! {
    #[test]
    fn prop_negotiation(client in range(), server in range()) {
        match negotiate_version(client, server) {
            Ok(v) => {
                prop_assert!(client.contains(v) && server.contains(v));
                prop_assert!(!client.contains(v + 1) || !server.contains(v + 1));
            }
            Err(_) => prop_assert!((client.min..=client.max).all(|v| !server.contains(v))),
        }
    }
}

// Property: frames survive the stream codec in any number
proptest! {
    #[test]
    fn prop_frame_codec_roundtrip(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 1..8),
    ) {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        for payload in &payloads {
            codec.encode(Packet::new(payload.clone()), &mut buf).unwrap();
        }

        let mut decoder = FrameCodec::default();
        for payload in &payloads {
            let packet = decoder.decode(&mut buf).unwrap().expect("frame");
            prop_assert_eq!(packet.payload.as_ref(), payload.as_slice());
        }
        prop_assert!(buf.is_empty());
    }
}
