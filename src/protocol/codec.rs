//! # Message Codec
//!
//! Converts typed [`Message`]s to and from payload bytes at a given protocol
//! version. A payload is a big-endian `u16` opcode followed by the fields of
//! the opcode's version-appropriate shape, in order.
//!
//! Decoding is strict on missing bytes and lenient on extra ones: a short
//! payload fails with [`ProtocolError::TruncatedMessage`], while bytes past
//! the last known field are ignored so newer peers may append fields.
//!
//! Encoding refuses any opcode that is not active at the version, including
//! retired ones. That is always a bug in the sender.

use crate::core::field::{decode_field, encode_field, FieldReader, FieldValue};
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;
use crate::protocol::opcode::{Direction, Lifecycle, Opcode, ProtocolVersion};
use crate::protocol::registry::registry;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{error, trace};

/// Size of the opcode header.
pub const OPCODE_SIZE: usize = 2;

/// Encode `msg` as spoken at `version`.
///
/// # Errors
/// - `UnsupportedOpcode` if the opcode is not active at `version`
/// - `MissingField` if a field present at `version` was left `None`
/// - `FieldMismatch` if a value would not decode back as itself
/// - `InvalidLength` if a string or list does not fit its prefix
pub fn encode(msg: &Message, version: ProtocolVersion) -> Result<Bytes> {
    let opcode = msg.opcode();
    let unsupported = |name: &str| ProtocolError::UnsupportedOpcode {
        opcode,
        name: name.to_string(),
        version,
    };

    let entry = msg.entry().ok_or_else(|| unsupported("Unknown"))?;
    let lifecycle = entry.lifecycle(version);
    if lifecycle != Lifecycle::Active {
        error!(
            opcode = %opcode,
            name = entry.name,
            version,
            ?lifecycle,
            "refusing to encode an opcode that is not active"
        );
        return Err(unsupported(entry.name));
    }
    let shape = entry.shape(version).ok_or_else(|| unsupported(entry.name))?;

    msg.check()?;
    let values = msg.to_fields();
    if values.len() != shape.fields.len() {
        return Err(ProtocolError::FieldMismatch { field: entry.name });
    }

    let mut out = BytesMut::with_capacity(OPCODE_SIZE + shape.min_size());
    out.put_u16(opcode.0);
    for ((def, present), value) in shape.iter().zip(&values) {
        if !present {
            continue;
        }
        if *value == FieldValue::Absent {
            return Err(ProtocolError::MissingField {
                field: def.name,
                version,
            });
        }
        encode_field(&mut out, &def.kind, value).map_err(|e| match e {
            ProtocolError::FieldMismatch { .. } => ProtocolError::FieldMismatch { field: def.name },
            other => other,
        })?;
    }
    Ok(out.freeze())
}

/// Decode a payload travelling in `direction` at `version`.
///
/// # Errors
/// - `TruncatedMessage` if the payload ends inside a field
/// - `InvalidLength` if a length prefix overruns the payload
/// - `UnknownOpcode` if no entry is valid at `version`
pub fn decode(bytes: &[u8], direction: Direction, version: ProtocolVersion) -> Result<Message> {
    let mut reader = FieldReader::new(bytes);
    let opcode = Opcode(reader.read_u16()?);

    let unknown = ProtocolError::UnknownOpcode {
        direction,
        opcode,
        version,
    };
    let entry = registry().lookup(direction, opcode, version).ok_or(unknown)?;
    let shape = entry.shape(version).ok_or(ProtocolError::UnknownOpcode {
        direction,
        opcode,
        version,
    })?;

    let mut values = Vec::with_capacity(shape.fields.len());
    for (def, present) in shape.iter() {
        if present {
            values.push(decode_field(&mut reader, &def.kind)?);
        } else {
            values.push(FieldValue::Absent);
        }
    }

    if reader.remaining() > 0 {
        trace!(
            opcode = %opcode,
            name = entry.name,
            trailing = reader.remaining(),
            "ignoring trailing bytes"
        );
    }

    Message::from_fields(entry, values, version)
}

/// Read the opcode without decoding the payload.
pub fn peek_opcode(bytes: &[u8]) -> Result<Opcode> {
    Ok(Opcode(FieldReader::new(bytes).read_u16()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::WireStr;
    use crate::protocol::message::{HudStat, LegacyMessage, ToClientMessage, ToServerMessage};

    fn player_pos(keys: Option<u32>) -> Message {
        ToServerMessage::PlayerPos {
            pos: [1.5, -2.25, 100.0],
            speed: [0.0, 0.01, -3.0],
            pitch: 45.0,
            yaw: -90.5,
            keys_pressed: keys,
        }
        .into()
    }

    #[test]
    fn test_opcode_is_first_two_bytes() {
        let bytes = encode(&ToClientMessage::Hp { hp: 17 }.into(), 23).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x33, 17]);
        assert_eq!(peek_opcode(&bytes).unwrap(), Opcode(0x33));
    }

    #[test]
    fn test_player_pos_uses_scale_100() {
        let bytes = encode(&player_pos(Some(3)), 23).unwrap();
        // x = 1.5 * 100
        assert_eq!(&bytes[2..6], &150i32.to_be_bytes());
        assert_eq!(bytes.len(), 2 + 12 + 12 + 4 + 4 + 4);
        assert_eq!(decode(&bytes, Direction::ToServer, 23).unwrap(), player_pos(Some(3)));
    }

    #[test]
    fn test_version_dependent_field() {
        let old = encode(&player_pos(None), 13).unwrap();
        assert_eq!(old.len(), 2 + 12 + 12 + 4 + 4);
        assert_eq!(decode(&old, Direction::ToServer, 13).unwrap(), player_pos(None));

        let err = encode(&player_pos(None), 14).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MissingField { field: "keys_pressed", version: 14 }
        ));
    }

    #[test]
    fn test_optional_field_ignored_below_its_version() {
        // A value supplied for a field the version does not carry is not sent.
        let bytes = encode(&player_pos(Some(9)), 13).unwrap();
        assert_eq!(decode(&bytes, Direction::ToServer, 13).unwrap(), player_pos(None));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = encode(&ToClientMessage::Breath { breath: 5 }.into(), 23).unwrap().to_vec();
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            decode(&bytes, Direction::ToClient, 23).unwrap(),
            Message::from(ToClientMessage::Breath { breath: 5 })
        );
    }

    #[test]
    fn test_unknown_and_unintroduced_opcodes() {
        let err = decode(&[0x7f, 0x00], Direction::ToClient, 23).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownOpcode { opcode: Opcode(0x7f00), .. }));

        // Animations arrived in version 23.
        let bytes = encode(
            &ToClientMessage::Animations(Default::default()).into(),
            23,
        )
        .unwrap();
        assert!(matches!(
            decode(&bytes, Direction::ToClient, 22),
            Err(ProtocolError::UnknownOpcode { version: 22, .. })
        ));
        assert!(matches!(
            encode(&ToClientMessage::Animations(Default::default()).into(), 22),
            Err(ProtocolError::UnsupportedOpcode { version: 22, .. })
        ));
    }

    #[test]
    fn test_legacy_only_below_cutover() {
        let msg: Message = LegacyMessage::GroundAction {
            action: 2,
            under: [1, 2, 3],
            above: [1, 3, 3],
            item: 7,
        }
        .into();
        let bytes = encode(&msg, 3).unwrap();
        assert_eq!(decode(&bytes, Direction::ToServer, 3).unwrap(), msg);

        let err = encode(&msg, 4).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedOpcode { ref name, .. } if name == "GroundAction"));
        assert!(matches!(
            decode(&bytes, Direction::ToServer, 23),
            Err(ProtocolError::UnknownOpcode { .. })
        ));
    }

    #[test]
    fn test_direction_selects_namespace() {
        let bytes = encode(&ToServerMessage::ChatMessage { text: WireStr::new() }.into(), 23).unwrap();
        assert_eq!(peek_opcode(&bytes).unwrap(), Opcode(0x32));
        // From the server, 0x32 is ActiveObjectMessages; the empty string reads as an empty list.
        let as_client = decode(&bytes, Direction::ToClient, 23).unwrap();
        assert_eq!(as_client.opcode(), Opcode(0x32));
        assert!(matches!(as_client, Message::ToClient(ToClientMessage::ActiveObjectMessages { .. })));
    }

    #[test]
    fn test_hud_change_payloads() {
        let msg: Message = ToClientMessage::HudChange {
            id: 4,
            stat: HudStat::Name("clock".into()),
        }
        .into();
        let bytes = encode(&msg, 20).unwrap();
        assert_eq!(&bytes[6..], &[1, 0, 0, 0, 5, b'c', b'l', b'o', b'c', b'k']);
        assert_eq!(decode(&bytes, Direction::ToClient, 20).unwrap(), msg);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = encode(&ToClientMessage::TimeOfDay { time: 6000, speed: 72.0 }.into(), 23).unwrap();
        let err = decode(&bytes[..bytes.len() - 1], Direction::ToClient, 23).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedMessage { needed: 4, remaining: 3 }));
        assert!(matches!(
            decode(&[0x00], Direction::ToClient, 23),
            Err(ProtocolError::TruncatedMessage { .. })
        ));
    }
}
