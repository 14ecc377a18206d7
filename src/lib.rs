//! # voxel-protocol
//!
//! Wire codec and version negotiation for a voxel-world client/server
//! protocol.
//!
//! Every message is a big-endian `u16` opcode followed by a fixed sequence of
//! typed fields. Which opcodes exist, and which fields each one carries,
//! depends on the protocol version the two peers negotiated during the
//! handshake. This crate owns that table and everything that reads or writes
//! it.
//!
//! ## Layers
//! - [`core`]: field encodings, stream framing, `tokio-util` codec
//! - [`protocol`]: opcode registry, typed messages, message codec, handshake,
//!   session gating, dispatcher
//! - [`service`]: async connection driver
//! - [`config`], [`error`], [`utils`]: configuration, error taxonomy, logging
//!   and metrics
//!
//! ## Example
//! ```rust
//! use voxel_protocol::protocol::codec;
//! use voxel_protocol::protocol::message::{Message, ToClientMessage};
//! use voxel_protocol::protocol::opcode::Direction;
//!
//! let msg = Message::from(ToClientMessage::TimeOfDay { time: 6000, speed: 72.0 });
//! let bytes = codec::encode(&msg, 23)?;
//! assert_eq!(&bytes[..2], &[0x00, 0x29]);
//! assert_eq!(codec::decode(&bytes, Direction::ToClient, 23)?, msg);
//! # Ok::<(), voxel_protocol::error::ProtocolError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use crate::core::field::WireStr;
pub use error::{ProtocolError, Result};
pub use protocol::dispatcher::{Dispatch, Dispatcher};
pub use protocol::handshake::{ClientIdentity, VersionRange, WorldParams};
pub use protocol::message::{LegacyMessage, Message, ToClientMessage, ToServerMessage};
pub use protocol::opcode::{Direction, Opcode, ProtocolVersion};
pub use protocol::session::{Inbound, Role, Session};
pub use service::Connection;
