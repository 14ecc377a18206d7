//! # Protocol Layer
//!
//! Everything above the byte stream: which opcodes exist at which version,
//! how each one is laid out, how two peers agree on a version, and where
//! decoded messages go.
//!
//! ## Components
//! - **Opcode**: directions, opcode values, lifecycle
//! - **Registry**: versioned opcode table with per-version shapes
//! - **Message**: typed messages per direction, plus the retired set
//! - **Codec**: message encode/decode at a protocol version
//! - **Handshake**: version negotiation state machines
//! - **Session**: per-connection gating around the handshake
//! - **Dispatcher**: opcode routing to handlers

pub mod codec;
pub mod dispatcher;
pub mod handshake;
pub mod message;
pub mod opcode;
pub mod registry;
pub mod session;
