//! # Error Types
//!
//! Error handling for the voxel-world wire protocol.
//!
//! This module defines every error that can occur while framing, decoding,
//! encoding or negotiating a session, and classifies which of them end the
//! session and which only cost a single message.
//!
//! ## Error Categories
//! - **Field errors**: truncated buffers, hostile length prefixes
//! - **Opcode errors**: unknown opcodes on decode, unsupported opcodes on encode
//! - **Handshake errors**: incompatible version ranges, access denied, premature traffic
//! - **Transport errors**: lost framing, foreign protocol id, closed connection
//! - **Configuration errors**: invalid ranges or limits
//!
//! ## Propagation
//! Field and message level decode errors are local to one message: the caller
//! drops the message and keeps the session. Everything reported as
//! [`ProtocolError::is_fatal`] terminates the session; there is no retry at
//! this layer.
//!
//! ## Example Usage
//! ```rust
//! use voxel_protocol::error::ProtocolError;
//! use voxel_protocol::protocol::codec::decode;
//! use voxel_protocol::protocol::opcode::Direction;
//!
//! // Opcode 0x0029 (TimeOfDay) but the payload stops after one byte.
//! let bytes = [0x00, 0x29, 0x5d];
//! match decode(&bytes, Direction::ToClient, 23) {
//!     Err(e @ ProtocolError::TruncatedMessage { .. }) => assert!(!e.is_fatal()),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::protocol::opcode::{Direction, Opcode, ProtocolVersion};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Framing errors
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds maximum size";
    pub const ERR_TRAILING_PREAMBLE: &str = "Stream ended inside the protocol preamble";

    /// Handshake-specific errors
    pub const ERR_HANDSHAKE_STARTED: &str = "Handshake already started";
    pub const ERR_HANDSHAKE_TIMEOUT: &str = "Handshake timed out";
    pub const ERR_VERSION_OUTSIDE_RANGE: &str = "Server chose a version outside the advertised range";
    pub const ERR_EMPTY_NAME: &str = "Empty name";
    pub const ERR_NAME_TOO_LONG: &str = "Name too long";
    pub const ERR_NAME_CHARSET: &str = "Name contains unallowed characters";
    pub const ERR_PASSWORD_TOO_LONG: &str = "Password too long";

    /// Access denied reasons sent to the peer
    pub const DENY_WRONG_VERSION: &str = "Your client's version is not supported.";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Buffer ended before a fixed-width field was complete.
    #[error("Truncated message: needed {needed} bytes, {remaining} remaining")]
    TruncatedMessage { needed: usize, remaining: usize },

    /// A length or count prefix claims more data than the buffer holds.
    #[error("Invalid length prefix: claimed {claimed} bytes, {remaining} remaining")]
    InvalidLength { claimed: usize, remaining: usize },

    #[error("Unknown opcode {opcode} from {direction} at protocol version {version}")]
    UnknownOpcode {
        direction: Direction,
        opcode: Opcode,
        version: ProtocolVersion,
    },

    /// Encoding an opcode that is not active at the negotiated version.
    #[error("Opcode {opcode} ({name}) is not active at protocol version {version}")]
    UnsupportedOpcode {
        opcode: Opcode,
        name: String,
        version: ProtocolVersion,
    },

    #[error("Field '{field}' is required at protocol version {version}")]
    MissingField {
        field: &'static str,
        version: ProtocolVersion,
    },

    #[error("Field '{field}' does not match its wire kind")]
    FieldMismatch { field: &'static str },

    #[error("No compatible protocol version: client {client_min}..={client_max}, server {server_min}..={server_max}")]
    IncompatibleVersion {
        client_min: ProtocolVersion,
        client_max: ProtocolVersion,
        server_min: ProtocolVersion,
        server_max: ProtocolVersion,
    },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Opcode {opcode} received before the handshake completed")]
    PrematureMessage { opcode: Opcode },

    #[error("Unexpected message type during handshake")]
    UnexpectedMessage,

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Framing lost: {0}")]
    FramingLost(String),

    #[error("Foreign protocol id: {0:#010x}")]
    ProtocolMismatch(u32),

    #[error("Session closed")]
    SessionClosed,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error must end the session.
    ///
    /// Decode errors scoped to a single message (`TruncatedMessage`,
    /// `InvalidLength`, `UnknownOpcode`) leave the session usable as long as
    /// framing is intact. Local encode errors are reported to the caller and
    /// do not touch session state either.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::TruncatedMessage { .. }
                | ProtocolError::InvalidLength { .. }
                | ProtocolError::UnknownOpcode { .. }
                | ProtocolError::UnsupportedOpcode { .. }
                | ProtocolError::MissingField { .. }
                | ProtocolError::FieldMismatch { .. }
                | ProtocolError::Custom(_)
        )
    }

    /// Input that looks deliberately corrupt rather than merely old or new.
    pub fn is_hostile(&self) -> bool {
        matches!(self, ProtocolError::InvalidLength { .. })
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
