//! # Core Wire Components
//!
//! Byte-level encodings below the message layer.
//!
//! ## Components
//! - **Field**: primitive field encodings and bounds-checked reading
//! - **Packet**: stream preamble and length-prefixed frames
//! - **Codec**: `tokio-util` codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [PROTOCOL_ID(4)] { [Length(4)] [Opcode(2)] [Fields(N)] }*
//! ```
//!
//! ## Security
//! - Frame lengths are bounded by the configured maximum (16MB by default)
//! - The protocol id is checked before any opcode is parsed
//! - Every length prefix is checked against the remaining input before allocation

pub mod codec;
pub mod field;
pub mod packet;
