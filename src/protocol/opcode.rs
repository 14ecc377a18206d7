//! Opcode space.
//!
//! Every message starts with a big-endian `u16` opcode. Opcode values are only
//! unique within one [`Direction`]: `0x10` is `Init` both ways, with unrelated
//! payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Negotiated or advertised protocol version.
pub type ProtocolVersion = u16;

/// Traffic direction. Selects the opcode namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Client → server.
    ToServer,
    /// Server → client.
    ToClient,
}

impl Direction {
    /// The direction traffic flows back in.
    pub fn reverse(self) -> Self {
        match self {
            Direction::ToServer => Direction::ToClient,
            Direction::ToClient => Direction::ToServer,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToServer => f.write_str("client"),
            Direction::ToClient => f.write_str("server"),
        }
    }
}

/// Wire tag identifying a message shape within one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(pub u16);

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u16> for Opcode {
    fn from(value: u16) -> Self {
        Opcode(value)
    }
}

/// Where an opcode stands at one particular protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Added by a later version than the one asked about.
    Unintroduced,
    Active,
    /// Retired; conformant senders at this version must not emit it.
    Obsolete,
}

/// Server → client opcodes.
pub mod to_client {
    use super::Opcode;

    pub const INIT: Opcode = Opcode(0x10);
    pub const BLOCKDATA: Opcode = Opcode(0x20);
    pub const ADDNODE: Opcode = Opcode(0x21);
    pub const REMOVENODE: Opcode = Opcode(0x22);
    pub const INVENTORY: Opcode = Opcode(0x27);
    pub const TIME_OF_DAY: Opcode = Opcode(0x29);
    pub const CHAT_MESSAGE: Opcode = Opcode(0x30);
    pub const ACTIVE_OBJECT_REMOVE_ADD: Opcode = Opcode(0x31);
    pub const ACTIVE_OBJECT_MESSAGES: Opcode = Opcode(0x32);
    pub const HP: Opcode = Opcode(0x33);
    pub const MOVE_PLAYER: Opcode = Opcode(0x34);
    pub const ACCESS_DENIED: Opcode = Opcode(0x35);
    pub const DEATHSCREEN: Opcode = Opcode(0x37);
    pub const MEDIA: Opcode = Opcode(0x38);
    pub const NODEDEF: Opcode = Opcode(0x3a);
    pub const ANNOUNCE_MEDIA: Opcode = Opcode(0x3c);
    pub const ITEMDEF: Opcode = Opcode(0x3d);
    pub const PLAY_SOUND: Opcode = Opcode(0x3f);
    pub const STOP_SOUND: Opcode = Opcode(0x40);
    pub const PRIVILEGES: Opcode = Opcode(0x41);
    pub const INVENTORY_FORMSPEC: Opcode = Opcode(0x42);
    pub const DETACHED_INVENTORY: Opcode = Opcode(0x43);
    pub const SHOW_FORMSPEC: Opcode = Opcode(0x44);
    pub const MOVEMENT: Opcode = Opcode(0x45);
    pub const SPAWN_PARTICLE: Opcode = Opcode(0x46);
    pub const ADD_PARTICLESPAWNER: Opcode = Opcode(0x47);
    pub const DELETE_PARTICLESPAWNER: Opcode = Opcode(0x48);
    pub const HUDADD: Opcode = Opcode(0x49);
    pub const HUDRM: Opcode = Opcode(0x4a);
    pub const HUDCHANGE: Opcode = Opcode(0x4b);
    pub const HUD_SET_FLAGS: Opcode = Opcode(0x4c);
    pub const HUD_SET_PARAM: Opcode = Opcode(0x4d);
    pub const BREATH: Opcode = Opcode(0x4e);
    pub const ANIMATIONS: Opcode = Opcode(0x4f);
}

/// Client → server opcodes.
pub mod to_server {
    use super::Opcode;

    pub const INIT: Opcode = Opcode(0x10);
    /// Acknowledges the server's init; the server may send data afterwards.
    pub const INIT2: Opcode = Opcode(0x11);
    pub const PLAYERPOS: Opcode = Opcode(0x23);
    pub const GOTBLOCKS: Opcode = Opcode(0x24);
    pub const DELETEDBLOCKS: Opcode = Opcode(0x25);
    pub const INVENTORY_ACTION: Opcode = Opcode(0x31);
    pub const CHAT_MESSAGE: Opcode = Opcode(0x32);
    pub const DAMAGE: Opcode = Opcode(0x35);
    pub const PASSWORD: Opcode = Opcode(0x36);
    pub const PLAYERITEM: Opcode = Opcode(0x37);
    pub const RESPAWN: Opcode = Opcode(0x38);
    pub const INTERACT: Opcode = Opcode(0x39);
    pub const REMOVED_SOUNDS: Opcode = Opcode(0x3a);
    pub const NODEMETA_FIELDS: Opcode = Opcode(0x3b);
    pub const INVENTORY_FIELDS: Opcode = Opcode(0x3c);
    pub const REQUEST_MEDIA: Opcode = Opcode(0x40);
    pub const RECEIVED_MEDIA: Opcode = Opcode(0x41);
    pub const BREATH: Opcode = Opcode(0x42);
}

/// Retired client → server opcodes. Decodable only below their cutover.
pub mod legacy {
    use super::Opcode;

    pub const GETBLOCK: Opcode = Opcode(0x20);
    pub const ADDNODE: Opcode = Opcode(0x21);
    pub const REMOVENODE: Opcode = Opcode(0x22);
    pub const ADDNODE_FROM_INVENTORY: Opcode = Opcode(0x26);
    pub const CLICK_OBJECT: Opcode = Opcode(0x27);
    pub const GROUND_ACTION: Opcode = Opcode(0x28);
    pub const RELEASE: Opcode = Opcode(0x29);
    pub const SIGNTEXT: Opcode = Opcode(0x30);
    pub const SIGNNODETEXT: Opcode = Opcode(0x33);
    pub const CLICK_ACTIVEOBJECT: Opcode = Opcode(0x34);
}
