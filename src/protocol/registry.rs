//! # Opcode Registry
//!
//! Static table describing every opcode the protocol has ever defined: its
//! direction, the version that introduced it, the version that retired it (if
//! any), whether it belongs to the handshake, and the ordered field layout of
//! its payload.
//!
//! ## Version-dependent shapes
//! Fields carry their own `since` version. [`OpcodeEntry::shape`] returns the
//! layout as spoken at one version, so codec code never branches on version
//! numbers itself.
//!
//! ## Reuse rule
//! An opcode value may appear more than once per direction only if the
//! entries' active windows never overlap. Retired entries stay in the table
//! for auditing; the few whose layout was never documented carry no shape and
//! cannot be encoded or decoded at all.
//!
//! The table is immutable and indexed once, on first use.

use crate::core::field::{FieldKind, LenWidth, F1000};
use crate::protocol::opcode::{legacy, to_client, to_server, Direction, Lifecycle, Opcode, ProtocolVersion};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One field of a payload layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    /// First protocol version carrying this field.
    pub since: ProtocolVersion,
}

/// Registry record for one opcode era.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpcodeEntry {
    pub direction: Direction,
    pub opcode: Opcode,
    pub name: &'static str,
    pub since: ProtocolVersion,
    pub obsoleted_at: Option<ProtocolVersion>,
    /// Allowed before version negotiation has finished.
    pub handshake: bool,
    /// `None` for retired opcodes whose layout was never documented.
    pub fields: Option<&'static [FieldDef]>,
}

/// Payload layout of one entry at one protocol version.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    pub version: ProtocolVersion,
    pub fields: &'static [FieldDef],
}

impl Shape {
    /// Every field with whether it is on the wire at this version.
    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldDef, bool)> + '_ {
        self.fields.iter().map(move |def| (def, def.since <= self.version))
    }

    /// Only the fields on the wire at this version.
    pub fn present(&self) -> impl Iterator<Item = &'static FieldDef> + '_ {
        self.iter().filter_map(|(def, present)| present.then_some(def))
    }

    /// Smallest payload size, opcode excluded.
    pub fn min_size(&self) -> usize {
        self.present().map(|def| def.kind.min_size()).sum()
    }
}

impl OpcodeEntry {
    const fn new(
        direction: Direction,
        opcode: Opcode,
        name: &'static str,
        fields: &'static [FieldDef],
    ) -> Self {
        Self {
            direction,
            opcode,
            name,
            since: 0,
            obsoleted_at: None,
            handshake: false,
            fields: Some(fields),
        }
    }

    const fn undocumented(direction: Direction, opcode: Opcode, name: &'static str) -> Self {
        let mut entry = Self::new(direction, opcode, name, &[]);
        entry.fields = None;
        entry
    }

    const fn since(mut self, version: ProtocolVersion) -> Self {
        self.since = version;
        self
    }

    const fn obsoleted_at(mut self, version: ProtocolVersion) -> Self {
        self.obsoleted_at = Some(version);
        self
    }

    const fn handshake(mut self) -> Self {
        self.handshake = true;
        self
    }

    pub fn lifecycle(&self, version: ProtocolVersion) -> Lifecycle {
        if version < self.since {
            Lifecycle::Unintroduced
        } else if self.obsoleted_at.is_some_and(|cutover| version >= cutover) {
            Lifecycle::Obsolete
        } else {
            Lifecycle::Active
        }
    }

    pub fn is_active(&self, version: ProtocolVersion) -> bool {
        self.lifecycle(version) == Lifecycle::Active
    }

    /// Belongs to the segregated set of retired opcodes.
    pub fn is_retired(&self) -> bool {
        self.obsoleted_at.is_some()
    }

    /// Version-appropriate layout; `None` if it was never documented.
    pub fn shape(&self, version: ProtocolVersion) -> Option<Shape> {
        self.fields.map(|fields| Shape { version, fields })
    }
}

const fn f(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind, since: 0 }
}

const fn since(name: &'static str, kind: FieldKind, version: ProtocolVersion) -> FieldDef {
    FieldDef { name, kind, since: version }
}

const U8: FieldKind = FieldKind::U8;
const BOOL: FieldKind = FieldKind::Bool;
const U16: FieldKind = FieldKind::U16;
const U32: FieldKind = FieldKind::U32;
const F1K: FieldKind = FieldKind::Fixed(F1000);
const V2F1K: FieldKind = FieldKind::FixedV2(F1000);
const V3F1K: FieldKind = FieldKind::FixedV3(F1000);
const V3S16: FieldKind = FieldKind::V3S16;
const STR16: FieldKind = FieldKind::Str(LenWidth::U16);
const STR32: FieldKind = FieldKind::Str(LenWidth::U32);

/// Player names travel as a fixed 20-byte field.
pub const PLAYERNAME_SIZE: usize = 20;
/// Password field width; fits a base64 SHA-1 digest.
pub const PASSWORD_SIZE: usize = 28;

/// HUD stat ids; position-like stats carry a 2D vector, name and text a string.
pub mod hud_stat {
    pub const POS: u8 = 0;
    pub const NAME: u8 = 1;
    pub const SCALE: u8 = 2;
    pub const TEXT: u8 = 3;
    pub const NUMBER: u8 = 4;
    pub const ITEM: u8 = 5;
    pub const DIR: u8 = 6;
    pub const ALIGN: u8 = 7;
    pub const OFFSET: u8 = 8;
}

const HUD_STAT: FieldKind = FieldKind::Switch(
    &[
        (hud_stat::POS, FieldKind::FixedV2(F1000)),
        (hud_stat::NAME, FieldKind::Str(LenWidth::U32)),
        (hud_stat::SCALE, FieldKind::FixedV2(F1000)),
        (hud_stat::TEXT, FieldKind::Str(LenWidth::U32)),
        (hud_stat::ALIGN, FieldKind::FixedV2(F1000)),
        (hud_stat::OFFSET, FieldKind::FixedV2(F1000)),
    ],
    &FieldKind::U32,
);

// ---------------------------------------------------------------------------
// Server → client layouts
// ---------------------------------------------------------------------------

const TC_INIT: &[FieldDef] = &[
    f("deployed", U8),
    f("seed", FieldKind::U64),
    f("step", F1K),
    f("pos", V3F1K),
    f("protocol_version", U16),
];
const TC_BLOCKDATA: &[FieldDef] = &[f("pos", V3S16), f("block", STR32)];
const TC_ADDNODE: &[FieldDef] = &[
    f("pos", V3S16),
    f("node", STR16),
    since("keep_metadata", BOOL, 22),
];
const TC_REMOVENODE: &[FieldDef] = &[f("pos", V3S16)];
const TC_INVENTORY: &[FieldDef] = &[f("data", STR32)];
const TC_TIME_OF_DAY: &[FieldDef] = &[f("time", U16), f("speed", F1K)];
const TC_CHAT_MESSAGE: &[FieldDef] = &[f("text", STR16)];
const TC_AO_REMOVE_ADD: &[FieldDef] = &[
    f("removed", FieldKind::List(LenWidth::U16, &[FieldKind::U16])),
    f(
        "added",
        FieldKind::List(
            LenWidth::U16,
            &[FieldKind::U16, FieldKind::U8, FieldKind::Str(LenWidth::U32)],
        ),
    ),
];
const TC_AO_MESSAGES: &[FieldDef] = &[f(
    "messages",
    FieldKind::List(LenWidth::U16, &[FieldKind::U16, FieldKind::Str(LenWidth::U16)]),
)];
const TC_HP: &[FieldDef] = &[f("hp", U8)];
const TC_MOVE_PLAYER: &[FieldDef] = &[f("pos", V3F1K), f("pitch", F1K), f("yaw", F1K)];
const TC_ACCESS_DENIED: &[FieldDef] = &[f("reason", STR16)];
const TC_DEATHSCREEN: &[FieldDef] = &[f("set_camera_point", BOOL), f("camera_point", V3F1K)];
const TC_MEDIA: &[FieldDef] = &[f(
    "files",
    FieldKind::List(
        LenWidth::U32,
        &[FieldKind::Str(LenWidth::U16), FieldKind::Str(LenWidth::U32)],
    ),
)];
const TC_DEFINITIONS: &[FieldDef] = &[f("definitions", STR32)];
const TC_ANNOUNCE_MEDIA: &[FieldDef] = &[
    f(
        "files",
        FieldKind::List(
            LenWidth::U16,
            &[FieldKind::Str(LenWidth::U16), FieldKind::Str(LenWidth::U16)],
        ),
    ),
    f("remote_server", STR16),
];
const TC_PLAY_SOUND: &[FieldDef] = &[
    f("id", FieldKind::S32),
    f("name", STR16),
    f("gain", F1K),
    f("type", U8),
    f("pos", V3F1K),
    f("object_id", U16),
    f("loop", BOOL),
];
const TC_STOP_SOUND: &[FieldDef] = &[f("id", FieldKind::S32)];
const TC_PRIVILEGES: &[FieldDef] = &[f(
    "privileges",
    FieldKind::List(LenWidth::U16, &[FieldKind::Str(LenWidth::U16)]),
)];
const TC_INVENTORY_FORMSPEC: &[FieldDef] = &[f("formspec", STR32)];
const TC_DETACHED_INVENTORY: &[FieldDef] = &[f("name", STR16), f("data", STR32)];
const TC_SHOW_FORMSPEC: &[FieldDef] = &[f("formspec", STR32), f("formname", STR16)];
const TC_MOVEMENT: &[FieldDef] = &[
    f("acceleration_default", F1K),
    f("acceleration_air", F1K),
    f("acceleration_fast", F1K),
    f("speed_walk", F1K),
    f("speed_crouch", F1K),
    f("speed_fast", F1K),
    f("speed_climb", F1K),
    f("speed_jump", F1K),
    f("liquid_fluidity", F1K),
    f("liquid_fluidity_smooth", F1K),
    f("liquid_sink", F1K),
    f("gravity", F1K),
];
const TC_SPAWN_PARTICLE: &[FieldDef] = &[
    f("pos", V3F1K),
    f("velocity", V3F1K),
    f("acceleration", V3F1K),
    f("expiration_time", F1K),
    f("size", F1K),
    f("collision_detection", BOOL),
    f("vertical", BOOL),
    f("texture", STR32),
];
const TC_ADD_PARTICLESPAWNER: &[FieldDef] = &[
    f("amount", U16),
    f("spawn_time", F1K),
    f("min_pos", V3F1K),
    f("max_pos", V3F1K),
    f("min_vel", V3F1K),
    f("max_vel", V3F1K),
    f("min_acc", V3F1K),
    f("max_acc", V3F1K),
    f("min_exp_time", F1K),
    f("max_exp_time", F1K),
    f("min_size", F1K),
    f("max_size", F1K),
    f("collision_detection", BOOL),
    f("vertical", BOOL),
    f("texture", STR32),
    f("id", U32),
];
const TC_ID32: &[FieldDef] = &[f("id", U32)];
const TC_HUDADD: &[FieldDef] = &[
    f("id", U32),
    f("type", U8),
    f("pos", V2F1K),
    f("name", STR32),
    f("scale", V2F1K),
    f("text", STR32),
    f("number", U32),
    f("item", U32),
    f("dir", U32),
    f("align", V2F1K),
    f("offset", V2F1K),
];
const TC_HUDCHANGE: &[FieldDef] = &[f("id", U32), f("stat", HUD_STAT)];
const TC_HUD_SET_FLAGS: &[FieldDef] = &[f("flags", U32), f("mask", U32)];
const TC_HUD_SET_PARAM: &[FieldDef] = &[f("param", U16), f("value", STR16)];
const BREATH: &[FieldDef] = &[f("breath", U16)];
const TC_ANIMATIONS: &[FieldDef] = &[
    f("default_start", F1K),
    f("default_stop", F1K),
    f("walk_start", F1K),
    f("walk_stop", F1K),
    f("dig_start", F1K),
    f("dig_stop", F1K),
    f("walk_dig_start", F1K),
    f("walk_dig_stop", F1K),
];

// ---------------------------------------------------------------------------
// Client → server layouts
// ---------------------------------------------------------------------------

const TS_INIT: &[FieldDef] = &[
    f("ser_fmt", U8),
    f("name", FieldKind::FixedStr(PLAYERNAME_SIZE)),
    f("password", FieldKind::FixedStr(PASSWORD_SIZE)),
    f("min_version", U16),
    f("max_version", U16),
];
const EMPTY: &[FieldDef] = &[];
/// Player position is scaled by 100, not 1000.
const TS_PLAYERPOS: &[FieldDef] = &[
    f("pos", FieldKind::FixedV3(100)),
    f("speed", FieldKind::FixedV3(100)),
    f("pitch", FieldKind::Fixed(100)),
    f("yaw", FieldKind::Fixed(100)),
    since("keys_pressed", U32, 14),
];
const TS_BLOCK_LIST: &[FieldDef] = &[f(
    "blocks",
    FieldKind::List(LenWidth::U8, &[FieldKind::V3S16]),
)];
const TS_INVENTORY_ACTION: &[FieldDef] = &[f("action", STR32)];
const TS_CHAT_MESSAGE: &[FieldDef] = &[f("text", STR16)];
const TS_DAMAGE: &[FieldDef] = &[f("amount", U8)];
const TS_PASSWORD: &[FieldDef] = &[
    f("old", FieldKind::FixedStr(PASSWORD_SIZE)),
    f("new", FieldKind::FixedStr(PASSWORD_SIZE)),
];
const TS_PLAYERITEM: &[FieldDef] = &[f("item", U16)];
const TS_INTERACT: &[FieldDef] = &[f("action", U8), f("item", U16), f("pointed", STR32)];
const TS_REMOVED_SOUNDS: &[FieldDef] = &[f(
    "ids",
    FieldKind::List(LenWidth::U16, &[FieldKind::S32]),
)];
const FORM_FIELDS: FieldKind = FieldKind::List(
    LenWidth::U16,
    &[FieldKind::Str(LenWidth::U16), FieldKind::Str(LenWidth::U32)],
);
const TS_NODEMETA_FIELDS: &[FieldDef] = &[
    f("pos", V3S16),
    f("formname", STR16),
    f("fields", FORM_FIELDS),
];
const TS_INVENTORY_FIELDS: &[FieldDef] = &[f("formname", STR16), f("fields", FORM_FIELDS)];
const TS_REQUEST_MEDIA: &[FieldDef] = &[f(
    "files",
    FieldKind::List(LenWidth::U16, &[FieldKind::Str(LenWidth::U16)]),
)];

// ---------------------------------------------------------------------------
// Retired client → server layouts
// ---------------------------------------------------------------------------

/// Cutover for the click/ground era: `Interact` replaced all of these.
pub const INTERACT_CUTOVER: ProtocolVersion = 4;

const LG_ADDNODE_FROM_INVENTORY: &[FieldDef] = &[f("pos", V3S16), f("item", U16)];
const LG_CLICK_OBJECT: &[FieldDef] = &[
    f("button", U8),
    f("block_pos", V3S16),
    f("id", FieldKind::S16),
    f("item", U16),
];
const LG_GROUND_ACTION: &[FieldDef] = &[
    f("action", U8),
    f("under", V3S16),
    f("above", V3S16),
    f("item", U16),
];
const LG_SIGNTEXT: &[FieldDef] = &[f("block_pos", V3S16), f("id", FieldKind::S16), f("text", STR16)];
const LG_SIGNNODETEXT: &[FieldDef] = &[f("pos", V3S16), f("text", STR16)];
const LG_CLICK_ACTIVEOBJECT: &[FieldDef] = &[f("button", U8), f("id", U16), f("item", U16)];

use Direction::{ToClient as C, ToServer as S};

static ENTRIES: &[OpcodeEntry] = &[
    OpcodeEntry::new(C, to_client::INIT, "Init", TC_INIT).handshake(),
    OpcodeEntry::new(C, to_client::BLOCKDATA, "BlockData", TC_BLOCKDATA),
    OpcodeEntry::new(C, to_client::ADDNODE, "AddNode", TC_ADDNODE),
    OpcodeEntry::new(C, to_client::REMOVENODE, "RemoveNode", TC_REMOVENODE),
    OpcodeEntry::new(C, to_client::INVENTORY, "Inventory", TC_INVENTORY),
    OpcodeEntry::new(C, to_client::TIME_OF_DAY, "TimeOfDay", TC_TIME_OF_DAY),
    OpcodeEntry::new(C, to_client::CHAT_MESSAGE, "ChatMessage", TC_CHAT_MESSAGE),
    OpcodeEntry::new(C, to_client::ACTIVE_OBJECT_REMOVE_ADD, "ActiveObjectRemoveAdd", TC_AO_REMOVE_ADD),
    OpcodeEntry::new(C, to_client::ACTIVE_OBJECT_MESSAGES, "ActiveObjectMessages", TC_AO_MESSAGES),
    OpcodeEntry::new(C, to_client::HP, "Hp", TC_HP),
    OpcodeEntry::new(C, to_client::MOVE_PLAYER, "MovePlayer", TC_MOVE_PLAYER),
    OpcodeEntry::new(C, to_client::ACCESS_DENIED, "AccessDenied", TC_ACCESS_DENIED).handshake(),
    OpcodeEntry::new(C, to_client::DEATHSCREEN, "DeathScreen", TC_DEATHSCREEN),
    OpcodeEntry::new(C, to_client::MEDIA, "Media", TC_MEDIA).since(4),
    OpcodeEntry::new(C, to_client::NODEDEF, "NodeDef", TC_DEFINITIONS).since(4),
    OpcodeEntry::new(C, to_client::ANNOUNCE_MEDIA, "AnnounceMedia", TC_ANNOUNCE_MEDIA),
    OpcodeEntry::new(C, to_client::ITEMDEF, "ItemDef", TC_DEFINITIONS).since(7),
    OpcodeEntry::new(C, to_client::PLAY_SOUND, "PlaySound", TC_PLAY_SOUND),
    OpcodeEntry::new(C, to_client::STOP_SOUND, "StopSound", TC_STOP_SOUND),
    OpcodeEntry::new(C, to_client::PRIVILEGES, "Privileges", TC_PRIVILEGES).since(10),
    OpcodeEntry::new(C, to_client::INVENTORY_FORMSPEC, "InventoryFormspec", TC_INVENTORY_FORMSPEC).since(11),
    OpcodeEntry::new(C, to_client::DETACHED_INVENTORY, "DetachedInventory", TC_DETACHED_INVENTORY).since(12),
    OpcodeEntry::new(C, to_client::SHOW_FORMSPEC, "ShowFormspec", TC_SHOW_FORMSPEC).since(16),
    OpcodeEntry::new(C, to_client::MOVEMENT, "Movement", TC_MOVEMENT),
    OpcodeEntry::new(C, to_client::SPAWN_PARTICLE, "SpawnParticle", TC_SPAWN_PARTICLE).since(17),
    OpcodeEntry::new(C, to_client::ADD_PARTICLESPAWNER, "AddParticleSpawner", TC_ADD_PARTICLESPAWNER).since(17),
    OpcodeEntry::new(C, to_client::DELETE_PARTICLESPAWNER, "DeleteParticleSpawner", TC_ID32).since(17),
    OpcodeEntry::new(C, to_client::HUDADD, "HudAdd", TC_HUDADD).since(20),
    OpcodeEntry::new(C, to_client::HUDRM, "HudRemove", TC_ID32).since(20),
    OpcodeEntry::new(C, to_client::HUDCHANGE, "HudChange", TC_HUDCHANGE).since(20),
    OpcodeEntry::new(C, to_client::HUD_SET_FLAGS, "HudSetFlags", TC_HUD_SET_FLAGS).since(20),
    OpcodeEntry::new(C, to_client::HUD_SET_PARAM, "HudSetParam", TC_HUD_SET_PARAM).since(20),
    OpcodeEntry::new(C, to_client::BREATH, "Breath", BREATH).since(21),
    OpcodeEntry::new(C, to_client::ANIMATIONS, "Animations", TC_ANIMATIONS).since(23),
    OpcodeEntry::new(S, to_server::INIT, "Init", TS_INIT).handshake(),
    OpcodeEntry::new(S, to_server::INIT2, "Init2", EMPTY).handshake(),
    OpcodeEntry::new(S, to_server::PLAYERPOS, "PlayerPos", TS_PLAYERPOS),
    OpcodeEntry::new(S, to_server::GOTBLOCKS, "GotBlocks", TS_BLOCK_LIST),
    OpcodeEntry::new(S, to_server::DELETEDBLOCKS, "DeletedBlocks", TS_BLOCK_LIST),
    OpcodeEntry::new(S, to_server::INVENTORY_ACTION, "InventoryAction", TS_INVENTORY_ACTION),
    OpcodeEntry::new(S, to_server::CHAT_MESSAGE, "ChatMessage", TS_CHAT_MESSAGE),
    OpcodeEntry::new(S, to_server::DAMAGE, "Damage", TS_DAMAGE),
    OpcodeEntry::new(S, to_server::PASSWORD, "Password", TS_PASSWORD),
    OpcodeEntry::new(S, to_server::PLAYERITEM, "PlayerItem", TS_PLAYERITEM),
    OpcodeEntry::new(S, to_server::RESPAWN, "Respawn", EMPTY),
    OpcodeEntry::new(S, to_server::INTERACT, "Interact", TS_INTERACT).since(INTERACT_CUTOVER),
    OpcodeEntry::new(S, to_server::REMOVED_SOUNDS, "RemovedSounds", TS_REMOVED_SOUNDS),
    OpcodeEntry::new(S, to_server::NODEMETA_FIELDS, "NodeMetaFields", TS_NODEMETA_FIELDS),
    OpcodeEntry::new(S, to_server::INVENTORY_FIELDS, "InventoryFields", TS_INVENTORY_FIELDS).since(12),
    OpcodeEntry::new(S, to_server::REQUEST_MEDIA, "RequestMedia", TS_REQUEST_MEDIA),
    OpcodeEntry::new(S, to_server::RECEIVED_MEDIA, "ReceivedMedia", EMPTY),
    OpcodeEntry::new(S, to_server::BREATH, "Breath", BREATH).since(21),
    OpcodeEntry::undocumented(S, legacy::GETBLOCK, "GetBlock").obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::undocumented(S, legacy::ADDNODE, "AddNode").obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::undocumented(S, legacy::REMOVENODE, "RemoveNode").obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::new(S, legacy::ADDNODE_FROM_INVENTORY, "AddNodeFromInventory", LG_ADDNODE_FROM_INVENTORY)
        .obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::new(S, legacy::CLICK_OBJECT, "ClickObject", LG_CLICK_OBJECT).obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::new(S, legacy::GROUND_ACTION, "GroundAction", LG_GROUND_ACTION).obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::undocumented(S, legacy::RELEASE, "Release").obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::new(S, legacy::SIGNTEXT, "SignText", LG_SIGNTEXT).obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::new(S, legacy::SIGNNODETEXT, "SignNodeText", LG_SIGNNODETEXT).obsoleted_at(INTERACT_CUTOVER),
    OpcodeEntry::new(S, legacy::CLICK_ACTIVEOBJECT, "ClickActiveObject", LG_CLICK_ACTIVEOBJECT)
        .obsoleted_at(INTERACT_CUTOVER),
];

/// Indexed view over the opcode table.
pub struct Registry {
    index: HashMap<(Direction, Opcode), Vec<&'static OpcodeEntry>>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut index: HashMap<(Direction, Opcode), Vec<&'static OpcodeEntry>> = HashMap::new();
    for entry in ENTRIES {
        index.entry((entry.direction, entry.opcode)).or_default().push(entry);
    }
    Registry { index }
});

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

impl Registry {
    /// Entry valid at `version` for this direction and opcode.
    ///
    /// An entry is valid when it is active at that version. Retired entries
    /// are only returned below their cutover.
    pub fn lookup(
        &self,
        direction: Direction,
        opcode: Opcode,
        version: ProtocolVersion,
    ) -> Option<&'static OpcodeEntry> {
        self.history(direction, opcode)
            .iter()
            .copied()
            .find(|entry| entry.is_active(version))
    }

    /// The current or the retired entry for an opcode, regardless of version.
    pub fn entry(
        &self,
        direction: Direction,
        opcode: Opcode,
        retired: bool,
    ) -> Option<&'static OpcodeEntry> {
        self.history(direction, opcode)
            .iter()
            .copied()
            .find(|entry| entry.is_retired() == retired)
    }

    /// Every era recorded for one opcode value.
    pub fn history(&self, direction: Direction, opcode: Opcode) -> &[&'static OpcodeEntry] {
        self.index
            .get(&(direction, opcode))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the opcode may travel before negotiation completes.
    pub fn is_handshake(&self, direction: Direction, opcode: Opcode) -> bool {
        self.history(direction, opcode).iter().any(|entry| entry.handshake)
    }

    pub fn entries(&self) -> impl Iterator<Item = &'static OpcodeEntry> {
        ENTRIES.iter()
    }
}
