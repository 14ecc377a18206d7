//! Typed messages.
//!
//! One enum per direction, one variant per opcode active in the supported
//! window. Retired client opcodes live in [`LegacyMessage`] and are only
//! reachable through decoding at a version that predates their cutover.
//!
//! Fields whose presence depends on the protocol version are `Option`s: they
//! decode as `None` below the version that introduced them, and encoding at
//! or above that version requires them to be `Some`.

use crate::core::field::{FieldValue, WireStr};
use crate::error::{ProtocolError, Result};
use crate::protocol::opcode::{legacy, to_client, to_server, Direction, Opcode, ProtocolVersion};
use crate::protocol::registry::{hud_stat, registry, FieldDef, OpcodeEntry};

pub type V2f = [f32; 2];
pub type V3f = [f32; 3];
pub type V3s16 = [i16; 3];

/// An object entering a client's view.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveObjectAdd {
    pub id: u16,
    pub kind: u8,
    pub init_data: Vec<u8>,
}

/// Physics overrides sent with `Movement`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementParams {
    pub acceleration_default: f32,
    pub acceleration_air: f32,
    pub acceleration_fast: f32,
    pub speed_walk: f32,
    pub speed_crouch: f32,
    pub speed_fast: f32,
    pub speed_climb: f32,
    pub speed_jump: f32,
    pub liquid_fluidity: f32,
    pub liquid_fluidity_smooth: f32,
    pub liquid_sink: f32,
    pub gravity: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Particle {
    pub pos: V3f,
    pub velocity: V3f,
    pub acceleration: V3f,
    pub expiration_time: f32,
    pub size: f32,
    pub collision_detection: bool,
    pub vertical: bool,
    pub texture: WireStr,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleSpawner {
    pub amount: u16,
    pub spawn_time: f32,
    pub min_pos: V3f,
    pub max_pos: V3f,
    pub min_vel: V3f,
    pub max_vel: V3f,
    pub min_acc: V3f,
    pub max_acc: V3f,
    pub min_exp_time: f32,
    pub max_exp_time: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub collision_detection: bool,
    pub vertical: bool,
    pub texture: WireStr,
    pub id: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudElement {
    pub id: u32,
    pub kind: u8,
    pub pos: V2f,
    pub name: WireStr,
    pub scale: V2f,
    pub text: WireStr,
    pub number: u32,
    pub item: u32,
    pub dir: u32,
    pub align: V2f,
    pub offset: V2f,
}

/// One changed HUD property. The stat id selects the payload type.
#[derive(Debug, Clone, PartialEq)]
pub enum HudStat {
    Pos(V2f),
    Name(WireStr),
    Scale(V2f),
    Text(WireStr),
    Number(u32),
    Item(u32),
    Dir(u32),
    Align(V2f),
    Offset(V2f),
    /// A stat id this side does not know; carries a `u32`. Must not reuse a
    /// known id.
    Other { stat: u8, value: u32 },
}

impl HudStat {
    /// `Other` with a known id would come back as a different variant.
    fn check(&self) -> Result<()> {
        match self {
            HudStat::Other { stat, .. } if *stat <= hud_stat::OFFSET => {
                Err(ProtocolError::FieldMismatch { field: "stat" })
            }
            _ => Ok(()),
        }
    }

    fn to_field(&self) -> FieldValue {
        let (tag, value) = match self {
            HudStat::Pos(v) => (hud_stat::POS, FieldValue::from(*v)),
            HudStat::Name(s) => (hud_stat::NAME, text(s)),
            HudStat::Scale(v) => (hud_stat::SCALE, FieldValue::from(*v)),
            HudStat::Text(s) => (hud_stat::TEXT, text(s)),
            HudStat::Number(n) => (hud_stat::NUMBER, FieldValue::from(*n)),
            HudStat::Item(n) => (hud_stat::ITEM, FieldValue::from(*n)),
            HudStat::Dir(n) => (hud_stat::DIR, FieldValue::from(*n)),
            HudStat::Align(v) => (hud_stat::ALIGN, FieldValue::from(*v)),
            HudStat::Offset(v) => (hud_stat::OFFSET, FieldValue::from(*v)),
            HudStat::Other { stat, value } => (*stat, FieldValue::from(*value)),
        };
        FieldValue::Switch(tag, Box::new(value))
    }

    fn from_field(field: &'static str, tag: u8, value: FieldValue) -> Result<Self> {
        let mismatch = || ProtocolError::FieldMismatch { field };
        Ok(match (tag, value) {
            (hud_stat::POS, FieldValue::V2F(v)) => HudStat::Pos(v),
            (hud_stat::SCALE, FieldValue::V2F(v)) => HudStat::Scale(v),
            (hud_stat::ALIGN, FieldValue::V2F(v)) => HudStat::Align(v),
            (hud_stat::OFFSET, FieldValue::V2F(v)) => HudStat::Offset(v),
            (hud_stat::NAME, value) => HudStat::Name(value.try_into().map_err(|_| mismatch())?),
            (hud_stat::TEXT, value) => HudStat::Text(value.try_into().map_err(|_| mismatch())?),
            (hud_stat::NUMBER, FieldValue::U32(n)) => HudStat::Number(n),
            (hud_stat::ITEM, FieldValue::U32(n)) => HudStat::Item(n),
            (hud_stat::DIR, FieldValue::U32(n)) => HudStat::Dir(n),
            (stat, FieldValue::U32(value)) if stat > hud_stat::OFFSET => HudStat::Other { stat, value },
            _ => return Err(mismatch()),
        })
    }
}

/// Animation frame ranges, `[start, stop]` each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationRanges {
    pub idle: V2f,
    pub walk: V2f,
    pub dig: V2f,
    pub walk_dig: V2f,
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ToClientMessage {
    /// Handshake reply: the chosen version plus world parameters.
    Init {
        deployed: u8,
        seed: u64,
        step: f32,
        spawn: V3f,
        protocol_version: ProtocolVersion,
    },
    BlockData { pos: V3s16, block: Vec<u8> },
    AddNode {
        pos: V3s16,
        node: Vec<u8>,
        /// Present from version 22.
        keep_metadata: Option<bool>,
    },
    RemoveNode { pos: V3s16 },
    Inventory { data: Vec<u8> },
    TimeOfDay { time: u16, speed: f32 },
    ChatMessage { text: WireStr },
    ActiveObjectRemoveAdd {
        removed: Vec<u16>,
        added: Vec<ActiveObjectAdd>,
    },
    ActiveObjectMessages { messages: Vec<(u16, Vec<u8>)> },
    Hp { hp: u8 },
    MovePlayer { pos: V3f, pitch: f32, yaw: f32 },
    AccessDenied { reason: WireStr },
    DeathScreen { set_camera_point: bool, camera_point: V3f },
    Media { files: Vec<(WireStr, Vec<u8>)> },
    NodeDef { definitions: Vec<u8> },
    /// `(name, sha1)` pairs and an optional remote media URL.
    AnnounceMedia {
        files: Vec<(WireStr, WireStr)>,
        remote_server: WireStr,
    },
    ItemDef { definitions: Vec<u8> },
    PlaySound {
        id: i32,
        name: WireStr,
        gain: f32,
        kind: u8,
        pos: V3f,
        object_id: u16,
        looped: bool,
    },
    StopSound { id: i32 },
    Privileges { privileges: Vec<WireStr> },
    InventoryFormspec { formspec: WireStr },
    DetachedInventory { name: WireStr, data: Vec<u8> },
    ShowFormspec { formspec: WireStr, form_name: WireStr },
    Movement(MovementParams),
    SpawnParticle(Particle),
    AddParticleSpawner(ParticleSpawner),
    DeleteParticleSpawner { id: u32 },
    HudAdd(HudElement),
    HudRemove { id: u32 },
    HudChange { id: u32, stat: HudStat },
    HudSetFlags { flags: u32, mask: u32 },
    HudSetParam { param: u16, value: Vec<u8> },
    Breath { breath: u16 },
    Animations(AnimationRanges),
}

/// Client → server messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ToServerMessage {
    /// Opens the handshake with the client's version range and identity.
    Init {
        ser_fmt: u8,
        name: WireStr,
        password: WireStr,
        min_version: ProtocolVersion,
        max_version: ProtocolVersion,
    },
    /// Acknowledges the server's `Init`.
    Init2,
    PlayerPos {
        pos: V3f,
        speed: V3f,
        pitch: f32,
        yaw: f32,
        /// Present from version 14.
        keys_pressed: Option<u32>,
    },
    GotBlocks { blocks: Vec<V3s16> },
    DeletedBlocks { blocks: Vec<V3s16> },
    InventoryAction { action: Vec<u8> },
    ChatMessage { text: WireStr },
    Damage { amount: u8 },
    Password { old: WireStr, new: WireStr },
    PlayerItem { item: u16 },
    Respawn,
    Interact { action: u8, item: u16, pointed: Vec<u8> },
    RemovedSounds { ids: Vec<i32> },
    NodeMetaFields {
        pos: V3s16,
        form_name: WireStr,
        fields: Vec<(WireStr, Vec<u8>)>,
    },
    InventoryFields {
        form_name: WireStr,
        fields: Vec<(WireStr, Vec<u8>)>,
    },
    RequestMedia { files: Vec<WireStr> },
    ReceivedMedia,
    Breath { breath: u16 },
}

/// Client → server messages retired at version 4, decodable only below it.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyMessage {
    AddNodeFromInventory { pos: V3s16, item: u16 },
    ClickObject { button: u8, block_pos: V3s16, id: i16, item: u16 },
    GroundAction { action: u8, under: V3s16, above: V3s16, item: u16 },
    SignText { block_pos: V3s16, id: i16, text: WireStr },
    SignNodeText { pos: V3s16, text: WireStr },
    ClickActiveObject { button: u8, id: u16, item: u16 },
}

/// A decoded message of either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ToClient(ToClientMessage),
    ToServer(ToServerMessage),
    Legacy(LegacyMessage),
}

impl From<ToClientMessage> for Message {
    fn from(msg: ToClientMessage) -> Self {
        Message::ToClient(msg)
    }
}

impl From<ToServerMessage> for Message {
    fn from(msg: ToServerMessage) -> Self {
        Message::ToServer(msg)
    }
}

impl From<LegacyMessage> for Message {
    fn from(msg: LegacyMessage) -> Self {
        Message::Legacy(msg)
    }
}

impl Message {
    pub fn direction(&self) -> Direction {
        match self {
            Message::ToClient(_) => Direction::ToClient,
            Message::ToServer(_) | Message::Legacy(_) => Direction::ToServer,
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Message::ToClient(m) => m.opcode(),
            Message::ToServer(m) => m.opcode(),
            Message::Legacy(m) => m.opcode(),
        }
    }

    pub fn is_retired(&self) -> bool {
        matches!(self, Message::Legacy(_))
    }

    /// The registry entry describing this message.
    pub fn entry(&self) -> Option<&'static OpcodeEntry> {
        registry().entry(self.direction(), self.opcode(), self.is_retired())
    }

    pub fn name(&self) -> &'static str {
        self.entry().map_or("Unknown", |entry| entry.name)
    }

    /// Reject values the wire cannot carry back unchanged.
    pub(crate) fn check(&self) -> Result<()> {
        match self {
            Message::ToClient(ToClientMessage::HudChange { stat, .. }) => stat.check(),
            _ => Ok(()),
        }
    }

    /// Field values in shape order, `Absent` for unset optional fields.
    pub(crate) fn to_fields(&self) -> Vec<FieldValue> {
        match self {
            Message::ToClient(m) => m.to_fields(),
            Message::ToServer(m) => m.to_fields(),
            Message::Legacy(m) => m.to_fields(),
        }
    }

    /// Build the typed message for `entry` from decoded field values.
    pub(crate) fn from_fields(
        entry: &'static OpcodeEntry,
        values: Vec<FieldValue>,
        version: ProtocolVersion,
    ) -> Result<Self> {
        let mut fields = Fields::new(entry.fields.unwrap_or(&[]), values);
        let unknown = || ProtocolError::UnknownOpcode {
            direction: entry.direction,
            opcode: entry.opcode,
            version,
        };
        let msg = match (entry.direction, entry.is_retired()) {
            (Direction::ToClient, _) => ToClientMessage::from_fields(entry.opcode, &mut fields)?.map(Message::ToClient),
            (Direction::ToServer, false) => ToServerMessage::from_fields(entry.opcode, &mut fields)?.map(Message::ToServer),
            (Direction::ToServer, true) => LegacyMessage::from_fields(entry.opcode, &mut fields)?.map(Message::Legacy),
        };
        msg.ok_or_else(unknown)
    }
}

/// Cursor handing out decoded values as Rust types, named for error reports.
struct Fields {
    items: std::vec::IntoIter<(&'static str, FieldValue)>,
}

impl Fields {
    fn new(defs: &'static [FieldDef], values: Vec<FieldValue>) -> Self {
        let items: Vec<_> = defs.iter().map(|def| def.name).zip(values).collect();
        Self { items: items.into_iter() }
    }

    fn element(field: &'static str, values: Vec<FieldValue>) -> Self {
        let items: Vec<_> = values.into_iter().map(|value| (field, value)).collect();
        Self { items: items.into_iter() }
    }

    fn next_raw(&mut self) -> Result<(&'static str, FieldValue)> {
        self.items
            .next()
            .ok_or(ProtocolError::FieldMismatch { field: "end of shape" })
    }

    fn take<T: TryFrom<FieldValue, Error = FieldValue>>(&mut self) -> Result<T> {
        let (field, value) = self.next_raw()?;
        T::try_from(value).map_err(|_| ProtocolError::FieldMismatch { field })
    }

    fn opt<T: TryFrom<FieldValue, Error = FieldValue>>(&mut self) -> Result<Option<T>> {
        let (field, value) = self.next_raw()?;
        match value {
            FieldValue::Absent => Ok(None),
            value => T::try_from(value)
                .map(Some)
                .map_err(|_| ProtocolError::FieldMismatch { field }),
        }
    }

    fn list<T>(&mut self, mut item: impl FnMut(&mut Fields) -> Result<T>) -> Result<Vec<T>> {
        let (field, value) = self.next_raw()?;
        let FieldValue::List(rows) = value else {
            return Err(ProtocolError::FieldMismatch { field });
        };
        rows.into_iter()
            .map(|row| item(&mut Fields::element(field, row)))
            .collect()
    }

    fn hud_stat(&mut self) -> Result<HudStat> {
        let (field, value) = self.next_raw()?;
        match value {
            FieldValue::Switch(tag, inner) => HudStat::from_field(field, tag, *inner),
            _ => Err(ProtocolError::FieldMismatch { field }),
        }
    }
}

fn opt(value: Option<impl Into<FieldValue>>) -> FieldValue {
    value.map_or(FieldValue::Absent, Into::into)
}

fn text(value: &WireStr) -> FieldValue {
    FieldValue::from(value)
}

fn blob(value: &[u8]) -> FieldValue {
    FieldValue::Bytes(value.to_vec())
}

fn form_fields(fields: &[(WireStr, Vec<u8>)]) -> FieldValue {
    rows(fields, |(key, value)| vec![text(key), blob(value)])
}

fn rows<T>(items: &[T], row: impl Fn(&T) -> Vec<FieldValue>) -> FieldValue {
    FieldValue::List(items.iter().map(row).collect())
}

impl ToClientMessage {
    pub fn opcode(&self) -> Opcode {
        use ToClientMessage::*;
        match self {
            Init { .. } => to_client::INIT,
            BlockData { .. } => to_client::BLOCKDATA,
            AddNode { .. } => to_client::ADDNODE,
            RemoveNode { .. } => to_client::REMOVENODE,
            Inventory { .. } => to_client::INVENTORY,
            TimeOfDay { .. } => to_client::TIME_OF_DAY,
            ChatMessage { .. } => to_client::CHAT_MESSAGE,
            ActiveObjectRemoveAdd { .. } => to_client::ACTIVE_OBJECT_REMOVE_ADD,
            ActiveObjectMessages { .. } => to_client::ACTIVE_OBJECT_MESSAGES,
            Hp { .. } => to_client::HP,
            MovePlayer { .. } => to_client::MOVE_PLAYER,
            AccessDenied { .. } => to_client::ACCESS_DENIED,
            DeathScreen { .. } => to_client::DEATHSCREEN,
            Media { .. } => to_client::MEDIA,
            NodeDef { .. } => to_client::NODEDEF,
            AnnounceMedia { .. } => to_client::ANNOUNCE_MEDIA,
            ItemDef { .. } => to_client::ITEMDEF,
            PlaySound { .. } => to_client::PLAY_SOUND,
            StopSound { .. } => to_client::STOP_SOUND,
            Privileges { .. } => to_client::PRIVILEGES,
            InventoryFormspec { .. } => to_client::INVENTORY_FORMSPEC,
            DetachedInventory { .. } => to_client::DETACHED_INVENTORY,
            ShowFormspec { .. } => to_client::SHOW_FORMSPEC,
            Movement(_) => to_client::MOVEMENT,
            SpawnParticle(_) => to_client::SPAWN_PARTICLE,
            AddParticleSpawner(_) => to_client::ADD_PARTICLESPAWNER,
            DeleteParticleSpawner { .. } => to_client::DELETE_PARTICLESPAWNER,
            HudAdd(_) => to_client::HUDADD,
            HudRemove { .. } => to_client::HUDRM,
            HudChange { .. } => to_client::HUDCHANGE,
            HudSetFlags { .. } => to_client::HUD_SET_FLAGS,
            HudSetParam { .. } => to_client::HUD_SET_PARAM,
            Breath { .. } => to_client::BREATH,
            Animations(_) => to_client::ANIMATIONS,
        }
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        use ToClientMessage::*;
        match self {
            Init { deployed, seed, step, spawn, protocol_version } => vec![
                (*deployed).into(),
                (*seed).into(),
                (*step).into(),
                (*spawn).into(),
                (*protocol_version).into(),
            ],
            BlockData { pos, block } => vec![(*pos).into(), blob(block)],
            AddNode { pos, node, keep_metadata } => vec![(*pos).into(), blob(node), opt(*keep_metadata)],
            RemoveNode { pos } => vec![(*pos).into()],
            Inventory { data } => vec![blob(data)],
            TimeOfDay { time, speed } => vec![(*time).into(), (*speed).into()],
            ChatMessage { text: t } => vec![text(t)],
            ActiveObjectRemoveAdd { removed, added } => vec![
                rows(removed, |id| vec![(*id).into()]),
                rows(added, |obj| vec![obj.id.into(), obj.kind.into(), blob(&obj.init_data)]),
            ],
            ActiveObjectMessages { messages } => {
                vec![rows(messages, |(id, data)| vec![(*id).into(), blob(data)])]
            }
            Hp { hp } => vec![(*hp).into()],
            MovePlayer { pos, pitch, yaw } => vec![(*pos).into(), (*pitch).into(), (*yaw).into()],
            AccessDenied { reason } => vec![text(reason)],
            DeathScreen { set_camera_point, camera_point } => {
                vec![(*set_camera_point).into(), (*camera_point).into()]
            }
            Media { files } => vec![rows(files, |(name, data)| vec![text(name), blob(data)])],
            NodeDef { definitions } | ItemDef { definitions } => vec![blob(definitions)],
            AnnounceMedia { files, remote_server } => vec![
                rows(files, |(name, sha1)| vec![text(name), text(sha1)]),
                text(remote_server),
            ],
            PlaySound { id, name, gain, kind, pos, object_id, looped } => vec![
                (*id).into(),
                text(name),
                (*gain).into(),
                (*kind).into(),
                (*pos).into(),
                (*object_id).into(),
                (*looped).into(),
            ],
            StopSound { id } => vec![(*id).into()],
            Privileges { privileges } => vec![rows(privileges, |p| vec![text(p)])],
            InventoryFormspec { formspec } => vec![text(formspec)],
            DetachedInventory { name, data } => vec![text(name), blob(data)],
            ShowFormspec { formspec, form_name } => vec![text(formspec), text(form_name)],
            Movement(m) => vec![
                m.acceleration_default.into(),
                m.acceleration_air.into(),
                m.acceleration_fast.into(),
                m.speed_walk.into(),
                m.speed_crouch.into(),
                m.speed_fast.into(),
                m.speed_climb.into(),
                m.speed_jump.into(),
                m.liquid_fluidity.into(),
                m.liquid_fluidity_smooth.into(),
                m.liquid_sink.into(),
                m.gravity.into(),
            ],
            SpawnParticle(p) => vec![
                p.pos.into(),
                p.velocity.into(),
                p.acceleration.into(),
                p.expiration_time.into(),
                p.size.into(),
                p.collision_detection.into(),
                p.vertical.into(),
                text(&p.texture),
            ],
            AddParticleSpawner(s) => vec![
                s.amount.into(),
                s.spawn_time.into(),
                s.min_pos.into(),
                s.max_pos.into(),
                s.min_vel.into(),
                s.max_vel.into(),
                s.min_acc.into(),
                s.max_acc.into(),
                s.min_exp_time.into(),
                s.max_exp_time.into(),
                s.min_size.into(),
                s.max_size.into(),
                s.collision_detection.into(),
                s.vertical.into(),
                text(&s.texture),
                s.id.into(),
            ],
            DeleteParticleSpawner { id } | HudRemove { id } => vec![(*id).into()],
            HudAdd(h) => vec![
                h.id.into(),
                h.kind.into(),
                h.pos.into(),
                text(&h.name),
                h.scale.into(),
                text(&h.text),
                h.number.into(),
                h.item.into(),
                h.dir.into(),
                h.align.into(),
                h.offset.into(),
            ],
            HudChange { id, stat } => vec![(*id).into(), stat.to_field()],
            HudSetFlags { flags, mask } => vec![(*flags).into(), (*mask).into()],
            HudSetParam { param, value } => vec![(*param).into(), blob(value)],
            Breath { breath } => vec![(*breath).into()],
            Animations(a) => vec![
                a.idle[0].into(),
                a.idle[1].into(),
                a.walk[0].into(),
                a.walk[1].into(),
                a.dig[0].into(),
                a.dig[1].into(),
                a.walk_dig[0].into(),
                a.walk_dig[1].into(),
            ],
        }
    }

    fn from_fields(opcode: Opcode, f: &mut Fields) -> Result<Option<Self>> {
        use ToClientMessage::*;
        Ok(Some(match opcode {
            to_client::INIT => Init {
                deployed: f.take()?,
                seed: f.take()?,
                step: f.take()?,
                spawn: f.take()?,
                protocol_version: f.take()?,
            },
            to_client::BLOCKDATA => BlockData { pos: f.take()?, block: f.take()? },
            to_client::ADDNODE => AddNode {
                pos: f.take()?,
                node: f.take()?,
                keep_metadata: f.opt()?,
            },
            to_client::REMOVENODE => RemoveNode { pos: f.take()? },
            to_client::INVENTORY => Inventory { data: f.take()? },
            to_client::TIME_OF_DAY => TimeOfDay { time: f.take()?, speed: f.take()? },
            to_client::CHAT_MESSAGE => ChatMessage { text: f.take()? },
            to_client::ACTIVE_OBJECT_REMOVE_ADD => ActiveObjectRemoveAdd {
                removed: f.list(|row| row.take())?,
                added: f.list(|row| {
                    Ok(ActiveObjectAdd {
                        id: row.take()?,
                        kind: row.take()?,
                        init_data: row.take()?,
                    })
                })?,
            },
            to_client::ACTIVE_OBJECT_MESSAGES => ActiveObjectMessages {
                messages: f.list(|row| Ok((row.take()?, row.take()?)))?,
            },
            to_client::HP => Hp { hp: f.take()? },
            to_client::MOVE_PLAYER => MovePlayer {
                pos: f.take()?,
                pitch: f.take()?,
                yaw: f.take()?,
            },
            to_client::ACCESS_DENIED => AccessDenied { reason: f.take()? },
            to_client::DEATHSCREEN => DeathScreen {
                set_camera_point: f.take()?,
                camera_point: f.take()?,
            },
            to_client::MEDIA => Media {
                files: f.list(|row| Ok((row.take()?, row.take()?)))?,
            },
            to_client::NODEDEF => NodeDef { definitions: f.take()? },
            to_client::ANNOUNCE_MEDIA => AnnounceMedia {
                files: f.list(|row| Ok((row.take()?, row.take()?)))?,
                remote_server: f.take()?,
            },
            to_client::ITEMDEF => ItemDef { definitions: f.take()? },
            to_client::PLAY_SOUND => PlaySound {
                id: f.take()?,
                name: f.take()?,
                gain: f.take()?,
                kind: f.take()?,
                pos: f.take()?,
                object_id: f.take()?,
                looped: f.take()?,
            },
            to_client::STOP_SOUND => StopSound { id: f.take()? },
            to_client::PRIVILEGES => Privileges {
                privileges: f.list(|row| row.take())?,
            },
            to_client::INVENTORY_FORMSPEC => InventoryFormspec { formspec: f.take()? },
            to_client::DETACHED_INVENTORY => DetachedInventory {
                name: f.take()?,
                data: f.take()?,
            },
            to_client::SHOW_FORMSPEC => ShowFormspec {
                formspec: f.take()?,
                form_name: f.take()?,
            },
            to_client::MOVEMENT => Movement(MovementParams {
                acceleration_default: f.take()?,
                acceleration_air: f.take()?,
                acceleration_fast: f.take()?,
                speed_walk: f.take()?,
                speed_crouch: f.take()?,
                speed_fast: f.take()?,
                speed_climb: f.take()?,
                speed_jump: f.take()?,
                liquid_fluidity: f.take()?,
                liquid_fluidity_smooth: f.take()?,
                liquid_sink: f.take()?,
                gravity: f.take()?,
            }),
            to_client::SPAWN_PARTICLE => SpawnParticle(Particle {
                pos: f.take()?,
                velocity: f.take()?,
                acceleration: f.take()?,
                expiration_time: f.take()?,
                size: f.take()?,
                collision_detection: f.take()?,
                vertical: f.take()?,
                texture: f.take()?,
            }),
            to_client::ADD_PARTICLESPAWNER => AddParticleSpawner(ParticleSpawner {
                amount: f.take()?,
                spawn_time: f.take()?,
                min_pos: f.take()?,
                max_pos: f.take()?,
                min_vel: f.take()?,
                max_vel: f.take()?,
                min_acc: f.take()?,
                max_acc: f.take()?,
                min_exp_time: f.take()?,
                max_exp_time: f.take()?,
                min_size: f.take()?,
                max_size: f.take()?,
                collision_detection: f.take()?,
                vertical: f.take()?,
                texture: f.take()?,
                id: f.take()?,
            }),
            to_client::DELETE_PARTICLESPAWNER => DeleteParticleSpawner { id: f.take()? },
            to_client::HUDADD => HudAdd(HudElement {
                id: f.take()?,
                kind: f.take()?,
                pos: f.take()?,
                name: f.take()?,
                scale: f.take()?,
                text: f.take()?,
                number: f.take()?,
                item: f.take()?,
                dir: f.take()?,
                align: f.take()?,
                offset: f.take()?,
            }),
            to_client::HUDRM => HudRemove { id: f.take()? },
            to_client::HUDCHANGE => HudChange {
                id: f.take()?,
                stat: f.hud_stat()?,
            },
            to_client::HUD_SET_FLAGS => HudSetFlags {
                flags: f.take()?,
                mask: f.take()?,
            },
            to_client::HUD_SET_PARAM => HudSetParam {
                param: f.take()?,
                value: f.take()?,
            },
            to_client::BREATH => Breath { breath: f.take()? },
            to_client::ANIMATIONS => Animations(AnimationRanges {
                idle: [f.take()?, f.take()?],
                walk: [f.take()?, f.take()?],
                dig: [f.take()?, f.take()?],
                walk_dig: [f.take()?, f.take()?],
            }),
            _ => return Ok(None),
        }))
    }
}

impl ToServerMessage {
    pub fn opcode(&self) -> Opcode {
        use ToServerMessage::*;
        match self {
            Init { .. } => to_server::INIT,
            Init2 => to_server::INIT2,
            PlayerPos { .. } => to_server::PLAYERPOS,
            GotBlocks { .. } => to_server::GOTBLOCKS,
            DeletedBlocks { .. } => to_server::DELETEDBLOCKS,
            InventoryAction { .. } => to_server::INVENTORY_ACTION,
            ChatMessage { .. } => to_server::CHAT_MESSAGE,
            Damage { .. } => to_server::DAMAGE,
            Password { .. } => to_server::PASSWORD,
            PlayerItem { .. } => to_server::PLAYERITEM,
            Respawn => to_server::RESPAWN,
            Interact { .. } => to_server::INTERACT,
            RemovedSounds { .. } => to_server::REMOVED_SOUNDS,
            NodeMetaFields { .. } => to_server::NODEMETA_FIELDS,
            InventoryFields { .. } => to_server::INVENTORY_FIELDS,
            RequestMedia { .. } => to_server::REQUEST_MEDIA,
            ReceivedMedia => to_server::RECEIVED_MEDIA,
            Breath { .. } => to_server::BREATH,
        }
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        use ToServerMessage::*;
        match self {
            Init { ser_fmt, name, password, min_version, max_version } => vec![
                (*ser_fmt).into(),
                text(name),
                text(password),
                (*min_version).into(),
                (*max_version).into(),
            ],
            Init2 | Respawn | ReceivedMedia => Vec::new(),
            PlayerPos { pos, speed, pitch, yaw, keys_pressed } => vec![
                (*pos).into(),
                (*speed).into(),
                (*pitch).into(),
                (*yaw).into(),
                opt(*keys_pressed),
            ],
            GotBlocks { blocks } | DeletedBlocks { blocks } => vec![rows(blocks, |b| vec![(*b).into()])],
            InventoryAction { action } => vec![blob(action)],
            ChatMessage { text: t } => vec![text(t)],
            Damage { amount } => vec![(*amount).into()],
            Password { old, new } => vec![text(old), text(new)],
            PlayerItem { item } => vec![(*item).into()],
            Interact { action, item, pointed } => vec![(*action).into(), (*item).into(), blob(pointed)],
            RemovedSounds { ids } => vec![rows(ids, |id| vec![(*id).into()])],
            NodeMetaFields { pos, form_name, fields } => {
                vec![(*pos).into(), text(form_name), form_fields(fields)]
            }
            InventoryFields { form_name, fields } => vec![text(form_name), form_fields(fields)],
            RequestMedia { files } => vec![rows(files, |name| vec![text(name)])],
            Breath { breath } => vec![(*breath).into()],
        }
    }

    fn from_fields(opcode: Opcode, f: &mut Fields) -> Result<Option<Self>> {
        use ToServerMessage::*;
        Ok(Some(match opcode {
            to_server::INIT => Init {
                ser_fmt: f.take()?,
                name: f.take()?,
                password: f.take()?,
                min_version: f.take()?,
                max_version: f.take()?,
            },
            to_server::INIT2 => Init2,
            to_server::PLAYERPOS => PlayerPos {
                pos: f.take()?,
                speed: f.take()?,
                pitch: f.take()?,
                yaw: f.take()?,
                keys_pressed: f.opt()?,
            },
            to_server::GOTBLOCKS => GotBlocks { blocks: f.list(|row| row.take())? },
            to_server::DELETEDBLOCKS => DeletedBlocks { blocks: f.list(|row| row.take())? },
            to_server::INVENTORY_ACTION => InventoryAction { action: f.take()? },
            to_server::CHAT_MESSAGE => ChatMessage { text: f.take()? },
            to_server::DAMAGE => Damage { amount: f.take()? },
            to_server::PASSWORD => Password { old: f.take()?, new: f.take()? },
            to_server::PLAYERITEM => PlayerItem { item: f.take()? },
            to_server::RESPAWN => Respawn,
            to_server::INTERACT => Interact {
                action: f.take()?,
                item: f.take()?,
                pointed: f.take()?,
            },
            to_server::REMOVED_SOUNDS => RemovedSounds { ids: f.list(|row| row.take())? },
            to_server::NODEMETA_FIELDS => NodeMetaFields {
                pos: f.take()?,
                form_name: f.take()?,
                fields: f.list(|row| Ok((row.take()?, row.take()?)))?,
            },
            to_server::INVENTORY_FIELDS => InventoryFields {
                form_name: f.take()?,
                fields: f.list(|row| Ok((row.take()?, row.take()?)))?,
            },
            to_server::REQUEST_MEDIA => RequestMedia { files: f.list(|row| row.take())? },
            to_server::RECEIVED_MEDIA => ReceivedMedia,
            to_server::BREATH => Breath { breath: f.take()? },
            _ => return Ok(None),
        }))
    }
}

impl LegacyMessage {
    pub fn opcode(&self) -> Opcode {
        use LegacyMessage::*;
        match self {
            AddNodeFromInventory { .. } => legacy::ADDNODE_FROM_INVENTORY,
            ClickObject { .. } => legacy::CLICK_OBJECT,
            GroundAction { .. } => legacy::GROUND_ACTION,
            SignText { .. } => legacy::SIGNTEXT,
            SignNodeText { .. } => legacy::SIGNNODETEXT,
            ClickActiveObject { .. } => legacy::CLICK_ACTIVEOBJECT,
        }
    }

    fn to_fields(&self) -> Vec<FieldValue> {
        use LegacyMessage::*;
        match self {
            AddNodeFromInventory { pos, item } => vec![(*pos).into(), (*item).into()],
            ClickObject { button, block_pos, id, item } => {
                vec![(*button).into(), (*block_pos).into(), (*id).into(), (*item).into()]
            }
            GroundAction { action, under, above, item } => {
                vec![(*action).into(), (*under).into(), (*above).into(), (*item).into()]
            }
            SignText { block_pos, id, text: t } => vec![(*block_pos).into(), (*id).into(), text(t)],
            SignNodeText { pos, text: t } => vec![(*pos).into(), text(t)],
            ClickActiveObject { button, id, item } => vec![(*button).into(), (*id).into(), (*item).into()],
        }
    }

    fn from_fields(opcode: Opcode, f: &mut Fields) -> Result<Option<Self>> {
        use LegacyMessage::*;
        Ok(Some(match opcode {
            legacy::ADDNODE_FROM_INVENTORY => AddNodeFromInventory {
                pos: f.take()?,
                item: f.take()?,
            },
            legacy::CLICK_OBJECT => ClickObject {
                button: f.take()?,
                block_pos: f.take()?,
                id: f.take()?,
                item: f.take()?,
            },
            legacy::GROUND_ACTION => GroundAction {
                action: f.take()?,
                under: f.take()?,
                above: f.take()?,
                item: f.take()?,
            },
            legacy::SIGNTEXT => SignText {
                block_pos: f.take()?,
                id: f.take()?,
                text: f.take()?,
            },
            legacy::SIGNNODETEXT => SignNodeText { pos: f.take()?, text: f.take()? },
            legacy::CLICK_ACTIVEOBJECT => ClickActiveObject {
                button: f.take()?,
                id: f.take()?,
                item: f.take()?,
            },
            _ => return Ok(None),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_has_an_entry() {
        let samples: Vec<Message> = vec![
            ToClientMessage::Hp { hp: 20 }.into(),
            ToClientMessage::Animations(AnimationRanges::default()).into(),
            ToServerMessage::Init2.into(),
            ToServerMessage::Breath { breath: 11 }.into(),
            LegacyMessage::SignNodeText { pos: [0, 0, 0], text: WireStr::new() }.into(),
        ];
        for msg in samples {
            let entry = msg.entry().expect("entry");
            assert_eq!(entry.direction, msg.direction());
            assert_eq!(entry.is_retired(), msg.is_retired());
        }
    }

    #[test]
    fn test_field_arity_matches_registry() {
        let msg = Message::from(ToClientMessage::HudAdd(HudElement::default()));
        let entry = msg.entry().unwrap();
        assert_eq!(msg.to_fields().len(), entry.fields.unwrap().len());

        let msg = Message::from(ToServerMessage::PlayerPos {
            pos: [0.0; 3],
            speed: [0.0; 3],
            pitch: 0.0,
            yaw: 0.0,
            keys_pressed: None,
        });
        let fields = msg.to_fields();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[4], FieldValue::Absent);
    }

    #[test]
    fn test_legacy_shares_client_direction() {
        let msg = Message::from(LegacyMessage::ClickActiveObject { button: 0, id: 1, item: 2 });
        assert_eq!(msg.direction(), Direction::ToServer);
        assert_eq!(msg.opcode(), legacy::CLICK_ACTIVEOBJECT);
        assert_eq!(msg.name(), "ClickActiveObject");
    }

    #[test]
    fn test_hud_stat_tags() {
        let FieldValue::Switch(tag, _) = HudStat::Text("hp".into()).to_field() else {
            panic!("expected switch");
        };
        assert_eq!(tag, hud_stat::TEXT);
        let stat = HudStat::from_field("stat", 12, FieldValue::U32(7)).unwrap();
        assert_eq!(stat, HudStat::Other { stat: 12, value: 7 });
        assert!(HudStat::from_field("stat", hud_stat::POS, FieldValue::U32(7)).is_err());
        assert!(HudStat::Other { stat: 9, value: 1 }.check().is_ok());
        assert!(HudStat::Other { stat: hud_stat::NUMBER, value: 1 }.check().is_err());
    }
}
