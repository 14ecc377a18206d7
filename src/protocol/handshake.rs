//! Version negotiation handshake
//!
//! Both sides advertise an inclusive `[min, max]` window. The server picks the
//! highest version both windows contain and announces it in its `Init` reply;
//! the client acknowledges with `Init2`.
//!
//! ```text
//! client                         server
//!   | -- Init{range, name} -->     |  AwaitingClientInit
//!   |                              |  negotiate
//!   | <-- Init{version, world} --  |  AwaitingClientAck
//!   | -- Init2 -->                 |  Negotiated
//! ```
//!
//! A failed negotiation is never silent: the server answers with
//! `AccessDenied` carrying a readable reason and the session ends.
//!
//! Handshake state lives in per-session structures owned by the caller; there
//! is no shared state between connections.

use crate::core::field::WireStr;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{ToClientMessage, ToServerMessage, V3f};
use crate::protocol::opcode::ProtocolVersion;
use crate::protocol::registry::{PASSWORD_SIZE, PLAYERNAME_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Inclusive window of protocol versions one peer can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: ProtocolVersion,
    pub max: ProtocolVersion,
}

impl VersionRange {
    /// # Errors
    /// `ConfigError` if `min > max`.
    pub fn new(min: ProtocolVersion, max: ProtocolVersion) -> Result<Self> {
        if min > max {
            return Err(ProtocolError::ConfigError(format!(
                "Empty version range: min {min} > max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, version: ProtocolVersion) -> bool {
        (self.min..=self.max).contains(&version)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Highest version inside both windows.
///
/// `v = min(client.max, server.max)`, accepted iff `v >= max(client.min, server.min)`.
///
/// # Errors
/// `IncompatibleVersion` when the windows do not intersect.
pub fn negotiate_version(client: VersionRange, server: VersionRange) -> Result<ProtocolVersion> {
    let version = client.max.min(server.max);
    if version >= client.min.max(server.min) {
        Ok(version)
    } else {
        Err(ProtocolError::IncompatibleVersion {
            client_min: client.min,
            client_max: client.max,
            server_min: server.min,
            server_max: server.max,
        })
    }
}

/// Check a player name against the wire limits.
///
/// Names are 1 to 20 bytes of `a-z A-Z 0-9 _ -`.
pub fn validate_player_name(name: impl AsRef<[u8]>) -> std::result::Result<(), &'static str> {
    let name = name.as_ref();
    if name.is_empty() {
        return Err(constants::ERR_EMPTY_NAME);
    }
    if name.len() > PLAYERNAME_SIZE {
        return Err(constants::ERR_NAME_TOO_LONG);
    }
    if !name
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'-')
    {
        return Err(constants::ERR_NAME_CHARSET);
    }
    Ok(())
}

/// World parameters the server announces once a version is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldParams {
    /// Highest map serialization format the server can deploy.
    pub deployed: u8,
    pub seed: u64,
    /// Recommended client step, in seconds.
    pub step: f32,
    pub spawn: V3f,
}

/// Who the client claims to be.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIdentity {
    pub name: String,
    /// Already hashed by the caller; carried as is.
    pub password: WireStr,
    /// Highest map serialization format the client reads.
    pub ser_fmt: u8,
}

impl ClientIdentity {
    /// # Errors
    /// `HandshakeError` if the name or password does not fit the wire limits.
    pub fn new(name: impl Into<String>, password: impl Into<WireStr>, ser_fmt: u8) -> Result<Self> {
        let name = name.into();
        let password = password.into();
        validate_player_name(&name).map_err(|e| ProtocolError::HandshakeError(e.into()))?;
        if password.len() > PASSWORD_SIZE {
            return Err(ProtocolError::HandshakeError(
                constants::ERR_PASSWORD_TOO_LONG.into(),
            ));
        }
        Ok(Self {
            name,
            password,
            ser_fmt,
        })
    }
}

/// Server handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    AwaitingClientInit,
    AwaitingClientAck { version: ProtocolVersion },
    Negotiated { version: ProtocolVersion },
    Failed,
}

/// What the server does after a handshake message.
#[derive(Debug)]
pub enum ServerStep {
    /// Send this reply and keep waiting.
    Reply(ToClientMessage),
    /// Handshake complete.
    Negotiated(ProtocolVersion),
    /// Send the farewell, then close with `error`.
    Deny {
        farewell: ToClientMessage,
        error: ProtocolError,
    },
}

/// Server side of one connection's handshake.
#[derive(Debug)]
pub struct ServerHandshake {
    range: VersionRange,
    world: WorldParams,
    state: ServerState,
    player: Option<String>,
}

impl ServerHandshake {
    pub fn new(range: VersionRange, world: WorldParams) -> Self {
        Self {
            range,
            world,
            state: ServerState::AwaitingClientInit,
            player: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn range(&self) -> VersionRange {
        self.range
    }

    /// Version in force once the handshake is complete.
    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        match self.state {
            ServerState::Negotiated { version } => Some(version),
            _ => None,
        }
    }

    /// Version chosen so far, even before the client acknowledged it.
    pub fn chosen_version(&self) -> Option<ProtocolVersion> {
        match self.state {
            ServerState::AwaitingClientAck { version } | ServerState::Negotiated { version } => {
                Some(version)
            }
            _ => None,
        }
    }

    /// Player name from the client's `Init`, once accepted.
    pub fn player_name(&self) -> Option<&str> {
        self.player.as_deref()
    }

    /// Advance on one handshake message from the client.
    ///
    /// # Errors
    /// `UnexpectedMessage` if the message does not fit the current state.
    #[instrument(skip(self, msg), fields(state = ?self.state))]
    pub fn on_message(&mut self, msg: ToServerMessage) -> Result<ServerStep> {
        match (self.state, msg) {
            (
                ServerState::AwaitingClientInit,
                ToServerMessage::Init {
                    ser_fmt,
                    name,
                    min_version,
                    max_version,
                    ..
                },
            ) => Ok(self.on_init(ser_fmt, name, min_version, max_version)),
            (ServerState::AwaitingClientAck { version }, ToServerMessage::Init2) => {
                self.state = ServerState::Negotiated { version };
                info!(version, player = ?self.player, "handshake complete");
                Ok(ServerStep::Negotiated(version))
            }
            (state, msg) => {
                warn!(?state, opcode = %msg.opcode(), "unexpected handshake message");
                self.state = ServerState::Failed;
                Err(ProtocolError::UnexpectedMessage)
            }
        }
    }

    fn on_init(
        &mut self,
        ser_fmt: u8,
        name: WireStr,
        min_version: ProtocolVersion,
        max_version: ProtocolVersion,
    ) -> ServerStep {
        let client = VersionRange {
            min: min_version,
            max: max_version,
        };

        let version = match negotiate_version(client, self.range) {
            Ok(version) => version,
            Err(error) => {
                warn!(%client, server = %self.range, "no common protocol version");
                let reason = format!(
                    "{} Server supports protocol versions {}, client offered {}.",
                    constants::DENY_WRONG_VERSION,
                    self.range,
                    client
                );
                return self.deny(reason, error);
            }
        };

        if let Err(reason) = validate_player_name(&name) {
            warn!(%name, reason, "rejecting player name");
            return self.deny(reason.to_string(), ProtocolError::AccessDenied(reason.into()));
        }

        debug!(version, %name, "client init accepted");
        self.player = Some(name.to_string());
        self.state = ServerState::AwaitingClientAck { version };

        ServerStep::Reply(ToClientMessage::Init {
            deployed: self.world.deployed.min(ser_fmt),
            seed: self.world.seed,
            step: self.world.step,
            spawn: self.world.spawn,
            protocol_version: version,
        })
    }

    fn deny(&mut self, reason: String, error: ProtocolError) -> ServerStep {
        self.state = ServerState::Failed;
        ServerStep::Deny {
            farewell: ToClientMessage::AccessDenied {
                reason: reason.into(),
            },
            error,
        }
    }
}

/// Client handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// `Init` not sent yet.
    Idle,
    AwaitingServerInit,
    Negotiated { version: ProtocolVersion },
    Failed,
}

/// The server accepted us.
#[derive(Debug)]
pub struct ClientAccepted {
    pub version: ProtocolVersion,
    pub world: WorldParams,
    /// `Init2`, to be sent right away.
    pub ack: ToServerMessage,
}

/// Client side of one connection's handshake.
#[derive(Debug)]
pub struct ClientHandshake {
    range: VersionRange,
    identity: ClientIdentity,
    state: ClientState,
}

impl ClientHandshake {
    pub fn new(range: VersionRange, identity: ClientIdentity) -> Self {
        Self {
            range,
            identity,
            state: ClientState::Idle,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn range(&self) -> VersionRange {
        self.range
    }

    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        match self.state {
            ClientState::Negotiated { version } => Some(version),
            _ => None,
        }
    }

    /// Build the opening `Init`.
    ///
    /// # Errors
    /// `HandshakeError` if called twice.
    #[instrument(skip(self), fields(name = %self.identity.name))]
    pub fn start(&mut self) -> Result<ToServerMessage> {
        if self.state != ClientState::Idle {
            return Err(ProtocolError::HandshakeError(
                constants::ERR_HANDSHAKE_STARTED.into(),
            ));
        }
        self.state = ClientState::AwaitingServerInit;
        debug!(range = %self.range, "sending client init");
        Ok(ToServerMessage::Init {
            ser_fmt: self.identity.ser_fmt,
            name: self.identity.name.as_str().into(),
            password: self.identity.password.clone(),
            min_version: self.range.min,
            max_version: self.range.max,
        })
    }

    /// Advance on one handshake message from the server.
    ///
    /// # Errors
    /// - `AccessDenied` when the server refused us
    /// - `HandshakeError` when the server chose a version outside our window
    /// - `UnexpectedMessage` when the message does not fit the current state
    #[instrument(skip(self, msg), fields(state = ?self.state))]
    pub fn on_message(&mut self, msg: ToClientMessage) -> Result<ClientAccepted> {
        match (self.state, msg) {
            (
                ClientState::AwaitingServerInit,
                ToClientMessage::Init {
                    deployed,
                    seed,
                    step,
                    spawn,
                    protocol_version,
                },
            ) => {
                if !self.range.contains(protocol_version) {
                    self.state = ClientState::Failed;
                    warn!(protocol_version, range = %self.range, "server chose an unsupported version");
                    return Err(ProtocolError::HandshakeError(format!(
                        "{}: {protocol_version} not in {}",
                        constants::ERR_VERSION_OUTSIDE_RANGE,
                        self.range
                    )));
                }
                self.state = ClientState::Negotiated {
                    version: protocol_version,
                };
                info!(version = protocol_version, "handshake complete");
                Ok(ClientAccepted {
                    version: protocol_version,
                    world: WorldParams {
                        deployed,
                        seed,
                        step,
                        spawn,
                    },
                    ack: ToServerMessage::Init2,
                })
            }
            (_, ToClientMessage::AccessDenied { reason }) => {
                self.state = ClientState::Failed;
                warn!(%reason, "server denied access");
                Err(ProtocolError::AccessDenied(reason.to_string()))
            }
            (state, msg) => {
                warn!(?state, opcode = %msg.opcode(), "unexpected handshake message");
                self.state = ClientState::Failed;
                Err(ProtocolError::UnexpectedMessage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: ProtocolVersion, max: ProtocolVersion) -> VersionRange {
        VersionRange::new(min, max).unwrap()
    }

    fn world() -> WorldParams {
        WorldParams {
            deployed: 25,
            seed: 0xdead_beef,
            step: 0.09,
            spawn: [0.0, 10.0, 0.0],
        }
    }

    fn client_init(min: ProtocolVersion, max: ProtocolVersion, name: &str) -> ToServerMessage {
        ToServerMessage::Init {
            ser_fmt: 22,
            name: name.into(),
            password: WireStr::new(),
            min_version: min,
            max_version: max,
        }
    }

    #[test]
    fn test_negotiation_boundaries() {
        assert_eq!(negotiate_version(range(13, 23), range(13, 23)).unwrap(), 23);
        assert_eq!(negotiate_version(range(10, 15), range(13, 23)).unwrap(), 15);
        assert_eq!(negotiate_version(range(23, 30), range(13, 23)).unwrap(), 23);
        assert!(matches!(
            negotiate_version(range(5, 12), range(13, 23)),
            Err(ProtocolError::IncompatibleVersion { client_max: 12, server_min: 13, .. })
        ));
        assert!(negotiate_version(range(24, 30), range(13, 23)).is_err());
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(matches!(VersionRange::new(5, 4), Err(ProtocolError::ConfigError(_))));
        assert!(range(13, 23).contains(13));
        assert!(!range(13, 23).contains(24));
    }

    #[test]
    fn test_player_names() {
        assert!(validate_player_name("singleplayer").is_ok());
        assert!(validate_player_name("a_b-C9").is_ok());
        assert_eq!(validate_player_name(""), Err(constants::ERR_EMPTY_NAME));
        assert_eq!(validate_player_name("x".repeat(21).as_str()), Err(constants::ERR_NAME_TOO_LONG));
        assert_eq!(validate_player_name("bob smith"), Err(constants::ERR_NAME_CHARSET));
        assert!(ClientIdentity::new("bob", "p".repeat(29), 25).is_err());
    }

    #[test]
    fn test_server_flow() {
        let mut server = ServerHandshake::new(range(13, 23), world());
        let ServerStep::Reply(reply) = server.on_message(client_init(13, 23, "bob")).unwrap() else {
            panic!("expected reply");
        };
        assert!(matches!(
            reply,
            ToClientMessage::Init { protocol_version: 23, deployed: 22, .. }
        ));
        assert_eq!(server.state(), ServerState::AwaitingClientAck { version: 23 });
        assert_eq!(server.negotiated_version(), None);
        assert_eq!(server.player_name(), Some("bob"));

        assert!(matches!(
            server.on_message(ToServerMessage::Init2).unwrap(),
            ServerStep::Negotiated(23)
        ));
        assert_eq!(server.negotiated_version(), Some(23));
    }

    #[test]
    fn test_server_denies_incompatible_client() {
        let mut server = ServerHandshake::new(range(13, 23), world());
        let step = server.on_message(client_init(5, 12, "bob")).unwrap();
        let ServerStep::Deny { farewell, error } = step else {
            panic!("expected deny");
        };
        assert!(matches!(error, ProtocolError::IncompatibleVersion { .. }));
        let ToClientMessage::AccessDenied { reason } = farewell else {
            panic!("expected access denied");
        };
        assert!(reason.to_string().contains("[13, 23]"));
        assert_eq!(server.state(), ServerState::Failed);
    }

    #[test]
    fn test_server_denies_bad_name() {
        let mut server = ServerHandshake::new(range(13, 23), world());
        let step = server.on_message(client_init(13, 23, "no spaces")).unwrap();
        assert!(matches!(step, ServerStep::Deny { error: ProtocolError::AccessDenied(_), .. }));
    }

    #[test]
    fn test_server_rejects_ack_before_init() {
        let mut server = ServerHandshake::new(range(13, 23), world());
        assert!(matches!(
            server.on_message(ToServerMessage::Init2),
            Err(ProtocolError::UnexpectedMessage)
        ));
    }

    #[test]
    fn test_client_flow() {
        let identity = ClientIdentity::new("alice", "", 25).unwrap();
        let mut client = ClientHandshake::new(range(13, 23), identity);
        let init = client.start().unwrap();
        assert!(matches!(init, ToServerMessage::Init { min_version: 13, max_version: 23, .. }));
        assert!(client.start().is_err());

        let accepted = client
            .on_message(ToClientMessage::Init {
                deployed: 25,
                seed: 7,
                step: 0.1,
                spawn: [1.0, 2.0, 3.0],
                protocol_version: 20,
            })
            .unwrap();
        assert_eq!(accepted.version, 20);
        assert_eq!(accepted.world.seed, 7);
        assert_eq!(accepted.ack, ToServerMessage::Init2);
        assert_eq!(client.negotiated_version(), Some(20));
    }

    #[test]
    fn test_client_rejects_version_outside_window() {
        let identity = ClientIdentity::new("alice", "", 25).unwrap();
        let mut client = ClientHandshake::new(range(13, 20), identity);
        client.start().unwrap();
        let err = client
            .on_message(ToClientMessage::Init {
                deployed: 25,
                seed: 0,
                step: 0.1,
                spawn: [0.0; 3],
                protocol_version: 23,
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::HandshakeError(_)));
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[test]
    fn test_client_access_denied() {
        let identity = ClientIdentity::new("alice", "", 25).unwrap();
        let mut client = ClientHandshake::new(range(13, 23), identity);
        client.start().unwrap();
        let err = client
            .on_message(ToClientMessage::AccessDenied {
                reason: "full".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::AccessDenied(ref r) if r == "full"));
    }
}
