//! Per-connection protocol state.
//!
//! A [`Session`] owns one side's handshake, the negotiated version once there
//! is one, and the rule that nothing but handshake traffic may pass before
//! that. It is transport-agnostic: feed it payloads, get back what to deliver
//! and what to send.
//!
//! Sessions are single-owner. Every method takes `&mut self` or `&self`; two
//! payloads for one session are never handled concurrently.

use crate::error::{ProtocolError, Result};
use crate::protocol::codec;
use crate::protocol::handshake::{
    ClientHandshake, ClientIdentity, ServerHandshake, ServerStep, VersionRange, WorldParams,
};
use crate::protocol::message::Message;
use crate::protocol::opcode::{Direction, ProtocolVersion};
use crate::protocol::registry::registry;
use crate::utils::metrics::global_metrics;
use bytes::Bytes;
use tracing::{debug, warn};

/// Which end of the connection this session speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// Direction of traffic this side receives.
    pub fn incoming(self) -> Direction {
        match self {
            Role::Server => Direction::ToServer,
            Role::Client => Direction::ToClient,
        }
    }

    /// Direction of traffic this side sends.
    pub fn outgoing(self) -> Direction {
        self.incoming().reverse()
    }
}

/// Result of feeding one payload to a session.
#[derive(Debug)]
pub enum Inbound {
    /// Handshake progressed. Send the replies, in order.
    Handshake(Vec<Message>),
    /// A message for the dispatcher.
    Deliver(Message),
    /// The session is over. Send the farewell if any, then close.
    Close {
        farewell: Option<Message>,
        error: ProtocolError,
    },
}

#[derive(Debug)]
enum Negotiator {
    Server(ServerHandshake),
    Client(ClientHandshake),
}

#[derive(Debug)]
pub struct Session {
    negotiator: Negotiator,
    version: Option<ProtocolVersion>,
    world: Option<WorldParams>,
    closed: bool,
    hostile: u32,
}

impl Session {
    pub fn server(range: VersionRange, world: WorldParams) -> Self {
        global_metrics().handshake_attempt();
        Self {
            negotiator: Negotiator::Server(ServerHandshake::new(range, world)),
            version: None,
            world: None,
            closed: false,
            hostile: 0,
        }
    }

    pub fn client(range: VersionRange, identity: ClientIdentity) -> Self {
        global_metrics().handshake_attempt();
        Self {
            negotiator: Negotiator::Client(ClientHandshake::new(range, identity)),
            version: None,
            world: None,
            closed: false,
            hostile: 0,
        }
    }

    pub fn role(&self) -> Role {
        match self.negotiator {
            Negotiator::Server(_) => Role::Server,
            Negotiator::Client(_) => Role::Client,
        }
    }

    pub fn range(&self) -> VersionRange {
        match &self.negotiator {
            Negotiator::Server(hs) => hs.range(),
            Negotiator::Client(hs) => hs.range(),
        }
    }

    /// Negotiated version. Set once, never changes.
    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn is_negotiated(&self) -> bool {
        self.version.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Payloads from this peer dropped for a length or count prefix that
    /// overran the payload.
    pub fn hostile_count(&self) -> u32 {
        self.hostile
    }

    /// Whether the peer has sent at least one hostile payload.
    pub fn is_flagged(&self) -> bool {
        self.hostile > 0
    }

    /// World parameters announced by the server (client side only).
    pub fn world(&self) -> Option<&WorldParams> {
        self.world.as_ref()
    }

    /// Player name accepted by the server (server side only).
    pub fn player_name(&self) -> Option<&str> {
        match &self.negotiator {
            Negotiator::Server(hs) => hs.player_name(),
            Negotiator::Client(_) => None,
        }
    }

    /// Stop accepting traffic.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Client only: the opening `Init`.
    ///
    /// # Errors
    /// `HandshakeError` on a server session or when called twice.
    pub fn start(&mut self) -> Result<Message> {
        match &mut self.negotiator {
            Negotiator::Client(hs) => Ok(hs.start()?.into()),
            Negotiator::Server(_) => Err(ProtocolError::HandshakeError(
                "Only the client opens the handshake".into(),
            )),
        }
    }

    /// Version used for handshake payloads.
    ///
    /// Handshake shapes do not vary with the version, so before negotiation the
    /// top of the local window is used.
    fn handshake_version(&self) -> ProtocolVersion {
        match &self.negotiator {
            Negotiator::Server(hs) => hs.chosen_version().unwrap_or(hs.range().max),
            Negotiator::Client(hs) => hs.range().max,
        }
    }

    /// Feed one payload received from the peer.
    ///
    /// # Errors
    /// Per-message decode errors (`TruncatedMessage`, `InvalidLength`,
    /// `UnknownOpcode`) are returned as `Err`; the session stays usable.
    /// `InvalidLength` also flags the session, see [`Session::hostile_count`].
    /// `SessionClosed` once the session has closed.
    pub fn receive(&mut self, payload: &[u8]) -> Result<Inbound> {
        if self.closed {
            return Err(ProtocolError::SessionClosed);
        }

        let direction = self.role().incoming();
        if let Some(version) = self.version {
            let msg = self.decode(payload, direction, version)?;
            global_metrics().message_received(payload.len() as u64);
            return Ok(Inbound::Deliver(msg));
        }

        let opcode = codec::peek_opcode(payload)?;
        if !registry().is_handshake(direction, opcode) {
            warn!(%opcode, "traffic before the handshake completed");
            return Ok(self.fail(None, ProtocolError::PrematureMessage { opcode }));
        }

        let msg = self.decode(payload, direction, self.handshake_version())?;
        debug!(name = msg.name(), "handshake message");
        Ok(self.advance(msg))
    }

    fn decode(
        &mut self,
        payload: &[u8],
        direction: Direction,
        version: ProtocolVersion,
    ) -> Result<Message> {
        codec::decode(payload, direction, version).map_err(|e| {
            let hostile = e.is_hostile();
            if hostile {
                self.hostile = self.hostile.saturating_add(1);
                warn!(error = %e, count = self.hostile, "hostile payload from peer");
            }
            global_metrics().message_dropped(hostile);
            e
        })
    }

    fn advance(&mut self, msg: Message) -> Inbound {
        match (&mut self.negotiator, msg) {
            (Negotiator::Server(hs), Message::ToServer(msg)) => match hs.on_message(msg) {
                Ok(ServerStep::Reply(reply)) => Inbound::Handshake(vec![reply.into()]),
                Ok(ServerStep::Negotiated(version)) => {
                    self.negotiated(version);
                    Inbound::Handshake(Vec::new())
                }
                Ok(ServerStep::Deny { farewell, error }) => self.fail(Some(farewell.into()), error),
                Err(error) => self.fail(None, error),
            },
            (Negotiator::Client(hs), Message::ToClient(msg)) => match hs.on_message(msg) {
                Ok(accepted) => {
                    self.negotiated(accepted.version);
                    self.world = Some(accepted.world);
                    Inbound::Handshake(vec![accepted.ack.into()])
                }
                Err(error) => self.fail(None, error),
            },
            _ => self.fail(None, ProtocolError::UnexpectedMessage),
        }
    }

    fn negotiated(&mut self, version: ProtocolVersion) {
        self.version = Some(version);
        global_metrics().handshake_success();
    }

    fn fail(&mut self, farewell: Option<Message>, error: ProtocolError) -> Inbound {
        self.closed = true;
        if self.version.is_none() {
            global_metrics().handshake_failed();
        }
        global_metrics().protocol_error();
        Inbound::Close { farewell, error }
    }

    /// Encode an outgoing message at the session's version.
    ///
    /// Before negotiation only handshake-class messages may be encoded.
    ///
    /// # Errors
    /// - `SessionClosed` after close, except for the farewell itself
    /// - `PrematureMessage` for gameplay traffic before negotiation
    /// - `UnexpectedMessage` for a message of the wrong direction
    /// - any error of [`codec::encode`]
    pub fn encode(&self, msg: &Message) -> Result<Bytes> {
        let role = self.role();
        if msg.direction() != role.outgoing() {
            return Err(ProtocolError::UnexpectedMessage);
        }
        let handshake = registry().is_handshake(msg.direction(), msg.opcode());
        if self.closed && !handshake {
            return Err(ProtocolError::SessionClosed);
        }

        let version = match self.version {
            Some(version) => version,
            None if handshake => self.handshake_version(),
            None => return Err(ProtocolError::PrematureMessage { opcode: msg.opcode() }),
        };
        let bytes = codec::encode(msg, version)?;
        global_metrics().message_sent(bytes.len() as u64);
        Ok(bytes)
    }
}
