//! Async connection driver.
//!
//! Glues a byte stream to a [`Session`]: frames in, payloads through the
//! session, delivered messages out to the caller or a [`Dispatcher`].
//! Any `AsyncRead + AsyncWrite` works; TCP in production, `tokio::io::duplex`
//! in tests.

use crate::config::ProtocolConfig;
use crate::core::codec::FrameCodec;
use crate::core::field::WireStr;
use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::handshake::{ClientIdentity, WorldParams};
use crate::protocol::message::Message;
use crate::protocol::opcode::ProtocolVersion;
use crate::protocol::session::{Inbound, Role, Session};
use crate::utils::metrics::{global_metrics, Timer};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

pub struct Connection<T> {
    framed: Framed<T, FrameCodec>,
    session: Session,
    handshake_timeout: Duration,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T, session: Session, max_frame_size: usize, handshake_timeout: Duration) -> Self {
        global_metrics().connection_established();
        Self {
            framed: Framed::new(io, FrameCodec::new(max_frame_size)),
            session,
            handshake_timeout,
        }
    }

    /// Server end of an accepted stream. `world.deployed` is capped by the
    /// configured serialization format.
    pub fn server(io: T, config: &ProtocolConfig, world: WorldParams) -> Self {
        let world = WorldParams {
            deployed: world.deployed.min(config.server.deployed_ser_fmt),
            ..world
        };
        let session = Session::server(config.server.versions, world);
        Self::new(
            io,
            session,
            config.limits.max_frame_size,
            config.server.handshake_timeout,
        )
    }

    /// Client end of a connected stream.
    ///
    /// # Errors
    /// `HandshakeError` if the name or password does not fit the wire limits.
    pub fn client(
        io: T,
        config: &ProtocolConfig,
        name: impl Into<String>,
        password: impl Into<WireStr>,
    ) -> Result<Self> {
        let identity = ClientIdentity::new(name, password, config.client.ser_fmt)?;
        let session = Session::client(config.client.versions, identity);
        Ok(Self::new(
            io,
            session,
            config.limits.max_frame_size,
            config.client.handshake_timeout,
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.session.negotiated_version()
    }

    /// Payloads from the peer dropped for hostile length prefixes.
    pub fn hostile_count(&self) -> u32 {
        self.session.hostile_count()
    }

    /// Drive the handshake to completion.
    ///
    /// # Errors
    /// - `HandshakeError` on timeout
    /// - the session's close error (the farewell has been flushed by then)
    /// - `ConnectionClosed` if the peer hangs up
    #[instrument(skip(self), fields(role = ?self.session.role()))]
    pub async fn handshake(&mut self) -> Result<ProtocolVersion> {
        let _timer = Timer::start("handshake");
        let timeout = self.handshake_timeout;
        let version = tokio::time::timeout(timeout, self.drive_handshake())
            .await
            .map_err(|_| {
                warn!(timeout_ms = timeout.as_millis() as u64, "handshake timed out");
                global_metrics().handshake_failed();
                ProtocolError::HandshakeError(constants::ERR_HANDSHAKE_TIMEOUT.to_string())
            })??;
        info!(version, "connection ready");
        Ok(version)
    }

    async fn drive_handshake(&mut self) -> Result<ProtocolVersion> {
        if self.session.role() == Role::Client {
            let init = self.session.start()?;
            self.send_message(&init).await?;
        }

        loop {
            if let Some(version) = self.session.negotiated_version() {
                return Ok(version);
            }
            let payload = self.next_payload().await?;
            match self.session.receive(&payload) {
                Ok(inbound) => {
                    if let Some(msg) = self.process(inbound).await? {
                        debug!(name = msg.name(), "ignoring message delivered during handshake");
                    }
                }
                Err(e) if !e.is_fatal() => warn!(error = %e, "dropping malformed handshake message"),
                Err(e) => return Err(e),
            }
        }
    }

    /// Next message for the application. Malformed messages are skipped.
    ///
    /// # Errors
    /// Fatal session and transport errors; `ConnectionClosed` at end of stream.
    #[instrument(skip(self), level = "debug")]
    pub async fn recv(&mut self) -> Result<Message> {
        loop {
            let payload = self.next_payload().await?;
            match self.session.receive(&payload) {
                Ok(inbound) => {
                    if let Some(msg) = self.process(inbound).await? {
                        return Ok(msg);
                    }
                }
                Err(e) if !e.is_fatal() => {
                    warn!(
                        error = %e,
                        len = payload.len(),
                        flagged = self.session.is_flagged(),
                        "dropping message"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Encode at the session's version and send.
    #[instrument(skip(self, msg), fields(name = msg.name()), level = "debug")]
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        self.send_message(msg).await
    }

    /// Deliver everything the peer sends to `dispatcher` until the stream
    /// ends. Handler errors that do not end the session are logged.
    ///
    /// # Errors
    /// Fatal session and transport errors. A clean end of stream is `Ok`.
    #[instrument(skip(self, dispatcher), fields(role = ?self.session.role()))]
    pub async fn run(&mut self, dispatcher: &Dispatcher) -> Result<()> {
        loop {
            let msg = match self.recv().await {
                Ok(msg) => msg,
                Err(ProtocolError::ConnectionClosed) => {
                    info!("peer closed the connection");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let name = msg.name();
            match dispatcher.dispatch(msg) {
                Ok(outcome) => debug!(name, ?outcome, "dispatched"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(name, error = %e, "handler failed"),
            }
        }
    }

    /// Close the session and flush anything buffered.
    pub async fn close(mut self) -> Result<()> {
        self.session.close();
        <Framed<T, FrameCodec> as SinkExt<Packet>>::close(&mut self.framed).await
    }

    /// Handle one session step. Returns the message to deliver, if any.
    async fn process(&mut self, inbound: Inbound) -> Result<Option<Message>> {
        match inbound {
            Inbound::Handshake(replies) => {
                for reply in &replies {
                    self.send_message(reply).await?;
                }
                Ok(None)
            }
            Inbound::Deliver(msg) => Ok(Some(msg)),
            Inbound::Close { farewell, error } => {
                if let Some(farewell) = farewell {
                    if let Err(e) = self.send_message(&farewell).await {
                        debug!(error = %e, "farewell not delivered");
                    }
                }
                warn!(error = %error, "closing session");
                Err(error)
            }
        }
    }

    async fn send_message(&mut self, msg: &Message) -> Result<()> {
        let payload = self.session.encode(msg)?;
        self.write_payload(payload).await
    }

    async fn write_payload(&mut self, payload: Bytes) -> Result<()> {
        self.framed.send(Packet::new(payload)).await
    }

    async fn next_payload(&mut self) -> Result<Bytes> {
        let packet = self
            .framed
            .next()
            .await
            .ok_or(ProtocolError::ConnectionClosed)??;
        Ok(packet.payload)
    }
}

impl<T> Drop for Connection<T> {
    fn drop(&mut self) {
        global_metrics().connection_closed();
    }
}
