//! Opcode routing for negotiated traffic.
//!
//! Handlers are keyed by `(Direction, Opcode)` because opcode values repeat
//! across the two namespaces. Messages from the retired set that nobody
//! registered for are dropped quietly; they never reach the fallback.

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::Message;
use crate::protocol::opcode::{Direction, Opcode};
use crate::utils::metrics::global_metrics;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

type HandlerFn = dyn Fn(Message) -> Result<()> + Send + Sync + 'static;

/// What happened to a dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler registered for the opcode ran.
    Handled,
    /// No handler; the fallback ran.
    Fallback,
    /// Nobody took it.
    Dropped,
}

/// Shared routing table. Cheap to clone; clones see the same handlers.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<(Direction, Opcode), Box<HandlerFn>>>>,
    fallback: Arc<RwLock<Option<Box<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.handlers.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("Dispatcher").field("routes", &routes).finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            fallback: Arc::new(RwLock::new(None)),
        }
    }

    /// Route `opcode` in `direction` to `handler`, replacing any previous one.
    pub fn register<F>(&self, direction: Direction, opcode: Opcode, handler: F) -> Result<()>
    where
        F: Fn(Message) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        handlers.insert((direction, opcode), Box::new(handler));
        Ok(())
    }

    /// Handler for active messages nobody registered for.
    pub fn set_fallback<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Message) -> Result<()> + Send + Sync + 'static,
    {
        let mut fallback = self
            .fallback
            .write()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        *fallback = Some(Box::new(handler));
        Ok(())
    }

    /// Route one message.
    ///
    /// # Errors
    /// Whatever the chosen handler returns, or a poisoned lock.
    pub fn dispatch(&self, msg: Message) -> Result<Dispatch> {
        let key = (msg.direction(), msg.opcode());

        {
            let handlers = self
                .handlers
                .read()
                .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;
            if let Some(handler) = handlers.get(&key) {
                handler(msg)?;
                return Ok(Dispatch::Handled);
            }
        }

        if msg.is_retired() {
            warn!(opcode = %key.1, name = msg.name(), "dropping obsolete message");
            global_metrics().obsolete_drop();
            return Ok(Dispatch::Dropped);
        }

        let fallback = self
            .fallback
            .read()
            .map_err(|_| ProtocolError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;
        match fallback.as_ref() {
            Some(handler) => {
                handler(msg)?;
                Ok(Dispatch::Fallback)
            }
            None => {
                debug!(direction = ?key.0, opcode = %key.1, name = msg.name(), "no handler");
                Ok(Dispatch::Dropped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{LegacyMessage, ToClientMessage, ToServerMessage};
    use crate::protocol::opcode::{legacy, to_client, to_server};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_registered_handler_receives_message() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        dispatcher
            .register(Direction::ToClient, to_client::HP, move |msg| {
                assert_eq!(msg, Message::from(ToClientMessage::Hp { hp: 3 }));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let outcome = dispatcher.dispatch(ToClientMessage::Hp { hp: 3 }.into()).unwrap();
        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let dispatcher = Dispatcher::new();
        // 0x31 is InventoryAction to the server and ActiveObjectRemoveAdd to the client.
        dispatcher
            .register(Direction::ToServer, to_server::INVENTORY_ACTION, |_| Ok(()))
            .unwrap();
        let outcome = dispatcher
            .dispatch(
                ToClientMessage::ActiveObjectRemoveAdd {
                    removed: vec![],
                    added: vec![],
                }
                .into(),
            )
            .unwrap();
        assert_eq!(outcome, Dispatch::Dropped);
    }

    #[test]
    fn test_fallback_catches_unregistered() {
        let dispatcher = Dispatcher::new();
        dispatcher.set_fallback(|_| Ok(())).unwrap();
        let outcome = dispatcher.dispatch(ToServerMessage::Respawn.into()).unwrap();
        assert_eq!(outcome, Dispatch::Fallback);
    }

    #[test]
    fn test_obsolete_skips_fallback() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .set_fallback(|_| Err(ProtocolError::Custom("fallback ran".into())))
            .unwrap();
        let msg = LegacyMessage::SignNodeText {
            pos: [1, 2, 3],
            text: "hello".into(),
        };
        assert_eq!(dispatcher.dispatch(msg.into()).unwrap(), Dispatch::Dropped);
    }

    #[test]
    fn test_obsolete_can_still_be_registered() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register(Direction::ToServer, legacy::SIGNNODETEXT, |_| Ok(()))
            .unwrap();
        let msg = LegacyMessage::SignNodeText {
            pos: [0, 0, 0],
            text: String::new().into(),
        };
        assert_eq!(dispatcher.dispatch(msg.into()).unwrap(), Dispatch::Handled);
    }

    #[test]
    fn test_handler_error_propagates() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register(Direction::ToServer, to_server::RESPAWN, |_| {
                Err(ProtocolError::Custom("boom".into()))
            })
            .unwrap();
        assert!(dispatcher.dispatch(ToServerMessage::Respawn.into()).is_err());
    }
}
