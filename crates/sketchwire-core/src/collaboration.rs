//! Bridge between the transport and the local canvas.
//!
//! Inbound transport events become ordered, server-confirmed dispatches plus
//! user-facing notifications; local (unconfirmed) dispatches become outbound
//! messages.

use crate::event::Dispatch;
use crate::protocol::Message;
use crate::sync::TransportEvent;

/// Connection lifecycle changes worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Connected,
    /// Connected again after losing a connection; a snapshot was requested.
    Reconnected,
    Disconnected,
    ConnectionError(String),
    /// The server sent an explicit `error` message.
    ServerError(String),
}

/// One step of inbound processing, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Dispatch(Dispatch),
    Notify(Notification),
}

/// Tracks the session's connection history and the outbound queue.
#[derive(Debug, Default)]
pub struct CollaborationManager {
    /// Whether a connection was ever established in this session.
    ever_connected: bool,
    /// Pending outgoing messages.
    outgoing: Vec<Message>,
}

impl CollaborationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the connection history (a fresh session).
    pub fn reset(&mut self) {
        self.ever_connected = false;
        self.outgoing.clear();
    }

    /// Translate a transport event into dispatches and notifications.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Vec<Inbound> {
        match event {
            TransportEvent::Connected => {
                if self.ever_connected {
                    log::info!("reconnected, requesting canvas snapshot");
                    self.outgoing.push(Message::GetState);
                    vec![Inbound::Notify(Notification::Reconnected)]
                } else {
                    self.ever_connected = true;
                    log::info!("connected");
                    vec![Inbound::Notify(Notification::Connected)]
                }
            }
            TransportEvent::Disconnected => {
                log::info!("disconnected; keeping last known canvas");
                vec![Inbound::Notify(Notification::Disconnected)]
            }
            TransportEvent::Error { message } => {
                log::warn!("connection error: {message}");
                vec![Inbound::Notify(Notification::ConnectionError(message))]
            }
            TransportEvent::Message(Message::Error { message }) => {
                log::warn!("server error: {message}");
                vec![Inbound::Notify(Notification::ServerError(message))]
            }
            TransportEvent::Message(Message::GetState) => {
                log::debug!("ignoring GET_STATE addressed to a client");
                Vec::new()
            }
            TransportEvent::Message(message) => message
                .into_events()
                .into_iter()
                .map(|event| Inbound::Dispatch(Dispatch::remote(event)))
                .collect(),
        }
    }

    /// Queue the outbound message for a dispatch that the server has not seen.
    pub fn queue_local(&mut self, dispatch: &Dispatch) {
        if dispatch.confirmed {
            return;
        }
        if let Some(message) = Message::from_event(&dispatch.event) {
            self.outgoing.push(message);
        }
    }

    /// Take all pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }
}
