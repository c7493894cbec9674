//! Per-room canvas state and fan-out.

use dashmap::DashMap;
use sketchwire_core::{CanvasState, Message};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

/// An encoded frame relayed to every peer of a room except its sender.
#[derive(Debug, Clone)]
pub struct Relay {
    pub from: String,
    pub text: String,
}

/// What to do with one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send to every other peer in the room.
    Broadcast(Message),
    /// Answer the sender only.
    Reply(Message),
    Ignore,
}

/// A drawing room: the authoritative canvas plus its broadcast channel.
pub struct Room {
    tx: broadcast::Sender<Relay>,
    peers: HashSet<String>,
    canvas: CanvasState,
}

impl Room {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            canvas: CanvasState::new(),
        }
    }

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// `STATE` message holding every element.
    pub fn snapshot(&self) -> Message {
        Message::State {
            elements: self.canvas.elements.clone(),
        }
    }

    /// Decode a client frame, fold it into the room canvas and decide who
    /// hears about it.
    pub fn handle_text(&mut self, text: &str) -> Outcome {
        let message = match Message::decode(text) {
            Ok(message) => message,
            Err(e) => {
                return Outcome::Reply(Message::Error {
                    message: format!("invalid message: {e}"),
                });
            }
        };

        match message {
            Message::GetState => Outcome::Reply(self.snapshot()),
            Message::Error { message } => {
                debug!("client reported error: {message}");
                Outcome::Ignore
            }
            Message::Unknown { kind } => Outcome::Reply(Message::Error {
                message: format!("unsupported message type {kind}"),
            }),
            message => {
                for event in message.clone().into_events() {
                    if !self.canvas.apply(&event) {
                        debug!("{} did not change room canvas", event.name());
                    }
                }
                Outcome::Broadcast(message)
            }
        }
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

/// All live rooms.
#[derive(Default)]
pub struct Rooms {
    rooms: DashMap<String, Room>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `peer_id` to `room_id`, creating the room if needed. Returns the
    /// room subscription and the snapshot to greet the peer with.
    pub fn join(&self, room_id: &str, peer_id: &str) -> (broadcast::Receiver<Relay>, Message) {
        let mut room = self.rooms.entry(room_id.to_string()).or_default();
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.snapshot())
    }

    /// Remove `peer_id`; empty rooms are dropped along with their canvas.
    pub fn leave(&self, room_id: &str, peer_id: &str) {
        let empty = match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.peers.remove(peer_id);
                room.peers.is_empty()
            }
            None => return,
        };
        if empty {
            self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
        }
    }

    /// Apply a frame under the room lock and fan it out. Returns the reply
    /// owed to the sender, if any.
    pub fn handle(&self, room_id: &str, peer_id: &str, text: &str) -> Option<Message> {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            warn!("frame for unknown room {room_id}");
            return None;
        };
        match room.handle_text(text) {
            Outcome::Broadcast(message) => {
                // No receivers is fine: the sender may be alone.
                let _ = room.tx.send(Relay {
                    from: peer_id.to_string(),
                    text: message.encode(),
                });
                None
            }
            Outcome::Reply(message) => Some(message),
            Outcome::Ignore => None,
        }
    }

    /// Peers currently in `room_id`.
    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peer_count())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketchwire_core::{Element, Rgb};

    const STROKE: &str =
        r##"{"type":"STROKE","payload":{"color":"#ff0000","width":4,"points":[[1,2]]}}"##;

    #[test]
    fn test_events_update_room_canvas() {
        let mut room = Room::new();
        assert!(matches!(room.handle_text(STROKE), Outcome::Broadcast(_)));
        room.handle_text(r#"{"type":"STROKE_POINT","payload":[3,4]}"#);
        assert_eq!(room.canvas().len(), 1);
        match &room.canvas().elements[0] {
            Element::Stroke(stroke) => {
                assert_eq!(stroke.color, Rgb::new(255, 0, 0));
                assert_eq!(stroke.points.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }

        room.handle_text(r#"{"type":"UNDO_STROKE"}"#);
        assert!(room.canvas().is_empty());
    }

    #[test]
    fn test_get_state_replies_with_snapshot() {
        let mut room = Room::new();
        room.handle_text(STROKE);
        match room.handle_text(r#"{"type":"GET_STATE"}"#) {
            Outcome::Reply(Message::State { elements }) => assert_eq!(elements.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_invalid_frames_get_error_reply() {
        let mut room = Room::new();
        for text in [
            "nope",
            r#"{"type":"STROKE","payload":{"color":"red","width":4,"points":[[1,2]]}}"#,
            r#"{"type":"DANCE"}"#,
        ] {
            assert!(
                matches!(room.handle_text(text), Outcome::Reply(Message::Error { .. })),
                "{text}"
            );
        }
        assert!(room.canvas().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_other_peers() {
        let rooms = Rooms::new();
        let (mut rx_a, _) = rooms.join("r", "a");
        let (mut rx_b, snapshot) = rooms.join("r", "b");
        assert_eq!(snapshot, Message::State { elements: Vec::new() });

        assert!(rooms.handle("r", "a", STROKE).is_none());
        let relay = rx_b.recv().await.unwrap();
        assert_eq!(relay.from, "a");
        assert_eq!(Message::decode(&relay.text).unwrap(), Message::decode(STROKE).unwrap());
        // The sender's own subscription sees it too; the socket loop filters it.
        assert_eq!(rx_a.recv().await.unwrap().from, "a");

        let (_, snapshot) = rooms.join("r", "c");
        match snapshot {
            Message::State { elements } => assert_eq!(elements.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_rooms_are_dropped() {
        let rooms = Rooms::new();
        let _a = rooms.join("r", "a");
        let _b = rooms.join("r", "b");
        assert_eq!(rooms.peer_count("r"), 2);
        rooms.leave("r", "a");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms.peer_count("r"), 1);
        rooms.leave("r", "b");
        assert!(rooms.is_empty());
        assert_eq!(rooms.peer_count("r"), 0);
        assert!(rooms.handle("r", "a", STROKE).is_none());
    }
}
