//! WebSocket transport.
//!
//! Owns at most one live connection. Inbound frames are decoded into
//! [`Message`]s and queued in arrival order; the owner drains the queue with
//! [`Transport::poll_events`] on its own thread, so every reducer application
//! happens on a single consumer.

use crate::protocol::Message;
use std::collections::VecDeque;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid WebSocket URL: {0}")]
    InvalidUrl(String),
    #[error("not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced by a transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message(Message),
    Error { message: String },
}

/// A connection to the relay server.
pub trait Transport {
    /// Open a connection to `url`, closing any existing one first.
    fn connect(&mut self, url: &str) -> Result<(), TransportError>;

    /// Close the current connection, if any.
    fn disconnect(&mut self);

    /// Queue a message for sending.
    fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

fn track_state(state: &mut ConnectionState, event: &TransportEvent) {
    match event {
        TransportEvent::Connected => *state = ConnectionState::Connected,
        TransportEvent::Disconnected => *state = ConnectionState::Disconnected,
        TransportEvent::Error { .. } => *state = ConnectionState::Error,
        TransportEvent::Message(_) => {}
    }
}

/// Check that `url` is a `ws://` or `wss://` URL.
pub fn validate_url(url: &str) -> Result<url::Url, TransportError> {
    let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::InvalidUrl(format!("unsupported scheme {other:?}"))),
    }
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{HandshakeError, Message as Frame, WebSocket, client_tls};

    /// Upper bound for the TCP connect and for the WebSocket handshake each.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Read timeout while connected; bounds how long a queued command waits.
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Commands sent to the socket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client backed by a background I/O thread.
    pub struct NativeWebSocket {
        state: ConnectionState,
        url: Option<String>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<TransportEvent>>,
        thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                url: None,
                cmd_tx: None,
                event_rx: None,
                thread: None,
            }
        }

        /// URL of the current connection, if any.
        pub fn url(&self) -> Option<&str> {
            self.url.as_deref()
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    impl Transport for NativeWebSocket {
        fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            validate_url(url)?;
            if self.cmd_tx.is_some() {
                log::info!("closing connection to {:?} before opening {url}", self.url);
                self.disconnect();
            }

            self.state = ConnectionState::Connecting;
            self.url = Some(url.to_string());

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<TransportEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || run_socket(url, cmd_rx, event_tx));

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self.thread = Some(handle);
            Ok(())
        }

        /// Close the connection and wait for the socket thread to exit, so
        /// the old socket is gone before any new one is opened.
        fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            if let Some(handle) = self.thread.take() {
                if handle.join().is_err() {
                    log::error!("socket thread panicked");
                }
            }
            self.event_rx = None;
            self.url = None;
            self.state = ConnectionState::Disconnected;
        }

        fn send(&mut self, message: &Message) -> Result<(), TransportError> {
            let Some(tx) = &self.cmd_tx else {
                return Err(TransportError::NotConnected);
            };
            tx.send(WsCommand::Send(message.encode()))
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            let mut events = Vec::new();
            if let Some(rx) = &self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    track_state(&mut self.state, &event);
                    events.push(event);
                }
            }
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    fn snippet(text: &str, max_chars: usize) -> String {
        text.chars().take(max_chars).collect()
    }

    type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

    /// TCP connect plus WebSocket handshake, each bounded by
    /// [`CONNECT_TIMEOUT`].
    fn open(url: &str) -> Result<Socket, String> {
        let parsed = validate_url(url).map_err(|e| e.to_string())?;
        let addrs = parsed
            .socket_addrs(|| None)
            .map_err(|e| format!("cannot resolve {url}: {e}"))?;

        let mut last_error = format!("no addresses for {url}");
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(tcp) => {
                    stream = Some(tcp);
                    break;
                }
                Err(e) => last_error = format!("{addr}: {e}"),
            }
        }
        let stream = stream.ok_or(last_error)?;
        stream
            .set_read_timeout(Some(CONNECT_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(CONNECT_TIMEOUT)))
            .map_err(|e| e.to_string())?;

        match client_tls(url, stream) {
            Ok((socket, response)) => {
                log::info!("WebSocket connected, status: {}", response.status());
                Ok(socket)
            }
            Err(HandshakeError::Interrupted(_)) => Err("handshake timed out".to_string()),
            Err(HandshakeError::Failure(e)) => Err(e.to_string()),
        }
    }

    fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
        log::info!("socket thread: connecting to {url}");

        let mut socket = match open(&url) {
            Ok(socket) => socket,
            Err(e) => {
                log::error!("WebSocket connection failed: {e}");
                let _ = event_tx.send(TransportEvent::Error {
                    message: format!("Connection failed: {e}"),
                });
                return;
            }
        };
        let _ = event_tx.send(TransportEvent::Connected);

        // Short read timeouts keep the loop responsive to outgoing commands.
        match socket.get_mut() {
            MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(POLL_INTERVAL));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("non-plain stream, relying on default timeouts"),
        }

        loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(text)) => {
                        log::trace!("sending {}", snippet(&text, 100));
                        if let Err(e) = socket.send(Frame::Text(text)) {
                            log::error!("WebSocket send error: {e}");
                            let _ = event_tx.send(TransportEvent::Error {
                                message: format!("Send failed: {e}"),
                            });
                            let _ = event_tx.send(TransportEvent::Disconnected);
                            return;
                        }
                    }
                    Ok(WsCommand::Close) => {
                        log::info!("WebSocket close requested");
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        return;
                    }
                    Err(TryRecvError::Disconnected) => {
                        log::info!("command channel closed, dropping socket");
                        let _ = socket.close(None);
                        return;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match socket.read() {
                Ok(Frame::Text(text)) => match Message::decode(&text) {
                    Ok(message) => {
                        if event_tx.send(TransportEvent::Message(message)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        log::warn!("dropping malformed message ({e}): {}", snippet(&text, 200));
                    }
                },
                Ok(Frame::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                // Pings are answered by tungstenite on the next write/flush.
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    let _ = socket.flush();
                }
                Err(e) => {
                    log::error!("WebSocket read error: {e}");
                    let _ = event_tx.send(TransportEvent::Error {
                        message: format!("Connection lost: {e}"),
                    });
                    break;
                }
            }
        }

        log::info!("socket thread exiting");
        let _ = event_tx.send(TransportEvent::Disconnected);
    }
}

pub use native_client::NativeWebSocket;

// ============================================================================
// In-memory transport
// ============================================================================

/// Transport that never touches the network.
///
/// Sent messages are recorded and inbound events are injected by the caller,
/// which makes it suitable for tests and offline replays.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    state: ConnectionState,
    url: Option<String>,
    inbox: VecDeque<TransportEvent>,
    /// Every message sent while connected, oldest first.
    pub sent: Vec<Message>,
    /// Number of times a previous connection was closed by `connect`.
    pub replaced_connections: usize,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Queue an inbound event.
    pub fn inject(&mut self, event: TransportEvent) {
        self.inbox.push_back(event);
    }

    /// Queue an inbound message.
    pub fn inject_message(&mut self, message: Message) {
        self.inject(TransportEvent::Message(message));
    }

    /// Queue a raw text frame, dropping it like the socket thread would if
    /// it does not decode.
    pub fn inject_text(&mut self, text: &str) {
        match Message::decode(text) {
            Ok(message) => self.inject_message(message),
            Err(e) => log::warn!("dropping malformed message ({e})"),
        }
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self, url: &str) -> Result<(), TransportError> {
        validate_url(url)?;
        if self.url.is_some() {
            self.disconnect();
            self.replaced_connections += 1;
        }
        self.url = Some(url.to_string());
        self.state = ConnectionState::Connecting;
        self.inbox.push_back(TransportEvent::Connected);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.url = None;
        self.inbox.clear();
        self.state = ConnectionState::Disconnected;
    }

    fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(message.clone());
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let events: Vec<_> = self.inbox.drain(..).collect();
        for event in &events {
            track_state(&mut self.state, event);
        }
        events
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("ws://localhost:3030/ws/room").is_ok());
        assert!(validate_url("wss://example.com/ws").is_ok());
        assert!(matches!(
            validate_url("http://example.com"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_native_rejects_bad_url_without_spawning() {
        let mut ws = NativeWebSocket::new();
        assert!(ws.connect("ftp://nope").is_err());
        assert_eq!(ws.state(), ConnectionState::Disconnected);
        assert_eq!(ws.send(&Message::UndoStroke), Err(TransportError::NotConnected));
    }

    fn wait_until_connected(ws: &mut NativeWebSocket) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if ws.poll_events().contains(&TransportEvent::Connected) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        panic!("no Connected event from {:?}", ws.url());
    }

    #[test]
    fn test_native_reconnect_closes_old_socket_first() {
        use std::net::TcpListener;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let open = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        {
            let open = open.clone();
            let peak = peak.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    let open = open.clone();
                    let peak = peak.clone();
                    std::thread::spawn(move || {
                        let Ok(mut socket) = tungstenite::accept(stream) else {
                            return;
                        };
                        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        loop {
                            match socket.read() {
                                Ok(tungstenite::Message::Close(_)) | Err(_) => break,
                                Ok(_) => {}
                            }
                        }
                        open.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            });
        }

        let url = format!("ws://{addr}/ws/room");
        let mut ws = NativeWebSocket::new();
        for _ in 0..10 {
            ws.connect(&url).unwrap();
            wait_until_connected(&mut ws);
            assert_eq!(ws.state(), ConnectionState::Connected);
        }
        ws.disconnect();
        assert_eq!(ws.state(), ConnectionState::Disconnected);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_native_reports_refused_connection() {
        // Bind then drop to get a port nobody listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let mut ws = NativeWebSocket::new();
        ws.connect(&format!("ws://{addr}/ws/room")).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        let mut failed = false;
        while !failed && std::time::Instant::now() < deadline {
            failed = ws
                .poll_events()
                .iter()
                .any(|event| matches!(event, TransportEvent::Error { .. }));
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!(failed);
        ws.disconnect();
    }

    #[test]
    fn test_loopback_delivers_in_order() {
        let mut transport = LoopbackTransport::new();
        transport.connect("ws://localhost/ws/a").unwrap();
        transport.inject_message(Message::UndoStroke);
        transport.inject_text(r#"{"type":"CLEAR_STROKES"}"#);
        transport.inject_text("garbage");

        let events = transport.poll_events();
        assert_eq!(
            events,
            vec![
                TransportEvent::Connected,
                TransportEvent::Message(Message::UndoStroke),
                TransportEvent::Message(Message::ClearStrokes),
            ]
        );
        assert!(transport.is_connected());
    }

    #[test]
    fn test_loopback_send_requires_connection() {
        let mut transport = LoopbackTransport::new();
        assert_eq!(transport.send(&Message::GetState), Err(TransportError::NotConnected));
        transport.connect("ws://localhost/ws/a").unwrap();
        transport.poll_events();
        transport.send(&Message::GetState).unwrap();
        assert_eq!(transport.sent, vec![Message::GetState]);
    }

    #[test]
    fn test_loopback_reconnect_replaces_connection() {
        let mut transport = LoopbackTransport::new();
        transport.connect("ws://localhost/ws/a").unwrap();
        transport.inject_message(Message::UndoStroke);
        transport.connect("ws://localhost/ws/b").unwrap();
        assert_eq!(transport.replaced_connections, 1);
        assert_eq!(transport.url(), Some("ws://localhost/ws/b"));
        // Events from the old connection never surface.
        assert_eq!(transport.poll_events(), vec![TransportEvent::Connected]);
    }
}
