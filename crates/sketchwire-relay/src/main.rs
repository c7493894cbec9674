//! sketchwire relay server
//!
//! Development relay for the drawing canvas. Clients connect to
//! `/ws/{room}`; every frame is folded into the room's canvas and forwarded
//! to the other peers in the room.
//!
//! ## Protocol
//!
//! Frames are JSON envelopes:
//! ```json
//! { "type": "STROKE", "payload": { "color": "#ff0000", "width": 8, "points": [[10, 20]] } }
//! { "type": "STROKE_POINT", "payload": [12, 24] }
//! { "type": "GET_STATE" }
//! ```

mod room;

use axum::{
    Router,
    extract::{
        Path, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use room::{Relay, Rooms};
use sketchwire_core::Message;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3030")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchwire_relay=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let rooms = Arc::new(Rooms::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws/{room}", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(rooms);

    info!("sketchwire relay listening on {}", args.addr);
    info!("WebSocket endpoint: ws://{}/ws/<room>", args.addr);

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, app).await
}

async fn index() -> &'static str {
    "sketchwire relay - connect via WebSocket at /ws/<room>"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(rooms): State<Arc<Rooms>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, room, rooms))
}

fn frame(message: &Message) -> WsMessage {
    WsMessage::Text(message.encode().into())
}

async fn next_relay(rx: &mut broadcast::Receiver<Relay>, peer_id: &str) -> Option<Relay> {
    loop {
        match rx.recv().await {
            Ok(relay) => return Some(relay),
            Err(RecvError::Lagged(skipped)) => {
                // The peer's canvas is now stale; it can recover with GET_STATE.
                warn!("peer {peer_id} lagged, {skipped} frames dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn handle_socket(socket: WebSocket, room: String, rooms: Arc<Rooms>) {
    let peer_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (mut rx, snapshot) = rooms.join(&room, &peer_id);
    info!(
        "peer {peer_id} joined room {room} ({} peers)",
        rooms.peer_count(&room)
    );

    if sender.send(frame(&snapshot)).await.is_err() {
        rooms.leave(&room, &peer_id);
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(reply) = rooms.handle(&room, &peer_id, text.as_str()) {
                            if let Message::Error { message } = &reply {
                                warn!("invalid frame from {peer_id}: {message}");
                            }
                            if sender.send(frame(&reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        let reply = Message::Error { message: "binary frames are not supported".to_string() };
                        if sender.send(frame(&reply)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {peer_id}: {e}");
                        break;
                    }
                }
            }

            relay = next_relay(&mut rx, &peer_id) => {
                let Some(relay) = relay else { break };
                // Don't echo back to sender
                if relay.from != peer_id
                    && sender.send(WsMessage::Text(relay.text.into())).await.is_err()
                {
                    break;
                }
            }
        }
    }

    rooms.leave(&room, &peer_id);
    info!(
        "peer {peer_id} left room {room} ({} peers)",
        rooms.peer_count(&room)
    );
}
