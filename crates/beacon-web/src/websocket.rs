//! WebSocket handler for real-time updates.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use beacon_core::{session::run_session, BeaconError, BeaconResult, Connection, Inbound, Outbound};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::state::AppState;

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame without a status.
const NO_STATUS: u16 = 1005;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Handle individual WebSocket connection.
async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (sender, receiver) = socket.split();

    let connection = Connection::new(peer.to_string(), WsOutbound::new(sender));
    state.registry.add(connection.clone());

    run_session(connection, WsInbound::new(receiver), &state.registry).await;
}

/// Write half of an axum WebSocket.
pub struct WsOutbound {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsOutbound {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Outbound for WsOutbound {
    async fn send_text(&self, text: &str) -> BeaconResult<()> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| BeaconError::transmit(e.to_string()))
    }

    async fn close(&self, code: u16, reason: &str) -> BeaconResult<()> {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        self.sink
            .lock()
            .await
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| BeaconError::transmit(e.to_string()))
    }
}

/// Read half of an axum WebSocket.
pub struct WsInbound {
    stream: SplitStream<WebSocket>,
}

impl WsInbound {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl Inbound for WsInbound {
    async fn receive_text(&mut self) -> BeaconResult<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    debug!("WebSocket client sent close frame");
                    let (code, reason) = frame
                        .map(|f| (f.code, f.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                    return Err(BeaconError::disconnected(code, reason));
                }
                // Pings are answered by axum; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(BeaconError::Receive(e.to_string())),
                None => {
                    return Err(BeaconError::disconnected(ABNORMAL_CLOSURE, "stream ended"));
                }
            }
        }
    }
}
