//! WebSocket sessions.
//!
//! One task per socket reads inbound frames and hands them to the relay; a
//! second task drains the session's frame channel into the socket. The
//! session ends when the peer closes, the socket errors, or the relay drops
//! the channel (shutdown), and is always deregistered on the way out.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use dkm_orders::Relay;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::state::AppState;

/// GET /ws
pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(st): State<Arc<AppState>>) -> Response {
    let relay = Arc::clone(&st.relay);
    ws.on_upgrade(move |socket| session(socket, relay))
}

pub async fn session(socket: WebSocket, relay: Arc<Relay>) {
    let (mut sink, mut stream) = socket.split();
    let (conn, mut rx) = relay.connect().await;

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                return;
            }
        }
        // Channel closed by the relay.
        let _ = sink.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => relay.handle_text(&conn, &text).await,
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => relay.handle_text(&conn, text).await,
                        Err(e) => warn!(conn = %conn, error = %e, "binary frame is not utf-8"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(conn = %conn, "peer closed socket");
                        break;
                    }
                    // Ping/pong are answered by the websocket layer.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn = %conn, error = %e, "websocket error");
                        break;
                    }
                }
            }
            _ = &mut send_task => break,
        }
    }

    relay.disconnect(&conn).await;
    send_task.abort();
}
