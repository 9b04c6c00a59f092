use std::sync::Arc;

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tracing::debug,
};

use crate::state::GatewayState;

/// Connection lifecycle. Only `Authorized` peers receive broadcasts; every
/// path terminates in `Closed` and removal from the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Connected,
    Authorized,
    Closed,
}

/// Drive one WebSocket connection.
///
/// The upgrade is accepted unconditionally; the first data frame must be
/// the raw signed token (no `Bearer ` prefix). An invalid token closes the
/// connection. After authorization the server only pushes broadcast text
/// frames; inbound frames are drained but not interpreted. There is no
/// handshake timeout: a client may hold the connection open without ever
/// sending the token.
pub async fn handle_socket(mut socket: WebSocket, state: Arc<GatewayState>) {
    debug!(state = ?SocketState::Connected, "websocket open");

    let Some(token) = read_auth_frame(&mut socket).await else {
        debug!(state = ?SocketState::Closed, "websocket closed before authorization");
        return;
    };

    if !state.auth.is_authorized(&token) {
        debug!(state = ?SocketState::Closed, "websocket rejected: invalid token");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.hub.add(tx);
    debug!(conn_id, state = ?SocketState::Authorized, "websocket authorized");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(text) = outbound else { break };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    // Accepted by the transport, not interpreted here.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.remove(conn_id);
    debug!(conn_id, state = ?SocketState::Closed, "websocket closed");
}

/// Wait for the first data frame carrying the signed token.
///
/// Control frames are skipped; close or transport error yields `None`.
async fn read_auth_frame(socket: &mut WebSocket) -> Option<String> {
    loop {
        match socket.recv().await? {
            Ok(Message::Binary(data)) => {
                return Some(String::from_utf8_lossy(&data).into_owned());
            }
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}
