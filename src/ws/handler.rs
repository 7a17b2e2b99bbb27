//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    // Each connection is a fresh identity; a reconnect is a new player.
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerMsg>();

    // Spawn writer task: server events -> WebSocket
    let writer_player_id = player_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = events_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = PlayerRateLimiter::new();
    let mut logged_in = false;

    // Reader loop: WebSocket -> intents
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                let msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                match msg {
                    ClientMsg::Login { username } => {
                        match state.registry.register(player_id, &username, events_tx.clone()) {
                            Ok(player) => {
                                logged_in = true;
                                let _ = events_tx.send(ServerMsg::LoginSuccess { player });
                            }
                            Err(e) => {
                                let _ = events_tx.send(ServerMsg::Error {
                                    code: e.code().to_string(),
                                    message: e.to_string(),
                                });
                            }
                        }
                    }
                    _ if !logged_in => {
                        debug!(player_id = %player_id, "Intent before login ignored");
                    }
                    ClientMsg::CreateRoom => {
                        let _ = state.directory.create_room(player_id);
                    }
                    ClientMsg::JoinRoom { room_id } => {
                        if let Err(e) = state.directory.join_room(&room_id, player_id) {
                            let _ = events_tx.send(ServerMsg::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            });
                        }
                    }
                    ClientMsg::GetRooms => {
                        let _ = events_tx.send(ServerMsg::RoomsList {
                            rooms: state.directory.list_rooms(),
                        });
                    }
                    ClientMsg::PlayerMove { dx, dy } => {
                        state.directory.player_move(player_id, dx, dy);
                    }
                    ClientMsg::DropBomb { x, y } => {
                        state.directory.drop_bomb(player_id, x, y);
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup on disconnect: leaving the room handles elimination, win
    // re-check, and the lobby listing broadcast.
    state.directory.leave_room(player_id);
    state.registry.unregister(player_id);
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
