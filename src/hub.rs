//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, session
//! attachment by code, message parsing, and bidirectional communication
//! with the session actor. A connection must create or join a session
//! before any other message; joining an unknown code closes the socket
//! with the reserved 4004 close code so clients can distinguish it from a
//! transient network failure.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::GameError;
use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::registry::SessionRegistry;
use crate::session::{SessionCommand, SessionHandle};
use crate::types::{ConnectionId, SessionCode};

/// Reserved close code signalling "session not found"
const CLOSE_SESSION_NOT_FOUND: u16 = 4004;

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, waits for the client to create or
/// join a session, then bridges frames to and from that session's actor
/// until either side goes away.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<SessionRegistry>,
) -> Result<(), GameError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::new();
    info!("Connection {} opened from {}", conn_id, peer_addr);

    // First phase: the connection is unattached until it creates or joins
    // a session.
    let handle = loop {
        let Some(msg_result) = ws_receiver.next().await else {
            debug!("Connection {} closed before attaching", conn_id);
            return Ok(());
        };
        match msg_result? {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::CreateSession {}) => {
                    let (code, handle) = registry.create();
                    let reply = ServerMessage::SessionCreated {
                        code: code.to_string(),
                    };
                    ws_sender
                        .send(Message::Text(serde_json::to_string(&reply)?.into()))
                        .await?;
                    break handle;
                }
                Ok(ClientMessage::JoinSession { code }) => {
                    let code = SessionCode::from_string(code);
                    match registry.get(&code) {
                        Some(handle) => {
                            let reply = ServerMessage::SessionJoined {
                                code: code.to_string(),
                            };
                            ws_sender
                                .send(Message::Text(serde_json::to_string(&reply)?.into()))
                                .await?;
                            break handle;
                        }
                        None => {
                            warn!("Connection {} asked for unknown session {}", conn_id, code);
                            let _ = ws_sender
                                .send(Message::Close(Some(CloseFrame {
                                    code: CloseCode::from(CLOSE_SESSION_NOT_FOUND),
                                    reason: "session not found".into(),
                                })))
                                .await;
                            return Ok(());
                        }
                    }
                }
                Ok(_) => {
                    let reply: ServerMessage = GameError::NotInSession.into();
                    ws_sender
                        .send(Message::Text(serde_json::to_string(&reply)?.into()))
                        .await?;
                }
                Err(e) => {
                    warn!("Invalid JSON from {}: {}", conn_id, e);
                    let reply = ServerMessage::Error {
                        code: ErrorCode::InvalidMessage,
                        message: format!("Invalid message format: {}", e),
                    };
                    ws_sender
                        .send(Message::Text(serde_json::to_string(&reply)?.into()))
                        .await?;
                }
            },
            Message::Close(_) => {
                debug!("Connection {} sent close frame before attaching", conn_id);
                return Ok(());
            }
            _ => {}
        }
    };

    // Attached: register with the session actor and bridge both directions.
    // The session holds the only sender for this connection, so dropping
    // the entry (detach or a superseding reconnect) ends the write task
    // and closes the socket.
    let (msg_tx, mut msg_rx) = SessionHandle::connection_channel();
    handle
        .send(SessionCommand::Attach {
            conn_id,
            tx: msg_tx,
        })
        .await;

    let read_handle = handle.clone();
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => match client_message_to_command(conn_id, client_msg) {
                        Some(cmd) => read_handle.send(cmd).await,
                        None => {
                            read_handle
                                .send(SessionCommand::Malformed {
                                    conn_id,
                                    detail: "Already attached to a session".to_string(),
                                })
                                .await;
                        }
                    },
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", conn_id, e);
                        read_handle
                            .send(SessionCommand::Malformed {
                                conn_id,
                                detail: format!("Invalid message format: {}", e),
                            })
                            .await;
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong replies are handled by tungstenite
                }
                Ok(_) => {
                    // Binary or other frame types - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", conn_id);
    });

    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for {}", conn_id);

        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", conn_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", conn_id);
        }
    }

    handle.send(SessionCommand::Detach { conn_id }).await;
    info!("Connection {} closed", conn_id);

    Ok(())
}

/// Convert a post-attach ClientMessage to a SessionCommand
///
/// Returns None for attach-phase messages that are invalid once a
/// connection is already in a session.
fn client_message_to_command(conn_id: ConnectionId, msg: ClientMessage) -> Option<SessionCommand> {
    match msg {
        ClientMessage::CreateSession {} | ClientMessage::JoinSession { .. } => None,
        ClientMessage::RegisterPlayer { name, preferences } => Some(SessionCommand::Register {
            conn_id,
            name,
            preferences,
        }),
        ClientMessage::StartGame {} => Some(SessionCommand::Start { conn_id }),
        ClientMessage::SelectQuestion { category, value } => Some(SessionCommand::Select {
            conn_id,
            category,
            value,
        }),
        ClientMessage::Buzz {} => Some(SessionCommand::Buzz { conn_id }),
        ClientMessage::SubmitAnswer { text } => {
            Some(SessionCommand::SubmitAnswer { conn_id, text })
        }
        ClientMessage::SubmitWager { amount } => {
            Some(SessionCommand::SubmitWager { conn_id, amount })
        }
        ClientMessage::Chat { message } => Some(SessionCommand::Chat { conn_id, message }),
        ClientMessage::RestartGame {} => Some(SessionCommand::Restart { conn_id }),
    }
}
