//! The realtime gateway: one connection, one authenticated user, one
//! ordered event stream.
//!
//! Lifecycle: the upgrade handler resolves the presented credential through
//! the identity verifier before the socket exists — a bad credential is
//! refused outright with no connection state retained. An authenticated
//! connection auto-joins the user's private room, then processes inbound
//! events and room fan-out concurrently until either side closes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics;
use crate::middleware::auth::{bearer_token, VerifiedIdentity};
use crate::services::chat_service::ChatService;
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;
use crate::websocket::events::GatewayEvent;
use crate::websocket::message_types::GatewayRequest;
use crate::websocket::{RoomId, SubscriberId};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = params.token.clone().or_else(|| bearer_token(&headers));

    let identity = match credential {
        None => {
            tracing::warn!("realtime connection rejected: no credential presented");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Some(token) => match state.verifier.verify(&token).await {
            Ok(identity) => identity,
            Err(_) => {
                tracing::warn!("realtime connection rejected: credential verification failed");
                return StatusCode::UNAUTHORIZED.into_response();
            }
        },
    };

    ws.on_upgrade(move |socket| handle_socket(state, identity, socket))
}

async fn handle_socket(state: AppState, identity: VerifiedIdentity, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = unbounded_channel::<String>();
    let subscriber = SubscriberId::new();
    let user_id = identity.user_id;
    let mut joined: HashSet<RoomId> = HashSet::new();

    // Private room for out-of-band notifications, held for the lifetime of
    // the connection.
    let private = RoomId::User(user_id);
    state.rooms.join(private, subscriber, tx.clone()).await;
    joined.insert(private);

    metrics::WS_CONNECTED_CLIENTS.inc();
    tracing::info!(%user_id, "realtime session started");

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(payload) => {
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, user_id, subscriber, &tx, &mut joined, &text).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong are answered by the framework; binary frames
                    // are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Memberships are connection-scoped; nothing else changes on disconnect.
    state.rooms.leave_all(subscriber).await;
    metrics::WS_CONNECTED_CLIENTS.dec();
    tracing::info!(%user_id, "realtime session closed");
}

/// Dispatch one inbound frame. Failures of any kind are answered on this
/// connection only and never terminate it.
async fn handle_frame(
    state: &AppState,
    user_id: Uuid,
    subscriber: SubscriberId,
    tx: &UnboundedSender<String>,
    joined: &mut HashSet<RoomId>,
    text: &str,
) {
    let request = match serde_json::from_str::<GatewayRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, %user_id, "malformed realtime payload");
            send_event(
                tx,
                &GatewayEvent::Error {
                    code: "malformed_payload".to_string(),
                    description: "payload does not match any known event shape".to_string(),
                },
            );
            return;
        }
    };

    match request {
        GatewayRequest::JoinRoom { conversation_id } => {
            let room = RoomId::Conversation(conversation_id);
            if joined.contains(&room) {
                return;
            }
            match authorize_room(state, user_id, conversation_id).await {
                Ok(()) => {
                    state.rooms.join(room, subscriber, tx.clone()).await;
                    joined.insert(room);
                }
                Err(e) => send_event(tx, &GatewayEvent::from_error(&e)),
            }
        }

        GatewayRequest::LeaveRoom { conversation_id } => {
            let room = RoomId::Conversation(conversation_id);
            state.rooms.leave(room, subscriber).await;
            joined.remove(&room);
        }

        GatewayRequest::SendMessage {
            conversation_id,
            body,
            kind,
        } => {
            match ChatService::send(
                &state.db,
                state.rooms.as_ref(),
                conversation_id,
                user_id,
                &body,
                kind,
            )
            .await
            {
                // The round-tripped message-created event is the success
                // signal; nothing extra goes to the sender here.
                Ok(_) => {}
                Err(e) => send_event(tx, &GatewayEvent::from_error(&e)),
            }
        }

        GatewayRequest::TypingStart { conversation_id } => {
            relay_typing(state, user_id, subscriber, joined, conversation_id, true).await;
        }

        GatewayRequest::TypingStop { conversation_id } => {
            relay_typing(state, user_id, subscriber, joined, conversation_id, false).await;
        }
    }
}

/// Typing indicators are advisory: non-persisted, best-effort, never echoed
/// back to the originating connection, and silently dropped when the
/// connection has not joined the room.
async fn relay_typing(
    state: &AppState,
    user_id: Uuid,
    subscriber: SubscriberId,
    joined: &HashSet<RoomId>,
    conversation_id: Uuid,
    started: bool,
) {
    let room = RoomId::Conversation(conversation_id);
    if !joined.contains(&room) {
        return;
    }

    let event = if started {
        GatewayEvent::UserTyping {
            conversation_id,
            user_id,
        }
    } else {
        GatewayEvent::UserStoppedTyping {
            conversation_id,
            user_id,
        }
    };

    if let Ok(payload) = event.to_payload() {
        state.rooms.broadcast(room, &payload, Some(subscriber)).await;
    }
}

async fn authorize_room(
    state: &AppState,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<(), AppError> {
    let conversation = ConversationService::find(&state.db, conversation_id).await?;
    if !conversation.participants.contains(user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn send_event(tx: &UnboundedSender<String>, event: &GatewayEvent) {
    match event.to_payload() {
        Ok(payload) => {
            // Receiver gone means the connection is closing; nothing to do.
            let _ = tx.send(payload);
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize gateway event"),
    }
}
