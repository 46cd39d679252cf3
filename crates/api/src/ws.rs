//! WebSocket fan-out of revocation signals.
//!
//! Each connection subscribes to its user's revocation feed and forwards
//! every signal as a JSON text frame. The forwarding task is the only
//! consumer of its subscription; matching and teardown happen on the
//! receiving client.

use crate::middleware::AuthUser;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

pub async fn revocation_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| forward_signals(socket, state, auth))
}

async fn forward_signals(socket: WebSocket, state: Arc<AppState>, auth: AuthUser) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match state.bus.subscribe(auth.user_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(user = %auth.user_id, error = %e,
                "revocation subscription failed");
            let _ = sender.close().await;
            return;
        }
    };

    tracing::debug!(user = %auth.user_id, "revocation feed attached");

    loop {
        tokio::select! {
            signal = subscription.recv() => {
                let Some(signal) = signal else { break };

                let payload = match serde_json::to_string(&signal) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "unserializable revocation signal");
                        continue;
                    }
                };

                if sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            message = receiver.next() => {
                // Client pings keep the connection alive; anything else,
                // including close or error, ends the feed.
                match message {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(user = %auth.user_id, "revocation feed detached");
}
