use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::notify::{Channel, Envelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe {
        role: Role,
        id: Uuid,
    },
    WatchOrder {
        order_id: Uuid,
    },
    LocationUpdate {
        courier_id: Uuid,
        order_id: Option<Uuid>,
        location: GeoPoint,
    },
}

type Subscriptions = StreamMap<String, BroadcastStream<Envelope>>;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    principal: Principal,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, principal: Principal) {
    let mut subscriptions = Subscriptions::new();
    info!(principal_id = %principal.id, role = %principal.role, "websocket client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket receive failed");
                        break;
                    }
                };

                if let Err(err) = handle_message(&state, &principal, &mut subscriptions, &text).await {
                    let reply = json!({ "type": "error", "message": err.to_string() }).to_string();
                    if socket.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
            Some((channel, event)) = subscriptions.next() => {
                let envelope = match event {
                    Ok(envelope) => envelope,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "websocket subscriber lagging, events dropped");
                        continue;
                    }
                };
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize event for ws");
                        continue;
                    }
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(principal_id = %principal.id, "websocket client disconnected");
}

fn join(subscriptions: &mut Subscriptions, state: &AppState, channel: Channel) {
    let key = channel.to_string();
    if !subscriptions.contains_key(&key) {
        subscriptions.insert(key, BroadcastStream::new(state.fanout.subscribe(&channel)));
    }
}

async fn handle_message(
    state: &AppState,
    principal: &Principal,
    subscriptions: &mut Subscriptions,
    text: &str,
) -> Result<(), AppError> {
    let message: ClientMessage =
        serde_json::from_str(text).map_err(|err| AppError::Validation(format!("unreadable message: {err}")))?;

    match message {
        ClientMessage::Subscribe { role, id } => {
            if id != principal.id || role != principal.role {
                return Err(AppError::Forbidden("cannot subscribe as another user".to_string()));
            }
            join(subscriptions, state, Channel::User(id));
            if role == Role::Courier {
                join(subscriptions, state, Channel::Couriers);
            }
        }
        ClientMessage::WatchOrder { order_id } => {
            state.engine.ledger.get(order_id, principal).await?;
            join(subscriptions, state, Channel::Order(order_id));
        }
        ClientMessage::LocationUpdate {
            courier_id,
            order_id,
            location,
        } => {
            if principal.role != Role::Courier || courier_id != principal.id {
                return Err(AppError::Forbidden("cannot report another courier's location".to_string()));
            }
            state
                .engine
                .ledger
                .relay_location(courier_id, location, order_id)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::ClientMessage;
    use crate::auth::Role;

    #[test]
    fn parses_client_messages() {
        let id = Uuid::new_v4();
        let subscribe: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"subscribe","role":"courier","id":"{id}"}}"#)).unwrap();
        assert!(matches!(subscribe, ClientMessage::Subscribe { role: Role::Courier, id: got } if got == id));

        let location: ClientMessage = serde_json::from_str(&format!(
            r#"{{"type":"location_update","courier_id":"{id}","order_id":null,"location":{{"lat":52.5,"lng":13.4}}}}"#
        ))
        .unwrap();
        assert!(matches!(location, ClientMessage::LocationUpdate { order_id: None, .. }));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shout"}"#).is_err());
    }
}
