use std::sync::Arc;

use axum::{
    body::Bytes,
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{MissedTickBehavior, interval, timeout};

use crate::{
    config::ChatConfig,
    error::ChatError,
    events,
    hub::Hub,
    protocol::ServerEvent,
};

#[debug_handler(state = crate::AppState)]
pub async fn room_ws(
    State(hub): State<Arc<Hub>>,
    State(config): State<Arc<ChatConfig>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // browsers send each message as one frame, so both caps move together
    ws.max_message_size(config.max_frame_bytes())
        .max_frame_size(config.max_frame_bytes())
        .on_upgrade(move |stream| serve_connection(hub, config, stream))
}

async fn serve_connection(hub: Arc<Hub>, config: Arc<ChatConfig>, stream: WebSocket) {
    let (id, mut outbox) = hub.connections.register().await;
    let (mut sender, mut receiver) = stream.split();

    hub.connections.send(id, ServerEvent::Connected(id)).await;

    let ping_every = config.ping_interval;
    let send_timeout = config.send_timeout;
    let mut writer = tokio::spawn(async move {
        let mut ping = interval(ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;

        loop {
            let msg = tokio::select! {
                event = outbox.recv() => {
                    let Some(event) = event else { break };
                    match event.to_frame(id) {
                        Ok(frame) => Message::Text(frame.into()),
                        Err(err) => {
                            tracing::error!(connection = %id, error = %err, "Failed to encode event");
                            continue;
                        }
                    }
                }
                _ = ping.tick() => Message::Ping(Bytes::new()),
            };

            match timeout(send_timeout, sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::debug!(connection = %id, error = %err, "Socket write failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(connection = %id, "Socket write timed out");
                    break;
                }
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => break,
            next = timeout(config.idle_timeout, receiver.next()) => {
                let msg = match next {
                    Err(_) => {
                        tracing::info!(connection = %id, "Connection idle, closing");
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(err))) => {
                        tracing::debug!(connection = %id, error = %err, "Socket read failed");
                        break;
                    }
                    Ok(Some(Ok(msg))) => msg,
                };

                match msg {
                    Message::Text(text) => events::handle_frame(&hub, id, text.as_str()).await,
                    Message::Binary(_) => {
                        let err = ChatError::malformed("binary frames are not supported");
                        events::report(&hub, id, None, err).await;
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    }

    hub.destroy(id).await;
    writer.abort();
}
