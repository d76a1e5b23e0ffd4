use crate::{
    connections::ConnectionId,
    error::{ChatError, ChatResult},
    hub::Hub,
    protocol::{ClientEvent, ErrorReport, SendMessage, ServerEvent, SignalKind},
    rooms::{MessageBody, signal},
};

pub async fn handle_frame(hub: &Hub, conn: ConnectionId, frame: &str) {
    let event = match serde_json::from_str::<ClientEvent>(frame) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(connection = %conn, error = %err, "Unparsable frame");
            report(hub, conn, None, err.into()).await;
            return;
        }
    };

    let name = event.name();
    if let Err(err) = dispatch(hub, conn, event).await {
        tracing::debug!(connection = %conn, event = name, error = %err, "Event failed");
        report(hub, conn, Some(name), err).await;
    }
}

pub async fn dispatch(hub: &Hub, conn: ConnectionId, event: ClientEvent) -> ChatResult<()> {
    match event {
        ClientEvent::GetRooms => {
            let rooms = hub.rooms.list().await;
            hub.connections.send(conn, ServerEvent::RoomList(rooms)).await;
        }
        ClientEvent::CreateRoom(name) => {
            hub.create_room(&name).await?;
        }
        ClientEvent::JoinRoom(room) => hub.join(conn, room).await?,
        ClientEvent::LeaveRoom(room) => hub.leave(conn, room).await?,
        ClientEvent::SendMessage(SendMessage { room_id, content }) => {
            hub.rooms.post(room_id, conn, MessageBody::text(content)?).await?;
        }
        ClientEvent::SendFile(upload) => {
            hub.send_file(conn, upload).await?;
        }
        ClientEvent::WebrtcOffer(req) => {
            signal::relay(&hub.rooms, SignalKind::Offer, req.room_id, conn, req.payload).await?;
        }
        ClientEvent::WebrtcAnswer(req) => {
            signal::relay(&hub.rooms, SignalKind::Answer, req.room_id, conn, req.payload).await?;
        }
        ClientEvent::WebrtcIceCandidate(req) => {
            signal::relay(&hub.rooms, SignalKind::IceCandidate, req.room_id, conn, req.payload)
                .await?;
        }
    }
    Ok(())
}

pub async fn report(hub: &Hub, conn: ConnectionId, event: Option<&'static str>, err: ChatError) {
    let report = ErrorReport {
        event,
        kind: err.kind(),
        message: err.to_string(),
    };
    hub.connections.send(conn, ServerEvent::Error(report)).await;
}
