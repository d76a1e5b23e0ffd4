//! WebRTC handshake relay. There are no peer pairs: every other member of the
//! room gets every offer, answer and candidate, so with three or more callers
//! each one sees the others' handshakes.

use std::sync::Arc;

use crate::{
    connections::ConnectionId,
    error::ChatResult,
    protocol::{RelayedSignal, ServerEvent, SignalKind},
};

use super::{RoomId, RoomRegistry};

pub async fn relay(
    rooms: &RoomRegistry,
    kind: SignalKind,
    room_id: RoomId,
    sender: ConnectionId,
    payload: serde_json::Value,
) -> ChatResult<usize> {
    let room = rooms.lock(room_id).await?;
    let signal = Arc::new(RelayedSignal {
        kind,
        room_id,
        from: sender,
        payload,
    });

    let delivered = room
        .members
        .iter()
        .filter(|(id, _)| **id != sender)
        .filter(|(_, outbox)| outbox.deliver(ServerEvent::Signal(signal.clone())))
        .count();

    tracing::debug!(
        room = %room_id,
        from = %sender,
        kind = kind.event_name(),
        delivered,
        "Relayed signal"
    );
    Ok(delivered)
}
