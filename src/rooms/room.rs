use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    connections::{ConnectionId, ConnectionRegistry, Outbox},
    error::{ChatError, ChatResult},
    protocol::ServerEvent,
};

use super::{Message, MessageBody, MessageLog, Room, RoomId, presence};

pub const MAX_ROOM_NAME_CHARS: usize = 100;

pub(crate) struct RoomState {
    pub(crate) room: Room,
    pub(crate) log: MessageLog,
    pub(crate) members: BTreeMap<ConnectionId, Outbox>,
}

impl RoomState {
    fn new(room: Room) -> Self {
        Self {
            log: MessageLog::new(room.id),
            room,
            members: BTreeMap::new(),
        }
    }

    pub(crate) fn broadcast(&self, event: ServerEvent) {
        for outbox in self.members.values() {
            outbox.deliver(event.clone());
        }
    }

    fn append_and_broadcast(&mut self, author: ConnectionId, body: MessageBody) -> Arc<Message> {
        let message = self.log.append(author, body);
        let event = match message.body {
            MessageBody::File { .. } => ServerEvent::FileReceived(message.clone()),
            _ => ServerEvent::Message(message.clone()),
        };
        self.broadcast(event);
        message
    }
}

struct RoomSlot {
    room: Room,
    state: Arc<Mutex<RoomState>>,
}

// rooms are never deleted
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, RoomSlot>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, name: &str) -> ChatResult<Room> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::malformed("room name is empty"));
        }
        if name.chars().count() > MAX_ROOM_NAME_CHARS {
            return Err(ChatError::malformed(format!(
                "room name is longer than {MAX_ROOM_NAME_CHARS} characters"
            )));
        }

        let room = Room {
            id: RoomId::generate(),
            name: name.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };

        let mut rooms = self.rooms.write().await;
        // v7 ids embed a timestamp plus 74 random bits; a clash is not
        // expected, but it must never overwrite an existing room
        if rooms.contains_key(&room.id) {
            return Err(ChatError::Io(std::io::Error::other("room id collision")));
        }
        rooms.insert(
            room.id,
            RoomSlot {
                room: room.clone(),
                state: Arc::new(Mutex::new(RoomState::new(room.clone()))),
            },
        );

        tracing::info!(room = %room.id, name = %room.name, total = rooms.len(), "Room created");
        Ok(room)
    }

    pub async fn list(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .read()
            .await
            .values()
            .map(|slot| slot.room.clone())
            .collect();
        rooms.sort_by_key(|room| (room.created_at, room.id));
        rooms
    }

    pub async fn get(&self, id: RoomId) -> ChatResult<Room> {
        self.rooms
            .read()
            .await
            .get(&id)
            .map(|slot| slot.room.clone())
            .ok_or(ChatError::RoomNotFound(id))
    }

    pub(crate) async fn lock(&self, id: RoomId) -> ChatResult<OwnedMutexGuard<RoomState>> {
        let state = self
            .rooms
            .read()
            .await
            .get(&id)
            .map(|slot| slot.state.clone())
            .ok_or(ChatError::RoomNotFound(id))?;
        Ok(state.lock_owned().await)
    }

    /// History to the joiner, then presence, then the joined line. A rejoin
    /// gets history and presence again but is not announced twice.
    pub async fn join(
        &self,
        connections: &ConnectionRegistry,
        conn: ConnectionId,
        id: RoomId,
    ) -> ChatResult<()> {
        let mut room = self.lock(id).await?;

        let Some(outbox) = connections.attach(conn, id).await else {
            // the connection went away before it got here
            return Ok(());
        };
        let rejoin = room.members.insert(conn, outbox.clone()).is_some();

        outbox.deliver(ServerEvent::MessageHistory {
            room_id: id,
            messages: room.log.history().into(),
        });
        presence::publish(&room);
        if !rejoin {
            room.append_and_broadcast(conn, MessageBody::joined(conn));
        }

        tracing::info!(
            room = %id,
            connection = %conn,
            members = room.members.len(),
            history = room.log.len(),
            rejoin,
            "Joined room"
        );
        Ok(())
    }

    pub async fn leave(
        &self,
        connections: &ConnectionRegistry,
        conn: ConnectionId,
        id: RoomId,
    ) -> ChatResult<()> {
        let mut room = self.lock(id).await?;
        if room.members.remove(&conn).is_none() {
            return Err(ChatError::NotJoined(id));
        }
        connections.detach(conn, id).await;

        presence::publish(&room);
        room.append_and_broadcast(conn, MessageBody::left(conn));

        tracing::info!(room = %id, connection = %conn, members = room.members.len(), "Left room");
        Ok(())
    }

    pub async fn depart(&self, conn: ConnectionId, id: RoomId) {
        let Ok(mut room) = self.lock(id).await else {
            return;
        };
        if room.members.remove(&conn).is_none() {
            return;
        }

        presence::publish(&room);
        room.append_and_broadcast(conn, MessageBody::disconnected(conn));

        tracing::debug!(room = %id, connection = %conn, members = room.members.len(), "Departed room");
    }

    pub async fn post(
        &self,
        id: RoomId,
        author: ConnectionId,
        body: MessageBody,
    ) -> ChatResult<Arc<Message>> {
        let mut room = self.lock(id).await?;
        Ok(room.append_and_broadcast(author, body))
    }

    pub async fn history(&self, id: RoomId) -> ChatResult<Vec<Arc<Message>>> {
        Ok(self.lock(id).await?.log.history().to_vec())
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
