use std::sync::Arc;

use crate::{
    config::ChatConfig,
    connections::{ConnectionId, ConnectionRegistry},
    error::ChatResult,
    files::FileStore,
    protocol::{SendFile, ServerEvent},
    rooms::{Message, MessageBody, Room, RoomId, RoomRegistry},
};

pub struct Hub {
    pub connections: ConnectionRegistry,
    pub rooms: RoomRegistry,
    pub files: FileStore,
}

impl Hub {
    pub async fn new(config: &ChatConfig) -> std::io::Result<Self> {
        Ok(Self {
            connections: ConnectionRegistry::new(config.outbox_capacity),
            rooms: RoomRegistry::new(),
            files: FileStore::open(&config.upload_dir, config.max_upload_bytes).await?,
        })
    }

    pub async fn create_room(&self, name: &str) -> ChatResult<Room> {
        let room = self.rooms.create(name).await?;
        self.connections
            .broadcast_all(ServerEvent::RoomCreated(room.clone()))
            .await;
        Ok(room)
    }

    pub async fn join(&self, conn: ConnectionId, room: RoomId) -> ChatResult<()> {
        self.rooms.join(&self.connections, conn, room).await
    }

    pub async fn leave(&self, conn: ConnectionId, room: RoomId) -> ChatResult<()> {
        self.rooms.leave(&self.connections, conn, room).await
    }

    pub async fn send_file(&self, conn: ConnectionId, upload: SendFile) -> ChatResult<Arc<Message>> {
        self.rooms.get(upload.room_id).await?;

        let record = self
            .files
            .store(upload.room_id, &upload.file, &upload.file_name, &upload.file_type)
            .await?;
        self.rooms
            .post(upload.room_id, conn, MessageBody::file(&record))
            .await
    }

    /// Safe to call more than once
    pub async fn destroy(&self, conn: ConnectionId) {
        let Some(rooms) = self.connections.remove(conn).await else {
            return;
        };
        for room in rooms {
            self.rooms.depart(conn, room).await;
        }
    }
}
