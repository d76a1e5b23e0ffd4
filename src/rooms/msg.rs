use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    connections::ConnectionId,
    error::{ChatError, ChatResult},
    files::{FileId, FileRecord},
};

use super::RoomId;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: u64,
    pub room_id: RoomId,
    pub user_id: ConnectionId,
    pub username: String,
    #[serde(flatten)]
    pub body: MessageBody,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn is_system(&self) -> bool {
        matches!(self.body, MessageBody::System { .. })
    }

    pub fn is_authored_by(&self, id: ConnectionId) -> bool {
        !self.is_system() && self.user_id == id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        file_id: FileId,
        file_name: String,
        file_type: String,
        size: usize,
    },
    System {
        content: String,
    },
}

impl MessageBody {
    pub fn text(content: String) -> ChatResult<Self> {
        if content.trim().is_empty() {
            return Err(ChatError::malformed("message content is empty"));
        }
        Ok(Self::Text { content })
    }

    pub fn file(record: &FileRecord) -> Self {
        Self::File {
            file_id: record.file_id,
            file_name: record.original_name.clone(),
            file_type: record.media_type.clone(),
            size: record.size,
        }
    }

    pub fn joined(who: ConnectionId) -> Self {
        Self::System {
            content: format!("{} joined the room", who.display_name()),
        }
    }

    pub fn left(who: ConnectionId) -> Self {
        Self::System {
            content: format!("{} left the room", who.display_name()),
        }
    }

    pub fn disconnected(who: ConnectionId) -> Self {
        Self::System {
            content: format!("{} disconnected", who.display_name()),
        }
    }
}

#[derive(Debug)]
pub struct MessageLog {
    room_id: RoomId,
    last_id: u64,
    entries: Vec<Arc<Message>>,
}

impl MessageLog {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            last_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, author: ConnectionId, body: MessageBody) -> Arc<Message> {
        self.last_id += 1;
        let message = Arc::new(Message {
            message_id: self.last_id,
            room_id: self.room_id,
            user_id: author,
            username: author.display_name(),
            body,
            timestamp: OffsetDateTime::now_utc(),
        });
        self.entries.push(message.clone());
        message
    }

    pub fn history(&self) -> &[Arc<Message>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
