//! Each room sits behind its own mutex. Log appends, membership changes and
//! the fan-out they cause all happen under it, so every member sees a room's
//! events in the same order.

mod msg;
mod presence;
mod room;
pub mod signal;
pub mod ws;

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub use msg::{Message, MessageBody, MessageLog};
pub use presence::{PresenceSnapshot, UserEntry};
pub use room::{MAX_ROOM_NAME_CHARS, RoomRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(Uuid);

impl RoomId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
