use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc, mpsc::error::TrySendError};
use uuid::Uuid;

use crate::{protocol::ServerEvent, rooms::RoomId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn display_name(&self) -> String {
        let simple = self.0.simple().to_string();
        format!("User {}", &simple[..6])
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery never waits. A full queue drops the event for that client only.
#[derive(Debug, Clone)]
pub struct Outbox {
    id: ConnectionId,
    tx: mpsc::Sender<ServerEvent>,
}

impl Outbox {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn deliver(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection = %self.id, "Outbox full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

struct Connection {
    outbox: Outbox,
    rooms: HashSet<RoomId>,
}

pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    outbox_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    pub async fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(self.outbox_capacity);
        let connection = Connection {
            outbox: Outbox { id, tx },
            rooms: HashSet::new(),
        };

        let mut connections = self.connections.write().await;
        connections.insert(id, connection);

        tracing::info!(connection = %id, live = connections.len(), "Connection registered");
        (id, rx)
    }

    pub async fn remove(&self, id: ConnectionId) -> Option<HashSet<RoomId>> {
        let mut connections = self.connections.write().await;
        let connection = connections.remove(&id)?;

        tracing::info!(
            connection = %id,
            rooms = connection.rooms.len(),
            live = connections.len(),
            "Connection removed"
        );
        Some(connection.rooms)
    }

    /// `None` once the connection is gone
    pub async fn attach(&self, id: ConnectionId, room: RoomId) -> Option<Outbox> {
        let mut connections = self.connections.write().await;
        let connection = connections.get_mut(&id)?;
        connection.rooms.insert(room);
        Some(connection.outbox.clone())
    }

    pub async fn detach(&self, id: ConnectionId, room: RoomId) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.rooms.remove(&room);
        }
    }

    pub async fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.read().await.get(&id) {
            Some(connection) => connection.outbox.deliver(event),
            None => false,
        }
    }

    pub async fn broadcast_all(&self, event: ServerEvent) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|connection| connection.outbox.deliver(event.clone()))
            .count()
    }

    pub async fn rooms_of(&self, id: ConnectionId) -> Vec<RoomId> {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|connection| connection.rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let id = ConnectionId::generate();
        let name = id.display_name();

        assert!(name.starts_with("User "));
        assert_eq!(name.len(), "User ".len() + 6);
        assert!(id.0.simple().to_string().starts_with(&name[5..]));
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = ConnectionRegistry::new(8);
        let (id, _rx) = registry.register().await;
        let room = RoomId::generate();

        assert!(registry.contains(id).await);
        assert!(registry.attach(id, room).await.is_some());
        assert_eq!(registry.rooms_of(id).await, vec![room]);

        let rooms = registry.remove(id).await.unwrap();
        assert!(rooms.contains(&room));
        assert!(registry.is_empty().await);

        // second removal is a no-op
        assert!(registry.remove(id).await.is_none());
        assert!(registry.attach(id, room).await.is_none());
    }

    #[tokio::test]
    async fn test_detach() {
        let registry = ConnectionRegistry::new(8);
        let (id, _rx) = registry.register().await;
        let room = RoomId::generate();

        registry.attach(id, room).await;
        registry.detach(id, room).await;

        assert!(registry.rooms_of(id).await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_all() {
        let registry = ConnectionRegistry::new(8);
        let (a, mut rx_a) = registry.register().await;
        let (_b, mut rx_b) = registry.register().await;

        let delivered = registry.broadcast_all(ServerEvent::Connected(a)).await;

        assert_eq!(delivered, 2);
        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::Connected(id)) if id == a));
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::Connected(_))));
    }

    #[tokio::test]
    async fn test_full_outbox_drops() {
        let registry = ConnectionRegistry::new(1);
        let (id, mut rx) = registry.register().await;

        assert!(registry.send(id, ServerEvent::Connected(id)).await);
        assert!(!registry.send(id, ServerEvent::Connected(id)).await);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_unknown() {
        let registry = ConnectionRegistry::new(1);

        assert!(!registry.send(ConnectionId::generate(), ServerEvent::RoomList(Vec::new())).await);
    }
}
