use std::sync::Arc;

use serde::Serialize;

use crate::{connections::ConnectionId, protocol::ServerEvent};

use super::{RoomId, room::RoomState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub room_id: RoomId,
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserEntry {
    pub id: ConnectionId,
    pub username: String,
}

impl PresenceSnapshot {
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.users.iter().map(|user| user.id)
    }
}

pub(crate) fn snapshot(room: &RoomState) -> PresenceSnapshot {
    PresenceSnapshot {
        room_id: room.room.id,
        users: room
            .members
            .keys()
            .map(|&id| UserEntry {
                id,
                username: id.display_name(),
            })
            .collect(),
    }
}

pub(crate) fn publish(room: &RoomState) {
    room.broadcast(ServerEvent::UserList(Arc::new(snapshot(room))));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::{Rng, SeedableRng, rngs::StdRng};

    use crate::{connections::ConnectionRegistry, rooms::RoomRegistry};

    #[tokio::test]
    async fn test_snapshot_matches_random_joins_and_leaves() {
        let connections = ConnectionRegistry::new(1024);
        let rooms = RoomRegistry::new();
        let room = rooms.create("presence").await.unwrap();

        let mut ids = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..6 {
            let (id, rx) = connections.register().await;
            ids.push(id);
            receivers.push(rx);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let mut expected = BTreeSet::new();
        for _ in 0..200 {
            let id = ids[rng.random_range(0..ids.len())];
            if rng.random_bool(0.5) {
                rooms.join(&connections, id, room.id).await.unwrap();
                expected.insert(id);
            } else if rooms.leave(&connections, id, room.id).await.is_ok() {
                assert!(expected.remove(&id));
            } else {
                assert!(!expected.contains(&id));
            }

            let state = rooms.lock(room.id).await.unwrap();
            let actual: BTreeSet<_> = super::snapshot(&state).ids().collect();
            assert_eq!(actual, expected);
            // drop the queued events so outboxes never fill up
            drop(state);
            for rx in &mut receivers {
                while rx.try_recv().is_ok() {}
            }
        }
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted() {
        let connections = ConnectionRegistry::new(64);
        let rooms = RoomRegistry::new();
        let room = rooms.create("sorted").await.unwrap();
        let mut held = Vec::new();
        for _ in 0..5 {
            let (id, rx) = connections.register().await;
            rooms.join(&connections, id, room.id).await.unwrap();
            held.push(rx);
        }

        let state = rooms.lock(room.id).await.unwrap();
        let snapshot = super::snapshot(&state);
        let ids: Vec<_> = snapshot.ids().collect();

        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(snapshot.users.iter().all(|u| u.username == u.id.display_name()));
    }
}
