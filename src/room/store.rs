use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};

use crate::error::{DuelError, Result};
use super::model::Room;

/// Buffered room snapshots per subscriber before a slow viewer starts
/// lagging (and skips to newer snapshots).
const FEED_CAPACITY: usize = 64;

struct Entry {
    version: u64,
    room: Room,
    feed: broadcast::Sender<Room>,
}

/// The single source of truth for live rooms.
///
/// Every document carries a version; multi-step mutations go through
/// `compare_and_set` so two concurrent writers can never both commit from
/// the same stale read. Committed writes are pushed to the room's change
/// feed while the write lock is still held, which guarantees subscribers
/// observe updates in commit order.
pub struct RoomStore {
    rooms: RwLock<HashMap<String, Entry>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a snapshot of a room together with its current version
    pub async fn get(&self, code: &str) -> Option<(u64, Room)> {
        let rooms = self.rooms.read().await;
        rooms.get(code).map(|e| (e.version, e.room.clone()))
    }

    pub async fn contains(&self, code: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms.contains_key(code)
    }

    /// Seed a new room document at version 1
    pub async fn insert(&self, code: &str, room: Room) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(code) {
            return Err(DuelError::RoomAlreadyExists(code.to_string()));
        }

        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        rooms.insert(
            code.to_string(),
            Entry {
                version: 1,
                room,
                feed,
            },
        );
        Ok(())
    }

    /// Commit a new document revision if the caller's version is current.
    /// Returns the new version on success.
    pub async fn compare_and_set(
        &self,
        code: &str,
        expected_version: u64,
        room: Room,
    ) -> Result<u64> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

        if entry.version != expected_version {
            return Err(DuelError::VersionConflict(code.to_string()));
        }

        entry.version += 1;
        entry.room = room;
        // Lagging or dropped receivers are not a store problem
        let _ = entry.feed.send(entry.room.clone());
        Ok(entry.version)
    }

    /// Atomically remove a room if the caller's version is current.
    /// Dropping the entry closes the change feed, which is how viewers
    /// learn the room no longer exists.
    pub async fn remove(&self, code: &str, expected_version: u64) -> Result<Room> {
        let mut rooms = self.rooms.write().await;
        let current = rooms
            .get(code)
            .map(|e| e.version)
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

        if current != expected_version {
            return Err(DuelError::VersionConflict(code.to_string()));
        }

        let entry = rooms
            .remove(code)
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;
        Ok(entry.room)
    }

    /// Subscribe to the room's change feed. The receiver yields full room
    /// snapshots in commit order and closes when the room is removed.
    pub async fn subscribe(&self, code: &str) -> Result<broadcast::Receiver<Room>> {
        let rooms = self.rooms.read().await;
        let entry = rooms
            .get(code)
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;
        Ok(entry.feed.subscribe())
    }

    /// Subscribe and take the current document in one lock acquisition.
    /// Writers commit and notify under the write lock, so the receiver can
    /// only ever yield frames newer than the returned snapshot.
    pub async fn subscribe_with_snapshot(
        &self,
        code: &str,
    ) -> Result<(Room, broadcast::Receiver<Room>)> {
        let rooms = self.rooms.read().await;
        let entry = rooms
            .get(code)
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;
        Ok((entry.room.clone(), entry.feed.subscribe()))
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::room::model::{now_ms, ChatMessage, Player, RoomStatus};

    fn make_room(code: &str) -> Room {
        let mut players = HashMap::new();
        players.insert(
            "u1".to_string(),
            Player {
                uid: "u1".to_string(),
                name: "Host".to_string(),
                avatar_url: None,
                is_host: true,
                joined_at: now_ms(),
            },
        );
        Room {
            code: code.to_string(),
            room_name: "test".to_string(),
            mode: "dsa".to_string(),
            difficulty: "mixed".to_string(),
            status: RoomStatus::Waiting,
            created_at: now_ms(),
            start_time: None,
            players,
            problems: vec!["two-sum".to_string()],
            solved: HashMap::new(),
            messages: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = RoomStore::new();
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();

        let (version, room) = store.get("AB12CD").await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(room.code, "AB12CD");
    }

    #[tokio::test]
    async fn test_insert_duplicate_fails() {
        let store = RoomStore::new();
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();

        let err = store.insert("AB12CD", make_room("AB12CD")).await.unwrap_err();
        assert!(matches!(err, DuelError::RoomAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_cas_stale_version_rejected() {
        let store = RoomStore::new();
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();

        let (v1, room) = store.get("AB12CD").await.unwrap();
        let v2 = store.compare_and_set("AB12CD", v1, room.clone()).await.unwrap();
        assert_eq!(v2, v1 + 1);

        // A second writer holding the old version must lose
        let err = store.compare_and_set("AB12CD", v1, room).await.unwrap_err();
        assert!(matches!(err, DuelError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn test_remove_closes_feed() {
        let store = RoomStore::new();
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();

        let mut feed = store.subscribe("AB12CD").await.unwrap();
        let (v, _) = store.get("AB12CD").await.unwrap();
        store.remove("AB12CD", v).await.unwrap();

        // Drain whatever was buffered, then the channel must report closed
        loop {
            match feed.recv().await {
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
                Err(e) => panic!("unexpected feed error: {e}"),
            }
        }
        assert!(store.get("AB12CD").await.is_none());
    }

    #[tokio::test]
    async fn test_feed_delivers_in_commit_order() {
        let store = RoomStore::new();
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();
        let mut feed = store.subscribe("AB12CD").await.unwrap();

        for name in ["first", "second", "third"] {
            let (v, mut room) = store.get("AB12CD").await.unwrap();
            room.room_name = name.to_string();
            store.compare_and_set("AB12CD", v, room).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(feed.recv().await.unwrap().room_name);
        }
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_snapshot_subscription_buffers_nothing_older() {
        let store = RoomStore::new();
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();

        // Mutations committed before the viewer attaches
        for name in ["early-1", "early-2"] {
            let (v, mut room) = store.get("AB12CD").await.unwrap();
            room.room_name = name.to_string();
            store.compare_and_set("AB12CD", v, room).await.unwrap();
        }

        let (snapshot, mut feed) = store.subscribe_with_snapshot("AB12CD").await.unwrap();
        assert_eq!(snapshot.room_name, "early-2");
        assert!(matches!(
            feed.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        let (v, mut room) = store.get("AB12CD").await.unwrap();
        room.room_name = "late".to_string();
        store.compare_and_set("AB12CD", v, room).await.unwrap();
        assert_eq!(feed.recv().await.unwrap().room_name, "late");
    }

    #[tokio::test]
    async fn test_feed_never_replays_frames_older_than_snapshot() {
        let store = Arc::new(RoomStore::new());
        store.insert("AB12CD", make_room("AB12CD")).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..100u32 {
                    let (v, mut room) = store.get("AB12CD").await.unwrap();
                    room.messages.push(ChatMessage {
                        sender_uid: "u1".to_string(),
                        sender_name: "Host".to_string(),
                        text: format!("msg {i}"),
                        sent_at: now_ms(),
                    });
                    store.compare_and_set("AB12CD", v, room).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        // Viewers attaching mid-stream must only see frames strictly newer
        // than their snapshot
        for _ in 0..20 {
            let (snapshot, mut feed) = store.subscribe_with_snapshot("AB12CD").await.unwrap();
            let mut seen = snapshot.messages.len();
            while let Ok(frame) = feed.try_recv() {
                assert!(
                    frame.messages.len() > seen,
                    "feed replayed state older than the snapshot"
                );
                seen = frame.messages.len();
            }
            tokio::task::yield_now().await;
        }

        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_missing_room() {
        let store = RoomStore::new();
        let err = store.subscribe("NOPE42").await.unwrap_err();
        assert!(matches!(err, DuelError::RoomNotFound(_)));
    }
}
