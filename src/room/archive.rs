use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::model::{now_ms, Room};

/// A closed room snapshot. Written once when the host leaves, read-only
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedRoom {
    pub room_code: String,
    pub archived_at: u64,
    pub room: Room,
}

/// Append-only history of archived rooms
pub struct ArchiveStore {
    records: RwLock<Vec<ArchivedRoom>>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn record(&self, room: Room) -> ArchivedRoom {
        let archived = ArchivedRoom {
            room_code: room.code.clone(),
            archived_at: now_ms(),
            room,
        };

        let mut records = self.records.write().await;
        records.push(archived.clone());
        tracing::info!(
            room_code = %archived.room_code,
            archived_at = archived.archived_at,
            "Room archived"
        );
        archived
    }

    /// All archive records for a code, oldest first. Codes can be reused
    /// by later rooms, so more than one record per code is legitimate.
    pub async fn find_by_code(&self, code: &str) -> Vec<ArchivedRoom> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.room_code == code)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for ArchiveStore {
    fn default() -> Self {
        Self::new()
    }
}
