use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch. All room timestamps are
/// server-assigned so that clients with drifting clocks agree.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Ongoing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub uid: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_host: bool,
    pub joined_at: u64,
}

/// First accepted submission for a problem. Written once, never
/// overwritten; the accepted source is kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedEntry {
    pub solver_uid: String,
    pub solved_at: u64,
    pub language: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_uid: String,
    pub sender_name: String,
    pub text: String,
    pub sent_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    pub room_name: String,
    pub mode: String,
    pub difficulty: String,
    pub status: RoomStatus,
    pub created_at: u64,
    /// Set exactly once on the Waiting -> Ongoing transition. Clients
    /// derive remaining time from this anchor, never from a local countdown.
    pub start_time: Option<u64>,
    pub players: HashMap<String, Player>,
    /// Fixed at creation, immutable thereafter.
    pub problems: Vec<String>,
    pub solved: HashMap<String, SolvedEntry>,
    /// Append-only, ordered by server-assigned timestamp.
    pub messages: Vec<ChatMessage>,
}

impl Room {
    pub fn host_id(&self) -> Option<&str> {
        self.players
            .values()
            .find(|p| p.is_host)
            .map(|p| p.uid.as_str())
    }

    pub fn is_host(&self, uid: &str) -> bool {
        self.players.get(uid).map(|p| p.is_host).unwrap_or(false)
    }

    pub fn is_player(&self, uid: &str) -> bool {
        self.players.contains_key(uid)
    }

    pub fn has_problem(&self, problem_id: &str) -> bool {
        self.problems.iter().any(|p| p == problem_id)
    }

    /// Remaining match time derived from the shared start anchor.
    /// Returns the full duration while the room is still waiting.
    pub fn remaining_secs(&self, duration_secs: u64, now: u64) -> u64 {
        match self.start_time {
            Some(start) => {
                let elapsed = now.saturating_sub(start) / 1000;
                duration_secs.saturating_sub(elapsed)
            }
            None => duration_secs,
        }
    }
}
