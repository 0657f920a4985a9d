use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RoomConfig;
use crate::error::{DuelError, Result};
use crate::problems::ProblemCatalog;

use super::archive::ArchiveStore;
use super::code::generate_room_code;
use super::model::{now_ms, ChatMessage, Player, Room, RoomStatus, SolvedEntry};
use super::store::RoomStore;

/// Verified identity handed to every coordinator operation. The
/// authentication layer upstream guarantees the uid is trustworthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// The room state machine. Every mutation of a live room document goes
/// through one of the named operations here; each multi-step mutation is a
/// read-modify-CAS loop against the store, so two concurrent writers can
/// never both commit from the same stale snapshot.
pub struct RoomCoordinator {
    store: Arc<RoomStore>,
    archive: Arc<ArchiveStore>,
    catalog: Arc<ProblemCatalog>,
    config: RoomConfig,
}

impl RoomCoordinator {
    pub fn new(
        store: Arc<RoomStore>,
        archive: Arc<ArchiveStore>,
        catalog: Arc<ProblemCatalog>,
        config: RoomConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            archive,
            catalog,
            config,
        })
    }

    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }

    pub fn archive(&self) -> &Arc<ArchiveStore> {
        &self.archive
    }

    pub fn catalog(&self) -> &Arc<ProblemCatalog> {
        &self.catalog
    }

    /// Create a new room with the caller as its sole host.
    /// Codes are collision-checked against live rooms with a bounded
    /// number of retries; nothing is written if generation fails.
    pub async fn create_room(
        &self,
        owner: &UserProfile,
        room_name: Option<String>,
        mode: Option<String>,
        difficulty: Option<String>,
    ) -> Result<(String, Room)> {
        let difficulty = difficulty.unwrap_or_else(|| "mixed".to_string());
        let now = now_ms();

        for _ in 0..self.config.code_retries {
            let code = generate_room_code(self.config.code_length);
            if self.store.contains(&code).await {
                continue;
            }

            let host = Player {
                uid: owner.uid.clone(),
                name: owner.name.clone().unwrap_or_else(|| "Host".to_string()),
                avatar_url: owner.avatar_url.clone(),
                is_host: true,
                joined_at: now,
            };

            let room = Room {
                code: code.clone(),
                room_name: room_name
                    .clone()
                    .unwrap_or_else(|| "Untitled Room".to_string()),
                mode: mode.clone().unwrap_or_else(|| "dsa".to_string()),
                difficulty: difficulty.clone(),
                status: RoomStatus::Waiting,
                created_at: now,
                start_time: None,
                players: [(owner.uid.clone(), host)].into_iter().collect(),
                problems: self
                    .catalog
                    .sample(&difficulty, self.config.problems_per_room),
                solved: Default::default(),
                messages: Vec::new(),
            };

            match self.store.insert(&code, room.clone()).await {
                Ok(()) => {
                    tracing::info!(room_code = %code, host = %owner.uid, "Room created");
                    return Ok((code, room));
                }
                // Lost a race for this code, count it as a collision
                Err(DuelError::RoomAlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            retries = self.config.code_retries,
            "Exhausted room code generation attempts"
        );
        Err(DuelError::CodeExhausted(self.config.code_retries))
    }

    /// Join an existing room. Re-joining after a reconnect is idempotent:
    /// the player's entry is refreshed without touching `is_host` or the
    /// original join timestamp.
    pub async fn join_room(&self, code: &str, user: &UserProfile) -> Result<Room> {
        loop {
            let (version, mut room) = self
                .store
                .get(code)
                .await
                .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

            if room.status == RoomStatus::Ongoing && !room.is_player(&user.uid) {
                return Err(DuelError::RoomLocked(code.to_string()));
            }

            let existing = room.players.get(&user.uid);
            let player = Player {
                uid: user.uid.clone(),
                name: user.name.clone().unwrap_or_else(|| "Guest".to_string()),
                avatar_url: user.avatar_url.clone(),
                is_host: existing.map(|p| p.is_host).unwrap_or(false),
                joined_at: existing.map(|p| p.joined_at).unwrap_or_else(now_ms),
            };
            room.players.insert(user.uid.clone(), player);

            match self.store.compare_and_set(code, version, room.clone()).await {
                Ok(_) => {
                    tracing::info!(room_code = %code, uid = %user.uid, "Player joined room");
                    return Ok(room);
                }
                Err(DuelError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Start the match. Host-only; sets status and the shared start-time
    /// anchor in one committed write, so of two concurrent starts exactly
    /// one succeeds.
    pub async fn start_match(&self, code: &str, caller_uid: &str) -> Result<Room> {
        loop {
            let (version, mut room) = self
                .store
                .get(code)
                .await
                .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

            if !room.is_host(caller_uid) {
                return Err(DuelError::NotHost(caller_uid.to_string()));
            }
            if room.status != RoomStatus::Waiting {
                return Err(DuelError::AlreadyStarted(code.to_string()));
            }

            room.status = RoomStatus::Ongoing;
            room.start_time = Some(now_ms());

            match self.store.compare_and_set(code, version, room.clone()).await {
                Ok(_) => {
                    tracing::info!(room_code = %code, host = %caller_uid, "Match started");
                    return Ok(room);
                }
                // Someone else committed first; re-read and re-validate,
                // a concurrent start will now surface as AlreadyStarted
                Err(DuelError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Leave the room. A host leave snapshots the whole room into the
    /// archive and removes it from the live store in one atomic removal;
    /// a guest leave only drops that player's entry. Returns whether the
    /// room was archived.
    pub async fn leave_room(&self, code: &str, caller_uid: &str) -> Result<bool> {
        loop {
            let (version, mut room) = self
                .store
                .get(code)
                .await
                .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

            if !room.is_player(caller_uid) {
                return Err(DuelError::NotPlayer(caller_uid.to_string()));
            }

            if room.is_host(caller_uid) {
                match self.store.remove(code, version).await {
                    Ok(snapshot) => {
                        self.archive.record(snapshot).await;
                        tracing::info!(room_code = %code, "Host left, room archived and closed");
                        return Ok(true);
                    }
                    Err(DuelError::VersionConflict(_)) => continue,
                    Err(e) => return Err(e),
                }
            }

            room.players.remove(caller_uid);
            match self.store.compare_and_set(code, version, room).await {
                Ok(_) => {
                    tracing::info!(room_code = %code, uid = %caller_uid, "Player left room");
                    return Ok(false);
                }
                Err(DuelError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Record the first accepted submission for a problem. Called by the
    /// grading pipeline after a fully-passing verdict. Conditional write:
    /// a problem already solved keeps its original record and `false` is
    /// returned.
    pub async fn record_solved(
        &self,
        code: &str,
        problem_id: &str,
        solver_uid: &str,
        source: &str,
        language: &str,
    ) -> Result<bool> {
        loop {
            let (version, mut room) = self
                .store
                .get(code)
                .await
                .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

            if !room.has_problem(problem_id) {
                return Err(DuelError::ProblemNotFound(problem_id.to_string()));
            }
            if room.solved.contains_key(problem_id) {
                return Ok(false);
            }

            room.solved.insert(
                problem_id.to_string(),
                SolvedEntry {
                    solver_uid: solver_uid.to_string(),
                    solved_at: now_ms(),
                    language: language.to_string(),
                    source: source.to_string(),
                },
            );

            match self.store.compare_and_set(code, version, room).await {
                Ok(_) => {
                    tracing::info!(
                        room_code = %code,
                        problem_id = %problem_id,
                        solver = %solver_uid,
                        "Problem solved"
                    );
                    return Ok(true);
                }
                Err(DuelError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Append a chat message with a server-assigned timestamp
    pub async fn send_message(&self, code: &str, sender_uid: &str, text: &str) -> Result<Room> {
        loop {
            let (version, mut room) = self
                .store
                .get(code)
                .await
                .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))?;

            let sender = room
                .players
                .get(sender_uid)
                .ok_or_else(|| DuelError::NotPlayer(sender_uid.to_string()))?;

            let message = ChatMessage {
                sender_uid: sender_uid.to_string(),
                sender_name: sender.name.clone(),
                text: text.to_string(),
                sent_at: now_ms(),
            };
            room.messages.push(message);

            match self.store.compare_and_set(code, version, room.clone()).await {
                Ok(_) => return Ok(room),
                Err(DuelError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_room(&self, code: &str) -> Result<Room> {
        self.store
            .get(code)
            .await
            .map(|(_, room)| room)
            .ok_or_else(|| DuelError::RoomNotFound(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(uid: &str, name: &str) -> UserProfile {
        UserProfile {
            uid: uid.to_string(),
            name: Some(name.to_string()),
            avatar_url: None,
        }
    }

    fn coordinator() -> Arc<RoomCoordinator> {
        RoomCoordinator::new(
            Arc::new(RoomStore::new()),
            Arc::new(ArchiveStore::new()),
            Arc::new(ProblemCatalog::builtin()),
            RoomConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_room() {
        let coord = coordinator();
        let (code, room) = coord
            .create_room(&user("u1", "Alice"), Some("duel".to_string()), None, None)
            .await
            .unwrap();

        assert_eq!(code.len(), 6);
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.problems.len(), 4);
        assert!(room.start_time.is_none());
        assert_eq!(room.host_id(), Some("u1"));
        assert!(coord.store().contains(&code).await);
    }

    #[tokio::test]
    async fn test_exactly_one_host() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();
        coord.join_room(&code, &user("u3", "Carol")).await.unwrap();

        let room = coord.get_room(&code).await.unwrap();
        let hosts = room.players.values().filter(|p| p.is_host).count();
        assert_eq!(hosts, 1);
    }

    #[tokio::test]
    async fn test_join_nonexistent_room() {
        let coord = coordinator();
        let err = coord
            .join_room("NOPE42", &user("u2", "Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, DuelError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_rejoin_does_not_reset_host_flag() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();

        // Host reconnects under the same uid
        let room = coord.join_room(&code, &user("u1", "Alice")).await.unwrap();
        assert!(room.is_host("u1"));
        assert_eq!(room.players.len(), 1);
    }

    #[tokio::test]
    async fn test_join_locked_once_ongoing() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();
        coord.start_match(&code, "u1").await.unwrap();

        // New player is rejected mid-match
        let err = coord
            .join_room(&code, &user("u3", "Carol"))
            .await
            .unwrap_err();
        assert!(matches!(err, DuelError::RoomLocked(_)));

        // An existing player reconnecting is still allowed
        let room = coord.join_room(&code, &user("u2", "Bob")).await.unwrap();
        assert!(room.is_player("u2"));
    }

    #[tokio::test]
    async fn test_start_match_requires_host() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();

        let err = coord.start_match(&code, "u2").await.unwrap_err();
        assert!(matches!(err, DuelError::NotHost(_)));

        let room = coord.start_match(&code, "u1").await.unwrap();
        assert_eq!(room.status, RoomStatus::Ongoing);
        assert!(room.start_time.is_some());
    }

    #[tokio::test]
    async fn test_start_match_twice_fails() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.start_match(&code, "u1").await.unwrap();

        let err = coord.start_match(&code, "u1").await.unwrap_err();
        assert!(matches!(err, DuelError::AlreadyStarted(_)));
    }

    #[tokio::test]
    async fn test_concurrent_start_single_winner() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();

        let a = {
            let coord = coord.clone();
            let code = code.clone();
            tokio::spawn(async move { coord.start_match(&code, "u1").await })
        };
        let b = {
            let coord = coord.clone();
            let code = code.clone();
            tokio::spawn(async move { coord.start_match(&code, "u1").await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let already = results
            .iter()
            .filter(|r| matches!(r, Err(DuelError::AlreadyStarted(_))))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(already, 1);
    }

    #[tokio::test]
    async fn test_guest_leave_keeps_room_alive() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();

        let archived = coord.leave_room(&code, "u2").await.unwrap();
        assert!(!archived);

        let room = coord.get_room(&code).await.unwrap();
        assert!(!room.is_player("u2"));
        assert_eq!(room.host_id(), Some("u1"));
    }

    #[tokio::test]
    async fn test_host_leave_archives_and_closes() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();

        let archived = coord.leave_room(&code, "u1").await.unwrap();
        assert!(archived);

        // Room is gone from the live store, later joins fail
        let err = coord
            .join_room(&code, &user("u3", "Carol"))
            .await
            .unwrap_err();
        assert!(matches!(err, DuelError::RoomNotFound(_)));

        // And the snapshot landed in the archive with both players
        let records = coord.archive().find_by_code(&code).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].room.players.len(), 2);
    }

    #[tokio::test]
    async fn test_record_solved_first_wins() {
        let coord = coordinator();
        let (code, room) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();
        let problem_id = room.problems[0].clone();

        let first = coord
            .record_solved(&code, &problem_id, "u1", "def f(): pass", "python")
            .await
            .unwrap();
        assert!(first);

        // A later accepted submission by another player does not overwrite
        let second = coord
            .record_solved(&code, &problem_id, "u2", "def g(): pass", "python")
            .await
            .unwrap();
        assert!(!second);

        let room = coord.get_room(&code).await.unwrap();
        assert_eq!(room.solved[&problem_id].solver_uid, "u1");
        assert_eq!(room.solved[&problem_id].source, "def f(): pass");
    }

    #[tokio::test]
    async fn test_record_solved_unknown_problem() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();

        let err = coord
            .record_solved(&code, "not-in-set", "u1", "", "python")
            .await
            .unwrap_err();
        assert!(matches!(err, DuelError::ProblemNotFound(_)));
    }

    #[tokio::test]
    async fn test_record_solved_after_close() {
        let coord = coordinator();
        let (code, room) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        let problem_id = room.problems[0].clone();
        coord.leave_room(&code, "u1").await.unwrap();

        let err = coord
            .record_solved(&code, &problem_id, "u1", "", "python")
            .await
            .unwrap_err();
        assert!(matches!(err, DuelError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn test_chat_messages_append_in_order() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();

        coord.send_message(&code, "u1", "gl hf").await.unwrap();
        coord.send_message(&code, "u2", "you too").await.unwrap();
        let room = coord.send_message(&code, "u1", "started?").await.unwrap();

        let texts: Vec<&str> = room.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["gl hf", "you too", "started?"]);
        assert!(room.messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));
    }

    #[tokio::test]
    async fn test_chat_from_non_player_rejected() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();

        let err = coord.send_message(&code, "lurker", "hi").await.unwrap_err();
        assert!(matches!(err, DuelError::NotPlayer(_)));
    }

    #[tokio::test]
    async fn test_subscribers_see_joins() {
        let coord = coordinator();
        let (code, _) = coord
            .create_room(&user("u1", "Alice"), None, None, None)
            .await
            .unwrap();

        let mut feed = coord.store().subscribe(&code).await.unwrap();
        coord.join_room(&code, &user("u2", "Bob")).await.unwrap();

        let snapshot = feed.recv().await.unwrap();
        assert!(snapshot.is_player("u2"));
    }
}
