use thiserror::Error;

/// Custom error types for the duel server
#[derive(Debug, Error)]
pub enum DuelError {
    /// Room lifecycle errors
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Room {0} already exists")]
    RoomAlreadyExists(String),

    #[error("Room {0} is locked, match already in progress")]
    RoomLocked(String),

    #[error("Match in room {0} already started")]
    AlreadyStarted(String),

    #[error("Could not generate a unique room code after {0} attempts")]
    CodeExhausted(u32),

    #[error("Player {0} is not a member of this room")]
    NotPlayer(String),

    #[error("Player {0} is not the host of this room")]
    NotHost(String),

    /// Store errors
    #[error("Version conflict writing room {0}")]
    VersionConflict(String),

    /// Problem and language errors
    #[error("Problem {0} not found")]
    ProblemNotFound(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Problem {problem} has no harness template for language {language}")]
    MissingTemplate { problem: String, language: String },

    /// Execution gateway errors
    #[error("Execution gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Malformed gateway response: {0}")]
    MalformedGatewayResponse(String),

    /// Request validation errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using DuelError
pub type Result<T> = std::result::Result<T, DuelError>;

impl DuelError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        DuelError::Internal(msg.into())
    }

    /// Helper to create gateway errors
    pub fn gateway(msg: impl Into<String>) -> Self {
        DuelError::GatewayUnavailable(msg.into())
    }

    /// Helper to create request validation errors
    pub fn invalid(msg: impl Into<String>) -> Self {
        DuelError::InvalidRequest(msg.into())
    }
}

impl From<reqwest::Error> for DuelError {
    fn from(err: reqwest::Error) -> Self {
        DuelError::GatewayUnavailable(err.to_string())
    }
}
