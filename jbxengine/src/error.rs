//! Engine error types.

use jbxplayer::PlayerError;
use jbxsource::SessionId;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the orchestration engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// No session with this id is connected
    #[error("No player is connected for session {0}")]
    UnknownSession(SessionId),

    /// The query was empty after trimming
    #[error("Empty query provided")]
    EmptyQuery,

    /// A session operation was rejected (wrong channel, bad seek, ...)
    #[error(transparent)]
    Player(#[from] PlayerError),
}
