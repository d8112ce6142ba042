//! Player error types.

use jbxsource::ChannelId;
use thiserror::Error;

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors raised by session playback operations
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The requesting actor is not in the session's bound voice channel.
    /// Raised before any mutation, so rejected operations change nothing.
    #[error("You must be in the same voice channel as the player")]
    WrongChannel {
        expected: ChannelId,
        actual: ChannelId,
    },

    /// Seeking past the end of the current track
    #[error("Seek target {target}s is beyond the track length of {length}s")]
    SeekOutOfRange { target: i64, length: u64 },

    /// The operation needs a current track and the session is idle
    #[error("Nothing is playing")]
    NoCurrentTrack,

    /// Loop mode name outside `none`/`current`/`playlist`
    #[error("Unknown loop mode: {0}")]
    UnknownLoopMode(String),

    /// The voice-transport collaborator failed to start or stop a stream
    #[error("Stream transport failed: {0}")]
    Transport(String),
}
