//! # JBXSource
//!
//! Common types shared by the JBXMusic crates: track and id models, provider
//! kinds and the player event bus.
//!
//! Everything here is plain data. Behaviour (searching, extraction, playback)
//! lives in the crates that consume these types.

mod events;
mod provider;
mod track;

pub use events::{EventBus, PlayerEvent};
pub use provider::ProviderKind;
pub use track::{Track, TrackLoad};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error types for shared model parsing
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Unknown provider kind: {0}")]
    UnknownProviderKind(String),
}

/// Result type for shared model operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Identifier of a backend node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a voice session (one per guild/voice connection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a voice channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
