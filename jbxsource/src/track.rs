//! Track model: the playable unit a backend search or extraction yields.

use crate::ProviderKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A provider-specific playable unit.
///
/// The orchestrator treats queued tracks as opaque beyond ordering; the
/// `identifier` is whatever the backend needs to resolve the stream again
/// (an encoded track token, a direct URL, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Backend-resolvable identifier
    pub identifier: String,
    /// Human-readable title
    pub title: String,
    /// Track length
    pub duration: Duration,
    /// Which provider produced this track
    pub kind: ProviderKind,
    /// Display name of whoever requested the track, when known
    pub requester: Option<String>,
}

impl Track {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        duration: Duration,
        kind: ProviderKind,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            duration,
            kind,
            requester: None,
        }
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }
}

/// What a successful backend search yields: a single track, or a playlist
/// container whose full ordered contents are loaded at once.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackLoad {
    Single(Track),
    Playlist { name: String, tracks: Vec<Track> },
}

impl TrackLoad {
    /// Flattens the load into the ordered track list to enqueue.
    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            TrackLoad::Single(track) => vec![track],
            TrackLoad::Playlist { tracks, .. } => tracks,
        }
    }

    /// Number of tracks in the load
    pub fn len(&self) -> usize {
        match self {
            TrackLoad::Single(_) => 1,
            TrackLoad::Playlist { tracks, .. } => tracks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TrackLoad::Single(_) => false,
            TrackLoad::Playlist { tracks, .. } => tracks.is_empty(),
        }
    }
}
