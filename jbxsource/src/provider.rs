//! Provider kinds: the category of backend search semantics a request asks for.

use crate::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The category of backend search a request resolves against.
///
/// This is a closed set: unknown kind names are rejected at the boundary by
/// [`FromStr`] instead of being silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Plain single-track search (the default)
    Generic,
    /// Playlist search: the whole ordered playlist is loaded
    Playlist,
    /// Music-catalogue track search
    MusicTrack,
    /// SoundCloud track search
    SoundCloud,
    /// Spotify track search
    Spotify,
}

impl ProviderKind {
    /// Canonical name, as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Generic => "generic",
            ProviderKind::Playlist => "playlist",
            ProviderKind::MusicTrack => "music-track",
            ProviderKind::SoundCloud => "soundcloud",
            ProviderKind::Spotify => "spotify",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = SourceError;

    /// Parses a kind name. The short aliases (`yt`, `ytpl`, `ytmusic`) kept
    /// from the chat-command surface are accepted alongside the canonical
    /// names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "yt" => Ok(ProviderKind::Generic),
            "playlist" | "ytpl" => Ok(ProviderKind::Playlist),
            "music-track" | "ytmusic" => Ok(ProviderKind::MusicTrack),
            "soundcloud" => Ok(ProviderKind::SoundCloud),
            "spotify" => Ok(ProviderKind::Spotify),
            other => Err(SourceError::UnknownProviderKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names() {
        assert_eq!(
            "generic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Generic
        );
        assert_eq!(
            "music-track".parse::<ProviderKind>().unwrap(),
            ProviderKind::MusicTrack
        );
        assert_eq!(
            "Spotify".parse::<ProviderKind>().unwrap(),
            ProviderKind::Spotify
        );
    }

    #[test]
    fn parses_short_aliases() {
        assert_eq!("yt".parse::<ProviderKind>().unwrap(), ProviderKind::Generic);
        assert_eq!(
            "ytpl".parse::<ProviderKind>().unwrap(),
            ProviderKind::Playlist
        );
        assert_eq!(
            "ytmusic".parse::<ProviderKind>().unwrap(),
            ProviderKind::MusicTrack
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "vimeo".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, SourceError::UnknownProviderKind(k) if k == "vimeo"));
    }
}
