//! Extractor output model.
//!
//! The extractor dumps one JSON document per call: either a single media
//! entry, or a container (playlist, search result) whose `entries` hold the
//! individual media entries. Only the fields the selection rule and the
//! now-playing display need are modeled; everything else in the dump is
//! ignored.

use serde::Deserialize;

/// One downloadable format variant of a media entry
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FormatDescriptor {
    #[serde(default)]
    pub url: Option<String>,
    /// Audio codec tag; `"none"` marks video-only formats
    #[serde(default)]
    pub acodec: Option<String>,
    /// Average audio bitrate hint
    #[serde(default)]
    pub abr: Option<f64>,
    /// Total bitrate hint
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub format_id: Option<String>,
}

/// A single media entry in the extractor output
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ExtractionEntry {
    /// Direct stream URL, when the extractor resolved one
    #[serde(default)]
    pub url: Option<String>,
    /// Canonical page URL of the media
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

/// The raw extraction result: a single entry, or a container of entries.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ExtractionOutput {
    /// Present (and non-empty) when the result is a playlist or search
    /// container
    #[serde(default)]
    pub entries: Option<Vec<ExtractionEntry>>,
    #[serde(flatten)]
    pub entry: ExtractionEntry,
}

impl ExtractionOutput {
    /// The entry candidate selection works on: the container's first entry,
    /// or the result itself when there is no container.
    pub fn primary_entry(&self) -> &ExtractionEntry {
        match &self.entries {
            Some(entries) if !entries.is_empty() => &entries[0],
            _ => &self.entry,
        }
    }

    /// Wraps a single entry as an output (useful for tests and second-pass
    /// extraction results).
    pub fn from_entry(entry: ExtractionEntry) -> Self {
        Self {
            entries: None,
            entry,
        }
    }
}
