//! Credential cache for the extraction pipeline.
//!
//! The extractor can use a cookie file published as a gist. The cache holds
//! at most one snapshot of that file's text in memory for the process
//! lifetime; a successful fetch or forced refresh overwrites the slot whole.
//! When the configured source is a gist page URL or bare gist id rather than
//! a raw URL, it is resolved through the gists API first, so the cache
//! always follows the latest revision.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gists API endpoint used to resolve a gist id to its raw file URL
pub const GIST_API_BASE: &str = "https://api.github.com/gists";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "jbxmusic";

/// One fetched copy of the credential text
#[derive(Debug, Clone)]
pub struct CredentialSnapshot {
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Result of a [`CredentialCache::refresh`] call
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A snapshot already existed and `force` was false; nothing was fetched
    AlreadyCached { fetched_at: DateTime<Utc> },
    /// A fresh snapshot was fetched and stored
    Refreshed,
    /// The fetch failed; the detail is the HTTP status or error text
    Failed(String),
}

#[derive(Deserialize)]
struct GistResponse {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Deserialize)]
struct GistFile {
    raw_url: Option<String>,
}

/// Single-slot in-memory credential cache.
pub struct CredentialCache {
    source: Option<String>,
    filename: String,
    fetch_timeout: Duration,
    api_base: String,
    http: reqwest::Client,
    slot: RwLock<Option<CredentialSnapshot>>,
}

impl CredentialCache {
    /// Creates a cache for the given source.
    ///
    /// `source` may be a direct raw URL, a gist page URL or a bare gist id;
    /// `None` disables fetching entirely. `filename` picks the file inside
    /// multi-file gists.
    pub fn new(source: Option<String>, filename: impl Into<String>) -> Self {
        Self {
            source,
            filename: filename.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            api_base: GIST_API_BASE.to_string(),
            http: reqwest::Client::new(),
            slot: RwLock::new(None),
        }
    }

    /// Overrides the fetch timeout
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Overrides the gists API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Returns the current snapshot, if any
    pub fn snapshot(&self) -> Option<CredentialSnapshot> {
        self.slot.read().unwrap().clone()
    }

    /// Returns the credential text, fetching it once if the slot is empty.
    ///
    /// Absence of credentials is not an error: any failure (no source
    /// configured, network error, non-200 status, unresolvable gist) returns
    /// `None` without raising, and the extraction pipeline proceeds without
    /// a cookie file.
    pub async fn fetch(&self) -> Option<String> {
        if let Some(snapshot) = self.slot.read().unwrap().as_ref() {
            return Some(snapshot.text.clone());
        }
        let source = self.source.as_ref()?;
        match self.fetch_remote(source).await {
            Ok(text) => {
                self.store(text.clone());
                Some(text)
            }
            Err(detail) => {
                debug!(detail = %detail, "Credential fetch failed, proceeding without cookies");
                None
            }
        }
    }

    /// Re-fetches the credential text.
    ///
    /// Without `force`, an existing snapshot short-circuits as a no-op
    /// notice. With `force` (or an empty slot) the fetch always runs and a
    /// success overwrites the slot unconditionally.
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        if !force {
            if let Some(snapshot) = self.slot.read().unwrap().as_ref() {
                return RefreshOutcome::AlreadyCached {
                    fetched_at: snapshot.fetched_at,
                };
            }
        }

        let Some(source) = self.source.as_ref() else {
            return RefreshOutcome::Failed("No cookie source configured".to_string());
        };

        match self.fetch_remote(source).await {
            Ok(text) => {
                self.store(text);
                info!("Credentials refreshed and cached in memory");
                RefreshOutcome::Refreshed
            }
            Err(detail) => {
                warn!(detail = %detail, "Credential refresh failed");
                RefreshOutcome::Failed(detail)
            }
        }
    }

    /// Seeds the slot directly (tests)
    pub(crate) fn store(&self, text: String) {
        *self.slot.write().unwrap() = Some(CredentialSnapshot {
            text,
            fetched_at: Utc::now(),
        });
    }

    async fn fetch_remote(&self, source: &str) -> std::result::Result<String, String> {
        let candidate = if source.contains("gist.githubusercontent.com") || source.contains("raw")
        {
            source.to_string()
        } else {
            self.resolve_raw_url(source)
                .await
                .ok_or_else(|| "Failed to resolve gist raw URL".to_string())?
        };

        let response = self
            .http
            .get(&candidate)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        response.text().await.map_err(|e| e.to_string())
    }

    /// Resolves a gist page URL or bare id to the raw URL of the configured
    /// file through the gists API.
    async fn resolve_raw_url(&self, source: &str) -> Option<String> {
        let gist_id = gist_id_from(source)?;
        let api_url = format!("{}/{}", self.api_base, gist_id);

        let response = self
            .http
            .get(&api_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .ok()?;
        if response.status() != reqwest::StatusCode::OK {
            return None;
        }
        let gist: GistResponse = response.json().await.ok()?;

        let file = match gist.files.get(&self.filename) {
            Some(file) => Some(file),
            // A single-file gist is unambiguous whatever the file is called
            None if gist.files.len() == 1 => gist.files.values().next(),
            None => None,
        }?;
        file.raw_url.clone()
    }
}

/// Extracts a gist id from a bare id or any URL whose path contains one.
fn gist_id_from(source: &str) -> Option<String> {
    let bare = Regex::new(r"^[0-9a-fA-F]{8,}$").ok()?;
    if bare.is_match(source) {
        return Some(source.to_string());
    }
    let in_path = Regex::new(r"/([0-9a-fA-F]{8,})(?:/|$)").ok()?;
    in_path
        .captures(source.trim_end_matches('/'))
        .map(|caps| caps[1].to_string())
        .or_else(|| {
            source
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|last| bare.is_match(last))
                .map(str::to_string)
        })
}
