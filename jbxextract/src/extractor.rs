//! Extraction service binding.
//!
//! The extractor is a synchronous, blocking call: it runs the `yt-dlp`
//! binary and parses the JSON dump it prints. Callers must never run it on
//! the async loop; that is what the worker pool is for.

use crate::error::{ExtractError, Result};
use crate::model::ExtractionOutput;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Blocking metadata extraction over a query or URL.
///
/// `credential_file` points at a Netscape-format cookie file valid for the
/// duration of this one call.
pub trait Extractor: Send + Sync {
    fn extract(&self, query: &str, credential_file: Option<&Path>) -> Result<ExtractionOutput>;
}

/// Production extractor: spawns the `yt-dlp` binary.
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Arguments for one extraction call: a metadata-only JSON dump of the best
/// audio format, certificate checks relaxed the way the hosting environments
/// need.
fn build_args(query: &str, credential_file: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--dump-single-json",
        "--format",
        "bestaudio/best",
        "--no-warnings",
        "--skip-download",
        "--no-check-certificates",
        "--source-address",
        "0.0.0.0",
    ]
    .iter()
    .map(OsString::from)
    .collect();

    if let Some(path) = credential_file {
        args.push(OsString::from("--cookies"));
        args.push(path.as_os_str().to_os_string());
    }

    args.push(OsString::from(query));
    args
}

impl Extractor for YtDlpExtractor {
    fn extract(&self, query: &str, credential_file: Option<&Path>) -> Result<ExtractionOutput> {
        let args = build_args(query, credential_file);
        debug!(binary = %self.binary, query = %query, "Running extractor");

        let output = Command::new(&self.binary).args(&args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::ExtractorFailed(stderr.trim().to_string()));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}
