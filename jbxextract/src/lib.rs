//! # JBXExtract
//!
//! The fallback extraction pipeline: when the backend node pool cannot serve
//! a request (or the request is classified as extract-first), the query is
//! handed to a blocking media extractor running on a small worker-thread
//! pool, the best audio candidate is selected from its output, and the
//! stream is started directly on the session, bypassing the backends
//! entirely.
//!
//! Credential material for the extractor (a cookie file published through a
//! gist) is cached in memory in a single slot and written to a single-use
//! temporary file per extraction call.

mod credentials;
mod error;
mod extractor;
mod model;
mod pipeline;
mod selection;
mod worker;

pub use credentials::{CredentialCache, CredentialSnapshot, RefreshOutcome, GIST_API_BASE};
pub use error::{ExtractError, Result};
pub use extractor::{Extractor, YtDlpExtractor};
pub use model::{ExtractionEntry, ExtractionOutput, FormatDescriptor};
pub use pipeline::{ExtractRouting, FallbackPipeline};
pub use selection::{AudioCandidate, choose_audio_candidate};
pub use worker::{ExtractionPool, DEFAULT_CALL_TIMEOUT, DEFAULT_WORKERS};
