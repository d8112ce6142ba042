//! # JBXEngine
//!
//! The resolution & playback orchestration engine. Owns the backend node
//! pool, the search dispatcher, the fallback extraction pipeline and the
//! per-session playback state, and routes every resolution request to a
//! terminal, user-visible outcome.
//!
//! Concurrency model: resolution requests for different sessions interleave
//! freely on the async loop; everything that mutates one session's state
//! goes through that session's mutex, so two concurrent advances can never
//! double-pop a queue. Blocking extraction work never runs here — it lives
//! on the worker threads owned by `jbxextract`.

mod engine;
mod error;

pub use engine::{EngineOptions, PlaybackEngine, ResolveOutcome};
pub use error::{EngineError, Result};
