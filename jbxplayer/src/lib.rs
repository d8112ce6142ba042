//! # JBXPlayer
//!
//! Per-session playback state: the FIFO queue, the current track, pause and
//! loop state, and the state-transition operations user commands drive.
//!
//! A [`PlayerSession`] is pure in-memory state. It never talks to the voice
//! medium itself; starting and stopping actual streams goes through the
//! [`StreamTransport`] seam, driven by the orchestration layer.

mod error;
mod session;
mod transport;

pub use error::{PlayerError, Result};
pub use session::{LoopMode, NowPlaying, PlayerSession};
pub use transport::StreamTransport;
