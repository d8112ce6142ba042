//! Session playback state machine.
//!
//! States: `Idle` (no current track) → `Playing` ⇄ `Paused` → back to `Idle`
//! when the queue runs dry or the session is stopped. All structural
//! mutations are plain in-memory operations; transport control happens
//! elsewhere.
//!
//! Every user-command operation checks the same-channel authorization
//! invariant first and rejects with no state change when the requesting
//! actor sits in a different voice channel than the one the session is
//! bound to.

use crate::error::{PlayerError, Result};
use jbxsource::{ChannelId, ProviderKind, SessionId, Track};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Loop behaviour applied when a track finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Play through the queue once
    #[default]
    None,
    /// Repeat the current track
    Current,
    /// Rotate finished tracks back to the tail of the queue
    Playlist,
}

impl FromStr for LoopMode {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LoopMode::None),
            "current" => Ok(LoopMode::Current),
            "playlist" => Ok(LoopMode::Playlist),
            other => Err(PlayerError::UnknownLoopMode(other.to_string())),
        }
    }
}

/// Descriptor of a stream started through the extraction pipeline.
///
/// Attached best-effort: the stream plays the same whether or not this is
/// set, it only feeds the now-playing display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration_secs: Option<f64>,
    pub source_url: String,
}

/// Per-voice-session playback state.
///
/// Created when a voice session connects, destroyed on disconnect; nothing
/// here survives the process. The owning layer must serialize operations per
/// session (two concurrent advances would double-pop the queue).
#[derive(Debug)]
pub struct PlayerSession {
    id: SessionId,
    bound_channel: ChannelId,
    queue: VecDeque<Track>,
    current: Option<Track>,
    position: Duration,
    paused: bool,
    loop_mode: LoopMode,
    default_provider: ProviderKind,
    now_playing: Option<NowPlaying>,
    reply_channel: Option<ChannelId>,
}

impl PlayerSession {
    pub fn new(id: SessionId, bound_channel: ChannelId, default_provider: ProviderKind) -> Self {
        Self {
            id,
            bound_channel,
            queue: VecDeque::new(),
            current: None,
            position: Duration::ZERO,
            paused: false,
            loop_mode: LoopMode::None,
            default_provider,
            now_playing: None,
            reply_channel: None,
        }
    }

    // ============ Accessors ============

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn bound_channel(&self) -> ChannelId {
        self.bound_channel
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_snapshot(&self) -> Vec<Track> {
        self.queue.iter().cloned().collect()
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    /// Channel where replies and notifications for this session render
    pub fn reply_channel(&self) -> Option<ChannelId> {
        self.reply_channel
    }

    /// Binds the reply channel (set once when the session connects).
    /// Survives `stop`; dies with the session.
    pub fn bind_reply_channel(&mut self, channel: ChannelId) {
        self.reply_channel = Some(channel);
    }

    /// True iff a current track is set and the session is not paused
    pub fn is_playing(&self) -> bool {
        self.current.is_some() && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Checks the same-channel invariant for a requesting actor.
    pub fn authorize(&self, actor: ChannelId) -> Result<()> {
        if actor != self.bound_channel {
            return Err(PlayerError::WrongChannel {
                expected: self.bound_channel,
                actual: actor,
            });
        }
        Ok(())
    }

    // ============ Queue operations ============

    /// Appends a track to the tail of the queue.
    pub fn enqueue(&mut self, actor: ChannelId, track: Track) -> Result<()> {
        self.authorize(actor)?;
        debug!(session = %self.id, title = %track.title, "Enqueued track");
        self.queue.push_back(track);
        Ok(())
    }

    /// Appends several tracks, keeping their order.
    pub fn enqueue_all(&mut self, actor: ChannelId, tracks: Vec<Track>) -> Result<usize> {
        self.authorize(actor)?;
        let count = tracks.len();
        self.queue.extend(tracks);
        debug!(session = %self.id, count, "Enqueued tracks");
        Ok(count)
    }

    /// Moves playback to the next track according to the loop mode.
    ///
    /// With `LoopMode::Current` the finished track simply starts over. With
    /// `LoopMode::Playlist` the finished track is re-appended to the tail
    /// before the head is popped. Returns the new current track, or `None`
    /// when the queue is exhausted and the session goes idle.
    ///
    /// This is not actor-gated: it is driven by track completion and by
    /// already-authorized operations, not directly by user commands.
    pub fn advance(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Current {
            if let Some(track) = &self.current {
                self.position = Duration::ZERO;
                self.paused = false;
                return Some(track.clone());
            }
        }

        let finished = self.current.take();
        if self.loop_mode == LoopMode::Playlist {
            if let Some(finished) = finished {
                self.queue.push_back(finished);
            }
        }

        self.current = self.queue.pop_front();
        self.position = Duration::ZERO;
        self.paused = false;
        self.now_playing = None;
        self.current.clone()
    }

    /// Forces an advance regardless of loop mode.
    ///
    /// Skip always means "move on": with `LoopMode::Current` the loop is
    /// reset to `LoopMode::None` first so the queue head, not the skipped
    /// track, becomes current. Returns the new current track.
    pub fn skip(&mut self, actor: ChannelId) -> Result<Option<Track>> {
        self.authorize(actor)?;
        if self.current.is_none() {
            return Err(PlayerError::NoCurrentTrack);
        }
        if self.loop_mode == LoopMode::Current {
            self.loop_mode = LoopMode::None;
        }
        Ok(self.advance())
    }

    // ============ Transport state ============

    /// Pauses the current track.
    pub fn pause(&mut self, actor: ChannelId) -> Result<()> {
        self.authorize(actor)?;
        if self.current.is_none() {
            return Err(PlayerError::NoCurrentTrack);
        }
        self.paused = true;
        Ok(())
    }

    /// Resumes a paused track.
    pub fn resume(&mut self, actor: ChannelId) -> Result<()> {
        self.authorize(actor)?;
        if self.current.is_none() {
            return Err(PlayerError::NoCurrentTrack);
        }
        self.paused = false;
        Ok(())
    }

    /// Moves the playback position by `delta` seconds.
    ///
    /// Rejects without changing state when the resulting position would
    /// exceed the track length; negative results clamp to zero. Returns the
    /// new position.
    pub fn seek(&mut self, actor: ChannelId, delta: i64) -> Result<Duration> {
        self.authorize(actor)?;
        let current = self.current.as_ref().ok_or(PlayerError::NoCurrentTrack)?;

        let length = current.duration.as_secs();
        let target = self.position.as_secs() as i64 + delta;
        if target > length as i64 {
            return Err(PlayerError::SeekOutOfRange { target, length });
        }

        self.position = Duration::from_secs(target.max(0) as u64);
        Ok(self.position)
    }

    /// Sets the loop mode.
    ///
    /// Invalid mode names never reach this point: parsing user input happens
    /// at the boundary through [`LoopMode::from_str`].
    pub fn set_loop(&mut self, actor: ChannelId, mode: LoopMode) -> Result<()> {
        self.authorize(actor)?;
        self.loop_mode = mode;
        Ok(())
    }

    /// Sets the provider kind used when a request does not choose one.
    pub fn set_default_provider(&mut self, actor: ChannelId, kind: ProviderKind) -> Result<()> {
        self.authorize(actor)?;
        self.default_provider = kind;
        Ok(())
    }

    /// Stops playback and clears all transient state.
    pub fn stop(&mut self, actor: ChannelId) -> Result<()> {
        self.authorize(actor)?;
        self.clear();
        Ok(())
    }

    /// Clears queue, current track and transport state (internal, used on
    /// stop and on disconnect).
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
        self.position = Duration::ZERO;
        self.paused = false;
        self.now_playing = None;
    }

    // ============ Direct streams ============

    /// Makes `track` current immediately, bypassing the queue.
    ///
    /// Used by the extraction pipeline, which starts a stream directly
    /// instead of enqueueing a backend track.
    pub fn begin_stream(&mut self, track: Track) {
        self.current = Some(track);
        self.position = Duration::ZERO;
        self.paused = false;
    }

    /// Attaches the now-playing descriptor of a directly-started stream.
    pub fn set_now_playing(&mut self, descriptor: NowPlaying) {
        self.now_playing = Some(descriptor);
    }
}
