//! Playback orchestration engine.

use crate::error::{EngineError, Result};
use jbxconfig::NodeEntry;
use jbxextract::{
    CredentialCache, ExtractRouting, ExtractionPool, Extractor, FallbackPipeline, RefreshOutcome,
};
use jbxnodes::{BackendNode, NodeBackend, NodePool, SearchDispatcher, SearchOutcome, SearchRequest};
use jbxplayer::{LoopMode, PlayerError, PlayerSession, StreamTransport};
use jbxsource::{ChannelId, EventBus, NodeId, PlayerEvent, ProviderKind, SessionId, Track};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Knobs the engine is built with.
///
/// [`EngineOptions::from_config`] reads them from the configuration file;
/// tests construct them directly.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub default_provider: ProviderKind,
    pub search_timeout: Duration,
    pub extract_workers: usize,
    pub extract_call_timeout: Duration,
    pub cookie_source: Option<String>,
    pub cookie_filename: String,
    pub cookie_fetch_timeout: Duration,
    pub extract_domains: Vec<String>,
    pub extract_kinds: Vec<ProviderKind>,
    pub nodes: Vec<NodeEntry>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_provider: ProviderKind::Generic,
            search_timeout: jbxnodes::DEFAULT_SEARCH_TIMEOUT,
            extract_workers: jbxextract::DEFAULT_WORKERS,
            extract_call_timeout: jbxextract::DEFAULT_CALL_TIMEOUT,
            cookie_source: None,
            cookie_filename: "gistfile1.txt".to_string(),
            cookie_fetch_timeout: Duration::from_secs(10),
            extract_domains: Vec::new(),
            extract_kinds: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

impl EngineOptions {
    /// Builds options from the global configuration.
    ///
    /// Unknown provider kind names in the configuration are rejected here,
    /// at the boundary: they are logged and skipped rather than carried
    /// along as strings.
    pub fn from_config() -> Self {
        let config = jbxconfig::get_config();

        let default_provider = match config.get_default_provider().parse() {
            Ok(kind) => kind,
            Err(error) => {
                warn!(error = %error, "Invalid default provider in config, using generic");
                ProviderKind::Generic
            }
        };

        let extract_kinds = config
            .get_extract_kinds()
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(kind) => Some(kind),
                Err(error) => {
                    warn!(error = %error, "Ignoring unknown extractor kind in config");
                    None
                }
            })
            .collect();

        Self {
            default_provider,
            search_timeout: Duration::from_secs(config.get_search_timeout_secs() as u64),
            extract_workers: config.get_extract_workers(),
            extract_call_timeout: Duration::from_secs(
                config.get_extract_call_timeout_secs() as u64
            ),
            cookie_source: config.get_cookie_source(),
            cookie_filename: config.get_cookie_filename(),
            cookie_fetch_timeout: Duration::from_secs(
                config.get_cookie_fetch_timeout_secs() as u64
            ),
            extract_domains: config.get_extract_domains(),
            extract_kinds,
            nodes: config.get_node_entries(),
        }
    }
}

/// Terminal outcome of a resolution request.
///
/// Every request ends in exactly one of these; there is no silent no-op
/// path.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The extraction pipeline started a direct stream
    Playing,
    /// Backend tracks were appended to the queue (and playback started if
    /// the session was idle)
    Queued { count: usize },
    /// No backend produced a result and extraction was not attempted
    NothingFound,
    /// Backend search required authentication and the extraction pipeline
    /// could not produce a stream either
    FallbackFailed,
}

/// The orchestrator: one per process, owning pool, dispatcher, fallback
/// pipeline and session registry.
pub struct PlaybackEngine {
    default_provider: ProviderKind,
    configured_nodes: Vec<NodeEntry>,
    pool: Arc<NodePool>,
    dispatcher: SearchDispatcher,
    fallback: FallbackPipeline,
    routing: ExtractRouting,
    transport: Arc<dyn StreamTransport>,
    events: EventBus,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<PlayerSession>>>>,
}

impl PlaybackEngine {
    pub fn new(
        options: EngineOptions,
        backend: Arc<dyn NodeBackend>,
        extractor: Arc<dyn Extractor>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        let events = EventBus::new();
        let pool = Arc::new(NodePool::new());
        let dispatcher = SearchDispatcher::new(pool.clone(), backend, events.clone())
            .with_timeout(options.search_timeout);
        let credentials = Arc::new(
            CredentialCache::new(options.cookie_source.clone(), options.cookie_filename.clone())
                .with_fetch_timeout(options.cookie_fetch_timeout),
        );
        let extraction_pool = Arc::new(
            ExtractionPool::new(extractor, options.extract_workers)
                .with_call_timeout(options.extract_call_timeout),
        );
        let fallback = FallbackPipeline::new(credentials, extraction_pool);
        let routing =
            ExtractRouting::new(options.extract_domains.clone(), options.extract_kinds.clone());

        Self {
            default_provider: options.default_provider,
            configured_nodes: options.nodes,
            pool,
            dispatcher,
            fallback,
            routing,
            transport,
            events,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Notification sink; the rendering layer subscribes here.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn node_pool(&self) -> &Arc<NodePool> {
        &self.pool
    }

    // ============ Node bootstrap ============

    /// Registers the nodes declared in the configuration.
    ///
    /// Mirrors the startup routine of the command surface: a node that
    /// cannot be registered is logged, never fatal.
    pub fn register_configured_nodes(&self) {
        for entry in &self.configured_nodes {
            let node = BackendNode::new(NodeId::new(entry.identifier.clone()), entry.address());
            if !self.pool.register(node) {
                warn!(node = %entry.identifier, "Node already present, skipping");
            }
        }
        if self.pool.is_empty() {
            warn!("No backend nodes registered; resolution relies on the extraction pipeline");
        }
    }

    /// Registers a single node (used by the external node-startup
    /// collaborator).
    pub fn register_node(&self, node: BackendNode) -> bool {
        self.pool.register(node)
    }

    // ============ Session lifecycle ============

    /// Creates the playback state for a newly-connected voice session.
    ///
    /// Reconnecting an already-known session returns the existing state
    /// untouched.
    pub async fn connect_session(
        &self,
        id: SessionId,
        channel: ChannelId,
    ) -> Arc<Mutex<PlayerSession>> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id)
            .or_insert_with(|| {
                info!(session = %id, channel = %channel, "Session connected");
                Arc::new(Mutex::new(PlayerSession::new(
                    id,
                    channel,
                    self.default_provider,
                )))
            })
            .clone()
    }

    /// Destroys a session's transient state and stops its stream.
    pub async fn disconnect_session(&self, id: SessionId) -> Result<()> {
        let removed = self.sessions.write().await.remove(&id);
        let Some(session) = removed else {
            return Err(EngineError::UnknownSession(id));
        };
        session.lock().await.clear();
        if let Err(error) = self.transport.stop(id).await {
            warn!(session = %id, error = %error, "Failed to stop stream on disconnect");
        }
        info!(session = %id, "Session disconnected");
        Ok(())
    }

    /// Looks up a connected session.
    pub async fn session(&self, id: SessionId) -> Result<Arc<Mutex<PlayerSession>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownSession(id))
    }

    // ============ Resolution ============

    /// Resolves a free-form playback request into queued tracks or a
    /// directly-started stream.
    ///
    /// Routing order:
    /// 1. requests the classifier marks extract-first go to the extraction
    ///    pipeline, falling back to backend search when it fails;
    /// 2. everything else goes to the backend search dispatcher;
    /// 3. an auth-required refusal from the backends hands the request to
    ///    the extraction pipeline.
    pub async fn resolve_and_enqueue(
        &self,
        session_id: SessionId,
        actor: ChannelId,
        raw_query: &str,
        kind: Option<ProviderKind>,
    ) -> Result<ResolveOutcome> {
        let request = SearchRequest::new(raw_query, kind, session_id);
        if request.is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        session.authorize(actor)?;

        let default_kind = session.default_provider();
        let effective_kind = request.kind().unwrap_or(default_kind);

        if self.routing.requires_extraction(request.query(), effective_kind) {
            debug!(session = %session_id, "Extract-first routing");
            if self
                .fallback
                .resolve_and_play(&mut session, self.transport.as_ref(), request.query())
                .await
            {
                self.broadcast_started(&session);
                return Ok(ResolveOutcome::Playing);
            }
            debug!(session = %session_id, "Extraction failed, trying backend search");
        }

        match self.dispatcher.search(&request, default_kind).await {
            SearchOutcome::Tracks(tracks) => {
                let count = session.enqueue_all(actor, tracks)?;
                if !session.is_playing() {
                    let next = session.advance();
                    self.drive_stream(session_id, next.as_ref()).await?;
                }
                Ok(ResolveOutcome::Queued { count })
            }
            SearchOutcome::AuthRequired => {
                info!(session = %session_id, "Backends require authentication, using extraction");
                if self
                    .fallback
                    .resolve_and_play(&mut session, self.transport.as_ref(), request.query())
                    .await
                {
                    self.broadcast_started(&session);
                    Ok(ResolveOutcome::Playing)
                } else {
                    Ok(ResolveOutcome::FallbackFailed)
                }
            }
            SearchOutcome::NotFound => Ok(ResolveOutcome::NothingFound),
        }
    }

    /// Forces a refresh of the extraction credentials.
    pub async fn refresh_credentials(&self, force: bool) -> RefreshOutcome {
        let outcome = self.fallback.credentials().refresh(force).await;
        if outcome == RefreshOutcome::Refreshed {
            self.events.broadcast(PlayerEvent::CredentialsRefreshed);
        }
        outcome
    }

    // ============ Playback commands ============

    /// Advances to the next track after the current one finished playing.
    ///
    /// Wired to the transport's track-end notification.
    pub async fn on_track_end(&self, session_id: SessionId) -> Result<()> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        let next = session.advance();
        self.drive_stream(session_id, next.as_ref()).await
    }

    /// Skips the current track, regardless of loop mode.
    pub async fn skip(&self, session_id: SessionId, actor: ChannelId) -> Result<Option<Track>> {
        let session = self.session(session_id).await?;
        let mut session = session.lock().await;
        session.authorize(actor)?;

        let skipped = session
            .current()
            .map(|t| t.title.clone())
            .ok_or(PlayerError::NoCurrentTrack)?;
        let next = session.skip(actor)?;

        self.events.broadcast(PlayerEvent::TrackSkipped {
            session: session_id,
            title: skipped,
        });
        self.drive_stream(session_id, next.as_ref()).await?;
        Ok(next)
    }

    /// Pauses the current track (state only; the transport keeps the stream
    /// and the rendering layer reacts to the paused flag).
    pub async fn pause(&self, session_id: SessionId, actor: ChannelId) -> Result<()> {
        let session = self.session(session_id).await?;
        session.lock().await.pause(actor)?;
        Ok(())
    }

    /// Resumes a paused track.
    pub async fn resume(&self, session_id: SessionId, actor: ChannelId) -> Result<()> {
        let session = self.session(session_id).await?;
        session.lock().await.resume(actor)?;
        Ok(())
    }

    /// Moves the playback position by `delta` seconds.
    pub async fn seek(
        &self,
        session_id: SessionId,
        actor: ChannelId,
        delta: i64,
    ) -> Result<Duration> {
        let session = self.session(session_id).await?;
        let position = session.lock().await.seek(actor, delta)?;
        Ok(position)
    }

    /// Sets the loop mode.
    pub async fn set_loop(
        &self,
        session_id: SessionId,
        actor: ChannelId,
        mode: LoopMode,
    ) -> Result<()> {
        let session = self.session(session_id).await?;
        session.lock().await.set_loop(actor, mode)?;
        Ok(())
    }

    /// Stops playback and clears the queue.
    pub async fn stop(&self, session_id: SessionId, actor: ChannelId) -> Result<()> {
        let session = self.session(session_id).await?;
        session.lock().await.stop(actor)?;
        if let Err(error) = self.transport.stop(session_id).await {
            warn!(session = %session_id, error = %error, "Failed to stop stream");
        }
        Ok(())
    }

    // ============ Internals ============

    /// Starts the given track's stream, or stops the transport when the
    /// queue is exhausted.
    async fn drive_stream(&self, session_id: SessionId, next: Option<&Track>) -> Result<()> {
        match next {
            Some(track) => {
                self.transport
                    .start_stream(session_id, &track.identifier)
                    .await
                    .map_err(|e| PlayerError::Transport(e.to_string()))?;
                self.events.broadcast(PlayerEvent::TrackStarted {
                    session: session_id,
                    title: track.title.clone(),
                });
                Ok(())
            }
            None => {
                if let Err(error) = self.transport.stop(session_id).await {
                    warn!(session = %session_id, error = %error, "Failed to stop stream");
                }
                self.events.broadcast(PlayerEvent::QueueExhausted {
                    session: session_id,
                });
                Ok(())
            }
        }
    }

    fn broadcast_started(&self, session: &PlayerSession) {
        if let Some(track) = session.current() {
            self.events.broadcast(PlayerEvent::TrackStarted {
                session: session.id(),
                title: track.title.clone(),
            });
        }
    }
}
