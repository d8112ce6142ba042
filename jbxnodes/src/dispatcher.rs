//! Provider search dispatcher.
//!
//! Walks the ranked node list one node at a time with a bounded per-node
//! wait. Timeouts evict the node and move on; transient provider errors move
//! on without eviction; an auth-classified refusal ends the walk immediately
//! so the caller can switch to the extraction pipeline.

use crate::backend::NodeBackend;
use crate::pool::NodePool;
use jbxsource::{EventBus, PlayerEvent, ProviderKind, SessionId, Track};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Bounded wait applied to each node search
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(20);

/// A resolution request, immutable once built.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    kind: Option<ProviderKind>,
    session: SessionId,
}

impl SearchRequest {
    /// Builds a request from raw user input.
    ///
    /// Surrounding angle brackets (the no-embed convention of chat clients)
    /// and whitespace are stripped from the query.
    pub fn new(raw_query: &str, kind: Option<ProviderKind>, session: SessionId) -> Self {
        let query = raw_query
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim()
            .to_string();
        Self {
            query,
            kind,
            session,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn kind(&self) -> Option<ProviderKind> {
        self.kind
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

/// Terminal outcome of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A node answered: one track, or a playlist's full ordered contents
    Tracks(Vec<Track>),
    /// A backend refused categorically; the extraction pipeline should take over
    AuthRequired,
    /// Every node was tried and none produced a result
    NotFound,
}

/// Dispatches provider searches across the ranked node pool.
pub struct SearchDispatcher {
    pool: Arc<NodePool>,
    backend: Arc<dyn NodeBackend>,
    events: EventBus,
    search_timeout: Duration,
}

impl SearchDispatcher {
    pub fn new(pool: Arc<NodePool>, backend: Arc<dyn NodeBackend>, events: EventBus) -> Self {
        Self {
            pool,
            backend,
            events,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    /// Overrides the per-node bounded wait
    pub fn with_timeout(mut self, search_timeout: Duration) -> Self {
        self.search_timeout = search_timeout;
        self
    }

    /// Resolves the provider kind a request will search with.
    ///
    /// Explicit request kind wins, then the session default. A generic
    /// search whose query mentions a playlist is reclassified as a playlist
    /// load, mirroring what users mean when they paste a playlist URL
    /// without picking the playlist provider.
    pub fn resolve_kind(&self, request: &SearchRequest, session_default: ProviderKind) -> ProviderKind {
        let kind = request.kind().unwrap_or(session_default);
        if kind == ProviderKind::Generic && request.query().contains("playlist") {
            return ProviderKind::Playlist;
        }
        kind
    }

    /// Runs the search across the ranked nodes.
    ///
    /// At most one node is queried successfully per call; the ranking is
    /// taken fresh from the pool when the call starts.
    pub async fn search(
        &self,
        request: &SearchRequest,
        session_default: ProviderKind,
    ) -> SearchOutcome {
        let kind = self.resolve_kind(request, session_default);
        let nodes = self.pool.list_ranked();
        debug!(
            session = %request.session(),
            kind = %kind,
            nodes = nodes.len(),
            "Dispatching search"
        );

        for node in &nodes {
            let attempt = self.backend.search(kind, request.query(), node);
            match timeout(self.search_timeout, attempt).await {
                Err(_) => {
                    warn!(node = %node.id(), "Search timed out, evicting node");
                    self.pool.evict(node.id());
                    self.events.broadcast(PlayerEvent::NodeFailed {
                        node: node.id().clone(),
                    });
                    continue;
                }
                Ok(Err(err)) if err.is_auth_error() => {
                    info!(node = %node.id(), error = %err, "Backend requires authentication");
                    return SearchOutcome::AuthRequired;
                }
                Ok(Err(err)) => {
                    debug!(node = %node.id(), error = %err, "Transient search error, trying next node");
                    continue;
                }
                Ok(Ok(load)) => {
                    if load.is_empty() {
                        debug!(node = %node.id(), "Empty result, trying next node");
                        continue;
                    }
                    info!(node = %node.id(), tracks = load.len(), "Search succeeded");
                    return SearchOutcome::Tracks(load.into_tracks());
                }
            }
        }

        SearchOutcome::NotFound
    }
}
