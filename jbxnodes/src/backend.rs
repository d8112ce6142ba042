//! Backend search seam.
//!
//! The actual wire protocol to an audio-search node lives outside this core;
//! the dispatcher only needs one call per node per request.

use crate::pool::BackendNode;
use crate::Result;
use async_trait::async_trait;
use jbxsource::{ProviderKind, TrackLoad};

/// One provider-kind search against one backend node.
///
/// Implementations must raise [`crate::SearchError::Auth`] for refusals that
/// no other node can serve either (login-gated or private content) and
/// [`crate::SearchError::Provider`] for everything else, so the dispatcher
/// can classify correctly. [`crate::SearchError::from_backend_message`] does
/// the classification for message-shaped failures.
#[async_trait]
pub trait NodeBackend: Send + Sync {
    async fn search(
        &self,
        kind: ProviderKind,
        query: &str,
        node: &BackendNode,
    ) -> Result<TrackLoad>;
}
