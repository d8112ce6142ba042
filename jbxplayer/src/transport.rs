//! Stream transport seam.
//!
//! The component that actually decodes and pushes audio to the voice medium
//! lives outside this core. The orchestrator only ever asks it to start a
//! stream for a session or to stop one.

use async_trait::async_trait;
use jbxsource::SessionId;

/// Voice-transport collaborator.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Starts streaming `url` (or a backend track identifier) on the session.
    async fn start_stream(&self, session: SessionId, url: &str) -> anyhow::Result<()>;

    /// Stops whatever the session is currently streaming.
    async fn stop(&self, session: SessionId) -> anyhow::Result<()>;
}
