//! Search error taxonomy.
//!
//! The dispatcher needs to tell three situations apart: a node that stopped
//! answering (evict, try the next one), a node that failed this particular
//! request (try the next one), and a backend that refuses the request
//! categorically because it needs credentials (stop, switch to the
//! extraction pipeline).

use thiserror::Error;

/// Result type for node search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors raised while searching backend nodes
#[derive(Error, Debug)]
pub enum SearchError {
    /// The node did not answer within the bounded wait
    #[error("Backend node timed out")]
    Timeout,

    /// The backend refuses the request without authentication (private or
    /// login-gated content). Terminal: other nodes will refuse too.
    #[error("Backend requires authentication: {0}")]
    Auth(String),

    /// A single backend failed on this request; other nodes may still serve it
    #[error("Provider error: {0}")]
    Provider(String),
}

impl SearchError {
    /// Classifies a backend failure message into [`SearchError::Auth`] or
    /// [`SearchError::Provider`].
    ///
    /// Backends phrase the refusal differently ("login required", "private
    /// video", "sign in to confirm"); any of the known markers makes the
    /// error terminal.
    pub fn from_backend_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        const AUTH_MARKERS: &[&str] = &["login", "sign in", "private", "authentication", "auth"];
        if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
            Self::Auth(message)
        } else {
            Self::Provider(message)
        }
    }

    /// True when the error is the terminal auth-required classification
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SearchError::Auth(_))
    }

    /// True when the node should be evicted from the pool
    pub fn is_timeout(&self) -> bool {
        matches!(self, SearchError::Timeout)
    }
}
