//! Backend node pool.
//!
//! The pool owns the set of nodes the dispatcher may query. Membership only
//! grows through [`NodePool::register`] (called by the startup routine) and
//! only shrinks through [`NodePool::evict`]; an evicted node stays out for
//! the rest of the process lifetime.

use jbxsource::NodeId;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// A single backend node.
///
/// Cloning shares the session counter: the load a node reports is visible
/// through every clone handed out by [`NodePool::list_ranked`].
#[derive(Debug, Clone)]
pub struct BackendNode {
    id: NodeId,
    address: String,
    sessions: Arc<AtomicUsize>,
}

impl BackendNode {
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of sessions currently playing through this node
    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::Relaxed)
    }

    /// Records a session starting to play through this node
    pub fn session_started(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session leaving this node
    pub fn session_ended(&self) {
        let _ = self
            .sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                n.checked_sub(1)
            });
    }
}

/// Dynamically-sized, ranked set of backend nodes.
///
/// An empty pool is a valid degraded state; callers get an empty ranking and
/// must handle it.
#[derive(Debug, Default)]
pub struct NodePool {
    nodes: Mutex<Vec<BackendNode>>,
}

impl NodePool {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
        }
    }

    /// Adds a node to the pool.
    ///
    /// Returns `false` without replacing anything when a node with the same
    /// id is already registered.
    pub fn register(&self, node: BackendNode) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.iter().any(|n| n.id == node.id) {
            debug!(node = %node.id, "Node already registered, ignoring");
            return false;
        }
        info!(node = %node.id, address = %node.address, "Registered backend node");
        nodes.push(node);
        true
    }

    /// Returns the nodes ordered by ascending active session count.
    ///
    /// The sort is stable, so nodes with equal load keep their discovery
    /// order. The ranking is computed fresh on every call.
    pub fn list_ranked(&self) -> Vec<BackendNode> {
        let nodes = self.nodes.lock().unwrap();
        let mut ranked = nodes.clone();
        ranked.sort_by_key(|n| n.active_sessions());
        ranked
    }

    /// Removes a node permanently for the process lifetime.
    ///
    /// Returns `true` if the node was present.
    pub fn evict(&self, id: &NodeId) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        let before = nodes.len();
        nodes.retain(|n| &n.id != id);
        let removed = nodes.len() < before;
        if removed {
            info!(node = %id, "Evicted backend node");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().unwrap().is_empty()
    }
}
