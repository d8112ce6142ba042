//! Player event bus.
//!
//! Fire-and-forget notifications emitted by the orchestration engine. The
//! rendering layer subscribes and decides how (or whether) to present them;
//! nothing in the engine waits on delivery.

use crate::{NodeId, SessionId};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Mutex};

/// Events emitted by the engine while resolving and playing
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A backend node timed out and was evicted from the pool
    NodeFailed { node: NodeId },
    /// A track started playing on a session
    TrackStarted { session: SessionId, title: String },
    /// The current track was skipped
    TrackSkipped { session: SessionId, title: String },
    /// The queue ran dry and the session went idle
    QueueExhausted { session: SessionId },
    /// Credential material was re-fetched for the extraction pipeline
    CredentialsRefreshed,
}

/// Subscriber bus for [`PlayerEvent`]s.
///
/// Broadcasting walks the subscriber list and drops senders whose receiver
/// side is gone, so abandoned subscriptions clean themselves up.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded::<PlayerEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.push(tx);
        }
        rx
    }

    pub fn broadcast(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_all_subscribers() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        bus.broadcast(PlayerEvent::NodeFailed {
            node: NodeId::new("main"),
        });

        for rx in [rx1, rx2] {
            let event = rx.try_recv().unwrap();
            assert_eq!(
                event,
                PlayerEvent::NodeFailed {
                    node: NodeId::new("main")
                }
            );
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(bus.subscribe());

        bus.broadcast(PlayerEvent::QueueExhausted {
            session: SessionId(1),
        });

        assert!(rx.try_recv().is_ok());
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}
