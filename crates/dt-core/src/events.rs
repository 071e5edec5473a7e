//! Engine event bus.
//!
//! A local broadcast channel carrying notifications about graph mutations,
//! check completions, detected breaks, and score recomputations. Reporting
//! collaborators subscribe here; the engine's own recomputation triggers are
//! orchestrated synchronously by the facade and do not depend on delivery.

use crate::models::{BreakKind, CheckResult, Severity};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notifications published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    EdgeCreated {
        tenant_id: Uuid,
        edge_id: Uuid,
    },
    EdgeDeactivated {
        tenant_id: Uuid,
        edge_id: Uuid,
    },
    CheckCompleted {
        tenant_id: Uuid,
        check_id: Uuid,
        result: CheckResult,
    },
    BreakDetected {
        tenant_id: Uuid,
        event_id: Uuid,
        kind: BreakKind,
        severity: Severity,
    },
    ScoreComputed {
        tenant_id: Uuid,
        asset_id: Uuid,
        overall_score: u8,
    },
}

/// Broadcast bus for engine events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Creates a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event. Delivery is best-effort; a bus with no
    /// subscribers drops events silently.
    pub fn publish(&self, event: EngineEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(?event, "no subscribers for engine event");
        }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let tenant_id = Uuid::new_v4();
        let edge_id = Uuid::new_v4();
        bus.publish(EngineEvent::EdgeCreated { tenant_id, edge_id });
        match rx.recv().await.unwrap() {
            EngineEvent::EdgeCreated { edge_id: got, .. } => assert_eq!(got, edge_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::ScoreComputed {
            tenant_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            overall_score: 50,
        });
    }
}
