//! Best-effort change-event publisher.
//!
//! Publish is a side effect, not a guarantee: by the time it runs, the
//! mutation that produced the event has already committed, so no failure
//! here may roll back or fail the mutation. Every failure mode — transport
//! error, timeout, serialization — collapses into
//! [`PublishOutcome::Dropped`], logged and discarded. There is no retry
//! queue; each event gets exactly one attempt.

use std::sync::Arc;
use std::time::Duration;
use todo_coord_core::event::{EventEnvelope, TodoEvent};
use todo_coord_core::event_bus::EventBus;
use tracing::{debug, warn};

/// What happened to a single publish attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The envelope was handed to the bus.
    Published,
    /// The attempt failed and the event is gone; the mutation stands.
    Dropped {
        /// Why the event was dropped.
        reason: String,
    },
}

impl PublishOutcome {
    /// Whether the event was dropped.
    #[must_use]
    pub const fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

/// Publishes change events to a topic, swallowing every failure.
#[derive(Clone)]
pub struct ChangePublisher {
    bus: Arc<dyn EventBus>,
    topic: String,
    source: String,
    timeout: Duration,
}

impl ChangePublisher {
    /// Creates a publisher for `topic`, stamping `source` on envelopes.
    #[must_use]
    pub fn new(
        bus: Arc<dyn EventBus>,
        topic: impl Into<String>,
        source: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            topic: topic.into(),
            source: source.into(),
            timeout,
        }
    }

    /// Attempts to publish `event` once; never raises to the caller.
    pub async fn publish(&self, event: &TodoEvent) -> PublishOutcome {
        let envelope = match EventEnvelope::wrap(self.source.clone(), event) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(kind = %event.kind, error = %error, "Dropping unserializable change event");
                return PublishOutcome::Dropped {
                    reason: error.to_string(),
                };
            }
        };

        match tokio::time::timeout(self.timeout, self.bus.publish(&self.topic, &envelope)).await {
            Ok(Ok(())) => {
                debug!(kind = %event.kind, todo_id = %event.todo_id, topic = %self.topic,
                       "Published change event");
                PublishOutcome::Published
            }
            Ok(Err(error)) => {
                warn!(kind = %event.kind, todo_id = %event.todo_id, error = %error,
                      "Dropping change event after publish failure");
                PublishOutcome::Dropped {
                    reason: error.to_string(),
                }
            }
            Err(_) => {
                warn!(kind = %event.kind, todo_id = %event.todo_id, timeout = ?self.timeout,
                      "Dropping change event after publish timeout");
                PublishOutcome::Dropped {
                    reason: format!("publish timed out after {:?}", self.timeout),
                }
            }
        }
    }
}

impl std::fmt::Debug for ChangePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePublisher")
            .field("topic", &self.topic)
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
