//! In-memory event bus with failure injection and a redelivery helper.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use futures::stream;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use todo_coord_core::event::EventEnvelope;
use todo_coord_core::event_bus::{EventBus, EventBusError, EventStream};
use tokio::sync::broadcast;

/// Buffered deliveries per subscriber before the stream reports lag.
const CHANNEL_CAPACITY: usize = 64;

/// In-memory [`EventBus`] for fast, deterministic testing.
///
/// Fan-out uses one broadcast channel per topic: every subscriber sees
/// every envelope published after it subscribed. Publishing into a topic
/// with no subscribers succeeds and the envelope is simply gone, matching
/// a fire-and-forget broker.
///
/// Two test hooks model the failure modes the coordination core must
/// absorb:
///
/// - [`fail_publishes`](Self::fail_publishes) makes every publish fail, for
///   "publish never blocks commit" tests.
/// - [`redeliver`](Self::redeliver) pushes a duplicate of an
///   already-delivered envelope, for at-least-once consumer tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventBus {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>>,
    failing: Arc<AtomicBool>,
    published: Arc<RwLock<Vec<(String, EventEnvelope)>>>,
}

impl InMemoryEventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail with
    /// [`EventBusError::PublishFailed`].
    pub fn fail_publishes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Clears publish failure injection.
    pub fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Number of successfully published envelopes.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.published.read().unwrap().len()
    }

    /// Ledger of successfully published `(topic, envelope)` pairs.
    #[must_use]
    pub fn published(&self) -> Vec<(String, EventEnvelope)> {
        self.published.read().unwrap().clone()
    }

    /// Delivers `envelope` to current subscribers of `topic` again,
    /// simulating an at-least-once transport redelivering.
    pub fn redeliver(&self, topic: &str, envelope: &EventEnvelope) {
        let _ = self.sender_for(topic).send(envelope.clone());
    }

    /// Number of live subscribers on `topic`. Lets tests wait until a
    /// background consumer has actually subscribed before publishing.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .unwrap()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<EventEnvelope> {
        let mut topics = self.topics.write().unwrap();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let envelope = envelope.clone();
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "injected publish failure".to_string(),
                });
            }

            self.published
                .write()
                .unwrap()
                .push((topic.clone(), envelope.clone()));

            // No subscribers is not an error; the envelope is just gone.
            let _ = self.sender_for(&topic).send(envelope);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> std::pin::Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>
    {
        let topics: Vec<String> = topics.iter().map(ToString::to_string).collect();
        Box::pin(async move {
            let streams: Vec<EventStream> = topics
                .iter()
                .map(|topic| receiver_stream(self.sender_for(topic).subscribe()))
                .collect();
            Ok(Box::pin(stream::select_all(streams)) as EventStream)
        })
    }
}

/// Adapts one broadcast receiver into an envelope stream. Lag surfaces as
/// an in-stream transport error so consumers log it and keep reading.
fn receiver_stream(mut rx: broadcast::Receiver<EventEnvelope>) -> EventStream {
    Box::pin(async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(envelope) => yield Ok(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    yield Err(EventBusError::TransportError(format!(
                        "subscriber lagged, {skipped} deliveries skipped"
                    )));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
