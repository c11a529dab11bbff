//! Event bus port: publish/subscribe transport for change events.
//!
//! Events flow from the coordination service through the bus to downstream
//! consumers with **at-least-once** delivery: a delivery may be repeated, so
//! subscribers must tolerate duplicates. Publishing is decoupled from the
//! mutation that produced the event — by the time `publish` is called the
//! mutation has already committed, and a publish failure never unwinds it.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (in `todo-coord-testing`): broadcast-channel fan-out
//!   with failure injection and a redelivery helper.
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn EventBus>`), which the
//! publisher and consumer rely on to share one bus handle.

use crate::event::EventEnvelope;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// Network or transport error.
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of envelopes from subscriptions.
///
/// Each item is a `Result`: transport errors surface in-stream so a consumer
/// can log and keep reading instead of tearing down the subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope, EventBusError>> + Send>>;

/// Publish/subscribe transport port.
///
/// # Delivery Semantics
///
/// - **At-least-once**: a published envelope may reach a subscriber more
///   than once; consumers must be idempotent or tolerate duplicates.
/// - **No ordering across topics**; ordering within a topic follows the
///   backend's guarantees.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to support concurrent access
/// from the publisher and any number of consumers.
pub trait EventBus: Send + Sync {
    /// Publishes an envelope to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] (or a transport error) if
    /// the envelope could not be handed to the backend. Callers that want
    /// best-effort semantics are expected to absorb this error themselves.
    fn publish(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribes to one or more topics and returns a stream of deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the subscription
    /// could not be established.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
