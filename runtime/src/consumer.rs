//! Notification consumer: at-least-once sink for change events.
//!
//! The bus redelivers: a consumer must never assume exactly-once. The
//! handler classifies every delivery into one of three outcomes with
//! distinct signals for the transport:
//!
//! - [`HandleOutcome::Processed`] — acknowledge.
//! - [`HandleOutcome::BadInput`] — acknowledge as terminally failed;
//!   redelivery cannot fix malformed data, so retrying is pointless.
//! - [`HandleOutcome::Retry`] — a transient downstream failure; ask the
//!   transport to redeliver.
//!
//! The consumer's side effect is observational: it appends a
//! [`NotificationRecord`] per finished delivery, redeliveries included.
//! It deliberately carries no idempotency keys and does not deduplicate —
//! duplicate deliveries produce duplicate records, preserving the
//! at-least-once, non-deduplicated contract of the upstream design.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use todo_coord_core::environment::Clock;
use todo_coord_core::event::{EventEnvelope, TodoEvent};
use todo_coord_core::event_bus::{EventBus, EventStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of handling one delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The event was processed; acknowledge the delivery.
    Processed,
    /// The payload was empty or malformed; acknowledge, never redeliver.
    BadInput {
        /// What was wrong with the payload.
        error: String,
    },
    /// A transient downstream failure; the delivery should be retried.
    Retry {
        /// What failed downstream.
        error: String,
    },
}

/// Delivery outcome recorded for one finished handling attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The event was handled successfully.
    Processed,
    /// The event was terminally failed (bad input).
    Failed,
}

/// Record of one finished delivery, redeliveries included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Identifier of this record.
    pub id: String,
    /// Identifier of the todo the event concerned, when decodable.
    pub todo_id: String,
    /// Event kind as delivered, e.g. `created`.
    pub event_type: String,
    /// How the delivery ended.
    pub status: DeliveryStatus,
    /// When handling finished.
    pub processed_at: DateTime<Utc>,
    /// Error text for failed deliveries.
    pub error: Option<String>,
}

/// Errors a notification sink can raise.
#[derive(Error, Debug, Clone)]
pub enum SinkError {
    /// The sink could not accept the record right now.
    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Downstream destination for notification records.
///
/// Dyn-compatible (`Pin<Box<dyn Future>>` returns) so the handler can hold
/// `Arc<dyn NotificationSink>`.
pub trait NotificationSink: Send + Sync {
    /// Accepts one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] on a transient downstream failure; the caller
    /// maps it to a retry outcome.
    fn record(
        &self,
        record: NotificationRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>>;
}

/// In-memory notification sink with a query surface for tests and
/// diagnostics.
#[derive(Clone, Debug, Default)]
pub struct NotificationLog {
    records: Arc<RwLock<Vec<NotificationRecord>>>,
}

impl NotificationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or_default()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for NotificationLog {
    fn record(
        &self,
        record: NotificationRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + '_>> {
        Box::pin(async move {
            self.records
                .write()
                .map_err(|_| SinkError::Unavailable("notification log poisoned".to_string()))?
                .push(record);
            Ok(())
        })
    }
}

/// Classifies deliveries and records their outcomes.
pub struct NotificationHandler {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl NotificationHandler {
    /// Creates a handler writing records through `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    /// Handles one delivery, which may be a redelivery.
    ///
    /// Malformed payloads always yield [`HandleOutcome::BadInput`], no
    /// matter how often they are redelivered.
    pub async fn handle(&self, envelope: &EventEnvelope) -> HandleOutcome {
        let Some(data) = &envelope.data else {
            warn!(delivery = %envelope.id, "Received event with empty payload");
            return self.reject(envelope, "empty payload").await;
        };

        let event: TodoEvent = match serde_json::from_value(data.clone()) {
            Ok(event) => event,
            Err(parse_error) => {
                warn!(delivery = %envelope.id, error = %parse_error,
                      "Received malformed event payload");
                return self.reject(envelope, &parse_error.to_string()).await;
            }
        };

        info!(todo = %event.todo_name, id = %event.todo_id, kind = %event.kind,
              actor = %event.user_id, "Notification: todo changed");

        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            todo_id: event.todo_id.clone(),
            event_type: event.kind.as_str().to_string(),
            status: DeliveryStatus::Processed,
            processed_at: self.clock.now(),
            error: None,
        };
        match self.sink.record(record).await {
            Ok(()) => HandleOutcome::Processed,
            Err(sink_error) => {
                warn!(id = %event.todo_id, error = %sink_error,
                      "Downstream sink failed, requesting redelivery");
                HandleOutcome::Retry {
                    error: sink_error.to_string(),
                }
            }
        }
    }

    /// Bad input is terminal: record the failure best-effort and
    /// acknowledge. A sink failure here does not upgrade the outcome to a
    /// retry — redelivery cannot fix the payload.
    async fn reject(&self, envelope: &EventEnvelope, reason: &str) -> HandleOutcome {
        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            todo_id: String::new(),
            event_type: envelope.event_type.clone(),
            status: DeliveryStatus::Failed,
            processed_at: self.clock.now(),
            error: Some(reason.to_string()),
        };
        if let Err(sink_error) = self.sink.record(record).await {
            warn!(error = %sink_error, "Could not record failed delivery");
        }
        HandleOutcome::BadInput {
            error: reason.to_string(),
        }
    }
}

impl std::fmt::Debug for NotificationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandler").finish_non_exhaustive()
    }
}

/// Subscribe-process-reconnect loop feeding a [`NotificationHandler`].
///
/// Subscribes to the bus, hands every delivery to the handler, logs
/// outcomes, reconnects with a delay when the stream drops, and exits on
/// the shutdown signal. Retry outcomes are logged and left to the
/// transport's redelivery; this loop never re-queues locally.
pub struct NotificationConsumer {
    name: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<NotificationHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl NotificationConsumer {
    /// Creates a consumer with the default 5 second reconnect delay.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<NotificationHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Overrides the reconnect delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Spawns the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, "Notification consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Notification consumer received shutdown signal");
                    break;
                }
                subscribed = self.event_bus.subscribe(&topics) => {
                    match subscribed {
                        Ok(stream) => {
                            info!(consumer = %self.name, topics = ?self.topics, "Subscribed to event bus");
                            if let StreamExit::Shutdown = self.process_stream(stream).await {
                                break;
                            }
                            warn!(consumer = %self.name,
                                  "Event stream ended, reconnecting in {:?}", self.retry_delay);
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        Err(subscribe_error) => {
                            error!(consumer = %self.name, error = %subscribe_error,
                                   "Failed to subscribe, retrying in {:?}", self.retry_delay);
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }

        info!(consumer = %self.name, "Notification consumer stopped");
    }

    /// Processes deliveries until the stream ends or shutdown is signaled.
    async fn process_stream(&mut self, mut stream: EventStream) -> StreamExit {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name,
                          "Notification consumer received shutdown signal during processing");
                    return StreamExit::Shutdown;
                }
                delivery = stream.next() => {
                    match delivery {
                        Some(Ok(envelope)) => {
                            match self.handler.handle(&envelope).await {
                                HandleOutcome::Processed => {}
                                HandleOutcome::BadInput { error: input_error } => {
                                    warn!(consumer = %self.name, error = %input_error,
                                          "Acknowledged malformed delivery, will not retry");
                                }
                                HandleOutcome::Retry { error: retry_error } => {
                                    warn!(consumer = %self.name, error = %retry_error,
                                          "Delivery failed transiently, expecting redelivery");
                                }
                            }
                        }
                        Some(Err(stream_error)) => {
                            error!(consumer = %self.name, error = %stream_error,
                                   "Error receiving delivery, continuing");
                        }
                        None => {
                            warn!(consumer = %self.name, "Event stream ended");
                            return StreamExit::Ended;
                        }
                    }
                }
            }
        }
    }
}

/// Why a processing pass over one subscription stream ended.
enum StreamExit {
    /// The shutdown signal arrived; the consumer must stop.
    Shutdown,
    /// The stream dried up; the consumer should resubscribe.
    Ended,
}

impl std::fmt::Debug for NotificationConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConsumer")
            .field("name", &self.name)
            .field("topics", &self.topics)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
