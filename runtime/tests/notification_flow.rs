//! End-to-end tests for the consume path: bus → consumer → notification log.

#![allow(clippy::expect_used, clippy::panic)] // Panics: tests fail loudly

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use todo_coord_core::event::{ChangeKind, EventEnvelope, TODO_EVENTS_TOPIC, TodoEvent};
use todo_coord_core::event_bus::EventBus;
use todo_coord_core::todo::Todo;
use todo_coord_runtime::{
    DeliveryStatus, NotificationConsumer, NotificationHandler, NotificationLog,
};
use todo_coord_testing::{FixedClock, InMemoryEventBus};
use tokio::sync::broadcast;

struct Running {
    bus: Arc<InMemoryEventBus>,
    log: NotificationLog,
    shutdown: broadcast::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawns a consumer and waits until its subscription is live.
async fn start_consumer() -> Running {
    let bus = Arc::new(InMemoryEventBus::new());
    let log = NotificationLog::new();
    let handler = Arc::new(NotificationHandler::new(
        Arc::new(log.clone()),
        Arc::new(FixedClock::default()),
    ));
    let (shutdown, shutdown_rx) = broadcast::channel(1);

    let consumer = NotificationConsumer::new(
        "notifications",
        vec![TODO_EVENTS_TOPIC.to_string()],
        Arc::clone(&bus) as Arc<dyn EventBus>,
        handler,
        shutdown_rx,
    )
    .with_retry_delay(Duration::from_millis(50));
    let handle = consumer.spawn();

    wait_until(|| bus.subscriber_count(TODO_EVENTS_TOPIC) > 0).await;

    Running {
        bus,
        log,
        shutdown,
        handle,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2 seconds");
}

fn change_event(kind: ChangeKind, name: &str) -> EventEnvelope {
    let todo = Todo::new(name, Utc::now());
    let event = TodoEvent::new(kind, &todo, Utc::now(), "demo-user", "validation-service");
    EventEnvelope::wrap("todo-service", &event).expect("wrap should succeed")
}

#[tokio::test]
async fn delivered_event_lands_in_the_log() {
    let running = start_consumer().await;

    let envelope = change_event(ChangeKind::Created, "Buy milk");
    running
        .bus
        .publish(TODO_EVENTS_TOPIC, &envelope)
        .await
        .expect("publish should succeed");

    let log = running.log.clone();
    wait_until(move || log.len() == 1).await;

    let records = running.log.records();
    assert_eq!(records[0].status, DeliveryStatus::Processed);
    assert_eq!(records[0].event_type, "created");

    running.shutdown.send(()).expect("consumer should be listening");
    running.handle.await.expect("consumer should stop cleanly");
}

#[tokio::test]
async fn redelivery_produces_a_second_record() {
    let running = start_consumer().await;

    let envelope = change_event(ChangeKind::Updated, "Water plants");
    running
        .bus
        .publish(TODO_EVENTS_TOPIC, &envelope)
        .await
        .expect("publish should succeed");
    // The transport redelivers the exact same envelope; no dedup happens.
    running.bus.redeliver(TODO_EVENTS_TOPIC, &envelope);

    let log = running.log.clone();
    wait_until(move || log.len() == 2).await;

    let records = running.log.records();
    assert_eq!(records[0].todo_id, records[1].todo_id);
    assert!(records.iter().all(|r| r.status == DeliveryStatus::Processed));

    running.shutdown.send(()).expect("consumer should be listening");
    running.handle.await.expect("consumer should stop cleanly");
}

#[tokio::test]
async fn malformed_delivery_is_failed_terminally_and_consumer_keeps_going() {
    let running = start_consumer().await;

    let malformed = EventEnvelope {
        id: "d-bad".to_string(),
        source: "todo-service".to_string(),
        event_type: "created".to_string(),
        data: Some(serde_json::json!({ "eventType": "created" })),
    };
    running
        .bus
        .publish(TODO_EVENTS_TOPIC, &malformed)
        .await
        .expect("publish should succeed");

    let log = running.log.clone();
    wait_until(move || log.len() == 1).await;
    assert_eq!(running.log.records()[0].status, DeliveryStatus::Failed);

    // A well-formed delivery after the bad one still processes.
    let envelope = change_event(ChangeKind::Deleted, "Take out bins");
    running
        .bus
        .publish(TODO_EVENTS_TOPIC, &envelope)
        .await
        .expect("publish should succeed");

    let log = running.log.clone();
    wait_until(move || log.len() == 2).await;
    assert_eq!(running.log.records()[1].status, DeliveryStatus::Processed);

    running.shutdown.send(()).expect("consumer should be listening");
    running.handle.await.expect("consumer should stop cleanly");
}
