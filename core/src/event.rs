//! Change events and the envelope they travel in.
//!
//! Every successful mutation produces exactly one [`TodoEvent`]; the bus may
//! deliver it zero, one, or more times (at-least-once), so consumers must
//! tolerate duplicates. Events cross the wire wrapped in an
//! [`EventEnvelope`] carrying transport metadata alongside the payload.
//!
//! # Wire Format
//!
//! Payloads serialize to JSON with the field names the downstream consumer
//! expects (`eventType`, `todoId`, `todoName`, `timestamp`, `userId`,
//! `validatedBy`). Timestamps use ISO-8601 at second precision.

use crate::todo::Todo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic that todo change events are published to.
pub const TODO_EVENTS_TOPIC: &str = "todo-events";

/// The kind of mutation a change event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A todo was created.
    Created,
    /// A todo was updated.
    Updated,
    /// A todo was deleted.
    Deleted,
}

impl ChangeKind {
    /// Stable string form used in envelopes and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change event produced once per successful mutation.
///
/// Carries a snapshot of the entity name at mutation time; the entity itself
/// may have changed again by the time the event is consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoEvent {
    /// Which mutation happened.
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    /// Identifier of the mutated todo, in string form.
    #[serde(rename = "todoId")]
    pub todo_id: String,
    /// Name of the todo at mutation time.
    #[serde(rename = "todoName")]
    pub todo_name: String,
    /// When the mutation happened (second precision on the wire).
    #[serde(with = "second_precision")]
    pub timestamp: DateTime<Utc>,
    /// The actor the mutation is attributed to.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Identity of the validator that admitted the mutation.
    #[serde(rename = "validatedBy")]
    pub validated_by: String,
}

impl TodoEvent {
    /// Builds an event from a snapshot of the mutated todo.
    #[must_use]
    pub fn new(
        kind: ChangeKind,
        todo: &Todo,
        timestamp: DateTime<Utc>,
        user_id: impl Into<String>,
        validated_by: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            todo_id: todo.id.to_string(),
            todo_name: todo.name.clone(),
            timestamp,
            user_id: user_id.into(),
            validated_by: validated_by.into(),
        }
    }
}

/// ISO-8601 second-precision timestamp (de)serialization.
///
/// The wire format is `2025-01-01T00:00:00` — no fractional seconds, no
/// offset suffix; values are always UTC.
pub mod second_precision {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Serializes `timestamp` truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        timestamp: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&timestamp.format(FORMAT))
    }

    /// Deserializes a second-precision timestamp, assuming UTC.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string does not match the
    /// `%Y-%m-%dT%H:%M:%S` format.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(Error::custom)
    }
}

/// Transport envelope wrapping a change event.
///
/// Mirrors the metadata the bus attaches to each delivery: a delivery
/// identifier, the producing source, and the event type, plus the payload as
/// raw JSON. The payload is kept untyped here so the consumer can give a
/// distinguishable bad-input outcome for malformed data instead of failing
/// at the transport layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Delivery identifier assigned by the producer.
    pub id: String,
    /// Logical source of the event (the producing service).
    pub source: String,
    /// Event type tag, e.g. `created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The change-event payload; `None` when the delivery is empty.
    pub data: Option<serde_json::Value>,
}

impl EventEnvelope {
    /// Wraps a change event for publication.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the event cannot be serialized,
    /// which cannot happen for well-formed [`TodoEvent`] values.
    pub fn wrap(source: impl Into<String>, event: &TodoEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            event_type: event.kind.as_str().to_string(),
            data: Some(serde_json::to_value(event)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[allow(clippy::expect_used)]
    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 45)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if serialization fails
    fn event_wire_field_names() {
        let todo = Todo::new("Buy milk", fixed_time());
        let event = TodoEvent::new(
            ChangeKind::Created,
            &todo,
            fixed_time(),
            "demo-user",
            "validation-service",
        );

        let json = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(json["eventType"], "created");
        assert_eq!(json["todoName"], "Buy milk");
        assert_eq!(json["timestamp"], "2025-01-01T12:30:45");
        assert_eq!(json["userId"], "demo-user");
        assert_eq!(json["validatedBy"], "validation-service");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if serialization fails
    fn second_precision_roundtrip_truncates() {
        let with_nanos = fixed_time() + chrono::Duration::nanoseconds(987_654_321);
        let todo = Todo::new("Water plants", with_nanos);
        let event = TodoEvent::new(
            ChangeKind::Updated,
            &todo,
            with_nanos,
            "demo-user",
            "validation-service",
        );

        let json = serde_json::to_string(&event).expect("event should serialize");
        let back: TodoEvent = serde_json::from_str(&json).expect("event should deserialize");

        assert_eq!(back.timestamp, fixed_time());
        assert_eq!(back.kind, ChangeKind::Updated);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if wrapping fails
    fn envelope_carries_payload_and_type() {
        let todo = Todo::new("Buy milk", fixed_time());
        let event = TodoEvent::new(
            ChangeKind::Deleted,
            &todo,
            fixed_time(),
            "demo-user",
            "validation-service",
        );

        let envelope = EventEnvelope::wrap("todo-service", &event).expect("wrap should succeed");
        assert_eq!(envelope.source, "todo-service");
        assert_eq!(envelope.event_type, "deleted");
        assert!(!envelope.id.is_empty());

        let payload: TodoEvent =
            serde_json::from_value(envelope.data.expect("envelope should carry a payload"))
                .expect("payload should decode");
        assert_eq!(payload, event);
    }
}
