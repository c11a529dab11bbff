//! The todo entity and its identifier.
//!
//! A [`Todo`] is the single record kind managed by the coordination core.
//! Identifiers are assigned once at creation and never reassigned; the
//! repository owns the persisted copy, and any copies held by callers are
//! transient snapshots, not authoritative state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a todo item.
///
/// Opaque and globally unique; rendered as the UUID string when used in
/// storage keys and event payloads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TodoId(Uuid);

impl TodoId {
    /// Creates a new random `TodoId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `TodoId` from a UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parses a `TodoId` from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`uuid::Error`] if `s` is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single todo item.
///
/// `created_at` is set once and never changes; `updated_at` is refreshed on
/// every mutation and equals `created_at` on a freshly created todo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier, assigned at creation.
    pub id: TodoId,
    /// Display name of the todo (non-empty, bounded length).
    pub name: String,
    /// Whether the todo is completed.
    pub completed: bool,
    /// When the todo was created.
    pub created_at: DateTime<Utc>,
    /// When the todo was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Creates a new todo with a fresh identifier and equal timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TodoId::new(),
            name: name.into(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes the last-modified timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Toggles the completion flag and refreshes the timestamp.
    pub fn toggle_completed(&mut self, now: DateTime<Utc>) {
        self.completed = !self.completed;
        self.touch(now);
    }
}
