//! Configuration for the coordination core.
//!
//! Loads from environment variables with sensible defaults; the resulting
//! value is read-only for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Coordination configuration: storage keys, topic, identities, timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Prefix for primary record keys (`<prefix><uuid>`).
    pub key_prefix: String,
    /// Well-known key the identifier index is stored under.
    pub index_key: String,
    /// Topic change events are published to.
    pub topic: String,
    /// Logical source name stamped on outgoing envelopes.
    pub source: String,
    /// Actor mutations are attributed to.
    pub actor: String,
    /// Identity of the validator recorded on change events.
    pub validator_id: String,
    /// Bound on a single validation call, in milliseconds.
    pub validation_timeout_ms: u64,
    /// Bound on a single state store call, in milliseconds.
    pub store_timeout_ms: u64,
    /// Bound on a single publish attempt, in milliseconds.
    pub publish_timeout_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            key_prefix: "todo-".to_string(),
            index_key: "todo-index".to_string(),
            topic: todo_coord_core::event::TODO_EVENTS_TOPIC.to_string(),
            source: "todo-service".to_string(),
            actor: "demo-user".to_string(),
            validator_id: "validation-service".to_string(),
            validation_timeout_ms: 2_000,
            store_timeout_ms: 5_000,
            publish_timeout_ms: 5_000,
        }
    }
}

impl CoordinationConfig {
    /// Loads configuration from `TODO_COORD_*` environment variables,
    /// falling back to the defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            key_prefix: env_string("TODO_COORD_KEY_PREFIX", defaults.key_prefix),
            index_key: env_string("TODO_COORD_INDEX_KEY", defaults.index_key),
            topic: env_string("TODO_COORD_TOPIC", defaults.topic),
            source: env_string("TODO_COORD_SOURCE", defaults.source),
            actor: env_string("TODO_COORD_ACTOR", defaults.actor),
            validator_id: env_string("TODO_COORD_VALIDATOR_ID", defaults.validator_id),
            validation_timeout_ms: env_u64(
                "TODO_COORD_VALIDATION_TIMEOUT_MS",
                defaults.validation_timeout_ms,
            ),
            store_timeout_ms: env_u64("TODO_COORD_STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            publish_timeout_ms: env_u64(
                "TODO_COORD_PUBLISH_TIMEOUT_MS",
                defaults.publish_timeout_ms,
            ),
        }
    }

    /// Bound on a single validation call.
    #[must_use]
    pub const fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    /// Bound on a single state store call.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Bound on a single publish attempt.
    #[must_use]
    pub const fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
