//! # Todo Coord Core
//!
//! Port traits and domain types for the todo coordination core.
//!
//! This crate defines the boundary between the coordination logic (in
//! `todo-coord-runtime`) and its three external collaborators, each modeled
//! as a trait so production adapters and in-memory test doubles are
//! interchangeable:
//!
//! - [`state_store::StateStore`] — key-value persistence (get/put/delete)
//! - [`validator::RemoteValidator`] — remote "is this name acceptable" call
//! - [`event_bus::EventBus`] — publish/subscribe change-event transport
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ CoordinationService  │  validate → persist → index → publish
//! └───┬──────┬───────┬───┘
//!     │      │       │
//!     ▼      ▼       ▼
//! ┌───────┐ ┌──────┐ ┌──────────┐
//! │Gateway│ │ Repo │ │Publisher │
//! └───┬───┘ └──┬───┘ └────┬─────┘
//!     │        │          │
//!     ▼        ▼          ▼
//! RemoteValidator  StateStore  EventBus ──▶ NotificationConsumer
//! ```
//!
//! The domain payload is deliberately small (a todo item); the interesting
//! contracts live at the seams: partial-failure ordering between the primary
//! write and the identifier index, fail-open validation, best-effort
//! publishing, and at-least-once event consumption.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod event;
pub mod event_bus;
pub mod state_store;
pub mod todo;
pub mod validator;

/// Environment module - dependency injection traits shared across crates.
///
/// External effects the coordination core needs beyond its three ports are
/// abstracted here so tests can substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// Production code uses [`SystemClock`]; tests inject a fixed or stepping
    /// clock so server-assigned timestamps are deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
