//! # Todo Coord Testing
//!
//! In-memory adapters and mocks for the todo coordination core.
//!
//! This crate provides:
//! - [`InMemoryStateStore`]: HashMap-backed state store with failure
//!   injection for partial-failure tests
//! - [`InMemoryEventBus`]: broadcast-channel bus with a publish-failure
//!   switch and an at-least-once redelivery helper
//! - Validator mocks: [`StaticValidator`], [`UnreachableValidator`],
//!   [`SlowValidator`]
//! - Deterministic clocks: [`FixedClock`], [`SteppingClock`]
//!
//! ## Example
//!
//! ```ignore
//! use todo_coord_testing::{InMemoryStateStore, test_clock};
//! use todo_coord_runtime::IndexedRepository;
//! use std::time::Duration;
//!
//! #[tokio::test]
//! async fn test_save_flow() {
//!     let repo = IndexedRepository::new(
//!         InMemoryStateStore::new(),
//!         "todo-",
//!         "todo-index",
//!         Duration::from_secs(5),
//!     );
//!     // drive the repository...
//! }
//! ```

pub mod clock;
pub mod event_bus;
pub mod state_store;
pub mod validator;

// Re-export commonly used items
pub use clock::{FixedClock, SteppingClock, test_clock};
pub use event_bus::InMemoryEventBus;
pub use state_store::InMemoryStateStore;
pub use validator::{SlowValidator, StaticValidator, UnreachableValidator};
