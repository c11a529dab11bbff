//! # Todo Coord Runtime
//!
//! The record-coordination core: an indexed repository over an external
//! key-value store, a fail-open validation gateway, a best-effort change
//! publisher, the coordination service orchestrating them, and the
//! at-least-once notification consumer on the far side of the bus.
//!
//! ## Write Path
//!
//! ```text
//! create/update/delete
//!        │
//!        ▼
//!   ValidationGateway ── reject ──▶ InvalidName (terminal)
//!        │ accept / accept-degraded
//!        ▼
//!   IndexedRepository ── error ──▶ Storage (terminal)
//!        │ primary write + index arbitration
//!        ▼
//!   ChangePublisher ── publish failure is swallowed, never unwinds
//!        │
//!        ▼
//!      Done
//! ```
//!
//! ## Correctness Notes
//!
//! - The identifier index is read-modify-write shared state; one
//!   repository instance serializes all its index mutations through a
//!   single-writer arbiter task ([`repository`]). Cross-process writers
//!   are not arbitrated — that residual race is documented, not hidden.
//! - Validation fails open ([`gateway`]): an unreachable validator admits
//!   the write and surfaces as a distinguished degraded outcome.
//! - Publishing is best-effort ([`publisher`]): the mutation has committed
//!   before publish is attempted, and a lost event never fails it.
//! - The consumer ([`consumer`]) tolerates redelivery and classifies
//!   malformed payloads as terminally failed rather than retryable.

pub mod config;
pub mod consumer;
pub mod gateway;
pub mod publisher;
pub mod repository;
pub mod service;

pub use config::CoordinationConfig;
pub use consumer::{
    DeliveryStatus, HandleOutcome, NotificationConsumer, NotificationHandler, NotificationLog,
    NotificationRecord, NotificationSink, SinkError,
};
pub use gateway::{ValidationGateway, ValidationOutcome};
pub use publisher::{ChangePublisher, PublishOutcome};
pub use repository::IndexedRepository;
pub use service::{CoordinationError, CoordinationService};
