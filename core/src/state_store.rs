//! State store port: key-value persistence against an external backend.
//!
//! The store is an external collaborator reached over the network; the core
//! only consumes this trait. Values are opaque bytes — the repository layer
//! decides the serialization format. The backend offers no transactions and
//! no compare-and-swap, which is why the identifier index built on top of it
//! needs its own write arbitration (see `todo-coord-runtime`).
//!
//! # Implementations
//!
//! - `InMemoryStateStore` (in `todo-coord-testing`): HashMap-backed, with
//!   per-operation failure injection for partial-failure tests.
//!
//! # Dyn Compatibility
//!
//! This trait returns `impl Future` and is consumed via generics
//! (`IndexedRepository<S: StateStore>`); it is not meant to be used as a
//! trait object.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during state store operations.
#[derive(Error, Debug, Clone)]
pub enum StateStoreError {
    /// The backend could not be reached.
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// A store call exceeded its bounded timeout.
    #[error("State store call timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value could not be serialized or deserialized.
    #[error("State store serialization error: {0}")]
    Serialization(String),

    /// The backend reported an operation failure.
    #[error("State store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StateStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Key-value persistence port.
///
/// # Contract
///
/// - `get` on an absent key is `Ok(None)`, not an error.
/// - `put` is an upsert; `delete` on an absent key succeeds.
/// - Concurrent writers are last-writer-wins; the store offers no
///   concurrency token.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; calls may come from any task.
pub trait StateStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if the backend cannot be reached or the
    /// read fails. An absent key is `Ok(None)`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StateStoreError>> + Send;

    /// Writes `value` under `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if the backend cannot be reached or the
    /// write fails.
    fn put(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<(), StateStoreError>> + Send;

    /// Removes the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if the backend cannot be reached or the
    /// delete fails.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StateStoreError>> + Send;
}
