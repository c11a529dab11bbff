//! In-memory state store with failure injection.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use todo_coord_core::state_store::{StateStore, StateStoreError};

/// In-memory [`StateStore`] for fast, deterministic testing.
///
/// Clones share storage, so a test can hold one handle for direct
/// inspection while the repository under test holds another. Failure
/// injection lets partial-failure orderings be exercised: a put failure
/// scoped to the index key, for example, simulates "primary write
/// committed, index update lost".
///
/// # Example
///
/// ```
/// use todo_coord_testing::InMemoryStateStore;
/// use todo_coord_core::state_store::StateStore;
///
/// # async fn example() -> Result<(), todo_coord_core::state_store::StateStoreError> {
/// let store = InMemoryStateStore::new();
/// store.put("todo-1", b"value").await?;
/// assert!(store.get("todo-1").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStateStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// When set, puts whose key contains this pattern fail. The empty
    /// pattern fails every put.
    failing_puts: Arc<RwLock<Option<String>>>,
    failing_gets: Arc<RwLock<bool>>,
    failing_deletes: Arc<RwLock<bool>>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `put` whose key contains `pattern` fail with
    /// [`StateStoreError::Unavailable`]. The empty pattern fails all puts.
    pub fn fail_puts_matching(&self, pattern: impl Into<String>) {
        *self.failing_puts.write().unwrap() = Some(pattern.into());
    }

    /// Makes every `get` fail with [`StateStoreError::Unavailable`].
    pub fn fail_gets(&self) {
        *self.failing_gets.write().unwrap() = true;
    }

    /// Makes every `delete` fail with [`StateStoreError::Unavailable`].
    pub fn fail_deletes(&self) {
        *self.failing_deletes.write().unwrap() = true;
    }

    /// Clears all failure injection.
    pub fn heal(&self) {
        *self.failing_puts.write().unwrap() = None;
        *self.failing_gets.write().unwrap() = false;
        *self.failing_deletes.write().unwrap() = false;
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Whether a key exists, without going through the port.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// All stored keys, for inspection in tests.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().unwrap().keys().cloned().collect()
    }

    /// Clears all stored data (for test isolation).
    pub fn clear(&self) {
        self.data.write().unwrap().clear();
    }
}

impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        if *self.failing_gets.read().unwrap() {
            return Err(StateStoreError::Unavailable(format!(
                "injected get failure for '{key}'"
            )));
        }
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StateStoreError> {
        let failing = self.failing_puts.read().unwrap().clone();
        if let Some(pattern) = failing {
            if key.contains(&pattern) {
                return Err(StateStoreError::Unavailable(format!(
                    "injected put failure for '{key}'"
                )));
            }
        }
        self.data
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        if *self.failing_deletes.read().unwrap() {
            return Err(StateStoreError::Unavailable(format!(
                "injected delete failure for '{key}'"
            )));
        }
        self.data.write().unwrap().remove(key);
        Ok(())
    }
}
