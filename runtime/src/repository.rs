//! Indexed repository: entity CRUD plus the secondary index of known ids.
//!
//! Entities are stored individually under `<prefix><uuid>` keys; a separate
//! well-known key holds the index — the set of identifiers believed to
//! exist. The backend offers no transactions, so a mutation is two writes
//! with observable intermediate states:
//!
//! - `save` writes the primary record first, then the index. If the index
//!   update fails the entity is persisted but not discoverable via
//!   [`IndexedRepository::find_all`]; `find_by_id` works regardless of
//!   index state, and the error is surfaced so the caller knows the list
//!   view is behind.
//! - `delete_by_id` removes the index entry first, then the primary record,
//!   so the index can never reference a record known to be deleted. A
//!   failed primary delete leaves an unlisted but still readable record.
//!
//! # Index Write Arbitration
//!
//! The index is a shared aggregate mutated by read-modify-write, the
//! classic lost-update surface. All index mutations from one repository
//! instance are funneled through a single-writer arbiter task fed by a
//! channel, so concurrent in-process saves and deletes cannot drop each
//! other's updates. Separate processes sharing one backend still race;
//! across processes the index converges only as long as writers do not
//! overlap, and that residual gap is accepted as best-effort.
//!
//! Primary records have no concurrency token at all: concurrent writers to
//! the same identifier are last-writer-wins.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use todo_coord_core::state_store::{StateStore, StateStoreError};
use todo_coord_core::todo::{Todo, TodoId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Capacity of the arbiter's command queue; senders back-pressure beyond it.
const INDEX_QUEUE_CAPACITY: usize = 64;

/// Repository over a [`StateStore`] maintaining a secondary id index.
pub struct IndexedRepository<S> {
    store: Arc<S>,
    key_prefix: String,
    index_key: String,
    op_timeout: Duration,
    index_tx: mpsc::Sender<IndexCommand>,
}

impl<S: StateStore + 'static> IndexedRepository<S> {
    /// Creates a repository and spawns its index arbiter task.
    ///
    /// The arbiter lives as long as the repository; it stops when the
    /// repository is dropped.
    #[must_use]
    pub fn new(
        store: S,
        key_prefix: impl Into<String>,
        index_key: impl Into<String>,
        op_timeout: Duration,
    ) -> Self {
        let store = Arc::new(store);
        let index_key = index_key.into();
        let index_tx = IndexArbiter::spawn(Arc::clone(&store), index_key.clone(), op_timeout);
        Self {
            store,
            key_prefix: key_prefix.into(),
            index_key,
            op_timeout,
            index_tx,
        }
    }

    /// Persists `todo` under its identifier key, then indexes the id.
    ///
    /// Returns the persisted entity.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if either write fails. When the primary
    /// write succeeded but the index update did not, the record is already
    /// committed; only its membership in the list view is behind.
    pub async fn save(&self, todo: &Todo) -> Result<Todo, StateStoreError> {
        let key = self.key_for(&todo.id);
        debug!(id = %todo.id, "Saving todo");

        let bytes = serde_json::to_vec(todo)?;
        self.with_timeout(self.store.put(&key, &bytes)).await?;

        self.index_mutation(IndexMutation::Insert(todo.id.to_string()))
            .await?;

        Ok(todo.clone())
    }

    /// Reads the entity stored under `id`, independent of index state.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] on a backend failure or a corrupt stored
    /// value. An absent record is `Ok(None)`, not an error.
    pub async fn find_by_id(&self, id: &TodoId) -> Result<Option<Todo>, StateStoreError> {
        let key = self.key_for(id);
        match self.with_timeout(self.store.get(&key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Lists all entities the index knows about.
    ///
    /// Index entries whose primary record has vanished are stale: they are
    /// skipped with a warning, never an error. Results are ordered by
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if the index or a primary record cannot
    /// be read from the backend.
    pub async fn find_all(&self) -> Result<Vec<Todo>, StateStoreError> {
        let index = self.load_index().await?;
        let mut todos = Vec::with_capacity(index.len());

        for raw_id in &index {
            let Ok(id) = TodoId::parse(raw_id) else {
                warn!(entry = %raw_id, "Skipping unparseable index entry");
                continue;
            };
            match self.find_by_id(&id).await? {
                Some(todo) => todos.push(todo),
                None => {
                    warn!(id = %id, "Index references a missing record, skipping stale entry");
                }
            }
        }

        Ok(todos)
    }

    /// Removes the index entry for `id`, then deletes the primary record.
    ///
    /// Deleting an absent id succeeds; existence checks belong to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if either write fails.
    pub async fn delete_by_id(&self, id: &TodoId) -> Result<(), StateStoreError> {
        debug!(id = %id, "Deleting todo");

        // Index entry first: a listed id must never point at a record the
        // store has already deleted.
        self.index_mutation(IndexMutation::Remove(id.to_string()))
            .await?;

        let key = self.key_for(id);
        self.with_timeout(self.store.delete(&key)).await
    }

    /// Deletes every entity the index knows about.
    ///
    /// # Errors
    ///
    /// Returns the first [`StateStoreError`] encountered; earlier deletes
    /// stay deleted.
    pub async fn delete_all(&self) -> Result<(), StateStoreError> {
        for todo in self.find_all().await? {
            self.delete_by_id(&todo.id).await?;
        }
        Ok(())
    }

    /// Whether a record exists under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if the read fails.
    pub async fn exists(&self, id: &TodoId) -> Result<bool, StateStoreError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Number of entities currently discoverable via [`Self::find_all`].
    ///
    /// # Errors
    ///
    /// Returns [`StateStoreError`] if the underlying list fails.
    pub async fn count(&self) -> Result<usize, StateStoreError> {
        Ok(self.find_all().await?.len())
    }

    fn key_for(&self, id: &TodoId) -> String {
        format!("{}{id}", self.key_prefix)
    }

    async fn load_index(&self) -> Result<BTreeSet<String>, StateStoreError> {
        read_index(self.store.as_ref(), &self.index_key, self.op_timeout).await
    }

    async fn index_mutation(&self, mutation: IndexMutation) -> Result<(), StateStoreError> {
        let (ack, done) = oneshot::channel();
        let command = IndexCommand { mutation, ack };
        self.index_tx
            .send(command)
            .await
            .map_err(|_| StateStoreError::Backend("index arbiter stopped".to_string()))?;
        done.await
            .map_err(|_| StateStoreError::Backend("index arbiter dropped the request".to_string()))?
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, StateStoreError>>,
    ) -> Result<T, StateStoreError> {
        run_with_timeout(self.op_timeout, operation).await
    }
}

impl<S> std::fmt::Debug for IndexedRepository<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedRepository")
            .field("key_prefix", &self.key_prefix)
            .field("index_key", &self.index_key)
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

enum IndexMutation {
    Insert(String),
    Remove(String),
}

struct IndexCommand {
    mutation: IndexMutation,
    ack: oneshot::Sender<Result<(), StateStoreError>>,
}

/// Single-writer task serializing all index read-modify-writes.
struct IndexArbiter<S> {
    store: Arc<S>,
    index_key: String,
    op_timeout: Duration,
    rx: mpsc::Receiver<IndexCommand>,
}

impl<S: StateStore + 'static> IndexArbiter<S> {
    fn spawn(store: Arc<S>, index_key: String, op_timeout: Duration) -> mpsc::Sender<IndexCommand> {
        let (tx, rx) = mpsc::channel(INDEX_QUEUE_CAPACITY);
        let arbiter = Self {
            store,
            index_key,
            op_timeout,
            rx,
        };
        tokio::spawn(arbiter.run());
        tx
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            let result = self.apply(&command.mutation).await;
            if let Err(error) = &result {
                warn!(error = %error, "Index update failed");
            }
            // The caller may have gone away; that is not our problem.
            let _ = command.ack.send(result);
        }
        debug!(index_key = %self.index_key, "Index arbiter stopped");
    }

    async fn apply(&self, mutation: &IndexMutation) -> Result<(), StateStoreError> {
        let mut index = read_index(self.store.as_ref(), &self.index_key, self.op_timeout).await?;

        let changed = match mutation {
            IndexMutation::Insert(id) => index.insert(id.clone()),
            IndexMutation::Remove(id) => index.remove(id),
        };
        if !changed {
            return Ok(());
        }

        let bytes = serde_json::to_vec(&index)?;
        run_with_timeout(self.op_timeout, self.store.put(&self.index_key, &bytes)).await
    }
}

/// Reads the index set; an absent key is an empty index, and a corrupt
/// value is treated as empty (and rebuilt by subsequent mutations) rather
/// than poisoning every list call.
async fn read_index<S: StateStore>(
    store: &S,
    index_key: &str,
    op_timeout: Duration,
) -> Result<BTreeSet<String>, StateStoreError> {
    match run_with_timeout(op_timeout, store.get(index_key)).await? {
        Some(bytes) => match serde_json::from_slice(&bytes) {
            Ok(index) => Ok(index),
            Err(error) => {
                warn!(error = %error, "Index value is corrupt, treating as empty");
                Ok(BTreeSet::new())
            }
        },
        None => Ok(BTreeSet::new()),
    }
}

async fn run_with_timeout<T>(
    bound: Duration,
    operation: impl Future<Output = Result<T, StateStoreError>>,
) -> Result<T, StateStoreError> {
    match tokio::time::timeout(bound, operation).await {
        Ok(result) => result,
        Err(_) => Err(StateStoreError::Timeout(bound)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)] // Panics: tests fail loudly on broken plumbing

    use super::*;
    use chrono::Utc;
    use todo_coord_testing::InMemoryStateStore;

    fn repository(store: InMemoryStateStore) -> IndexedRepository<InMemoryStateStore> {
        IndexedRepository::new(store, "todo-", "todo-index", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn save_then_find_roundtrips() {
        let repo = repository(InMemoryStateStore::new());
        let todo = Todo::new("Buy milk", Utc::now());

        let saved = repo.save(&todo).await.expect("save should succeed");
        assert_eq!(saved, todo);

        let found = repo
            .find_by_id(&todo.id)
            .await
            .expect("find should succeed")
            .expect("record should exist");
        assert_eq!(found, todo);
        assert!(repo.exists(&todo.id).await.expect("exists should succeed"));
    }

    #[tokio::test]
    async fn find_missing_is_none_not_error() {
        let repo = repository(InMemoryStateStore::new());
        let absent = repo
            .find_by_id(&TodoId::new())
            .await
            .expect("lookup should succeed");
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn sequential_saves_and_deletes_keep_index_coherent() {
        let repo = repository(InMemoryStateStore::new());
        let now = Utc::now();

        let a = Todo::new("First", now);
        let b = Todo::new("Second", now);
        let c = Todo::new("Third", now);
        for todo in [&a, &b, &c] {
            repo.save(todo).await.expect("save should succeed");
        }
        repo.delete_by_id(&b.id).await.expect("delete should succeed");

        let mut listed: Vec<String> = repo
            .find_all()
            .await
            .expect("list should succeed")
            .into_iter()
            .map(|todo| todo.id.to_string())
            .collect();
        listed.sort();
        let mut expected = vec![a.id.to_string(), c.id.to_string()];
        expected.sort();
        assert_eq!(listed, expected);
        assert_eq!(repo.count().await.expect("count should succeed"), 2);
    }

    #[tokio::test]
    async fn concurrent_saves_do_not_lose_index_updates() {
        let repo = Arc::new(repository(InMemoryStateStore::new()));
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let todo = Todo::new(format!("Todo {i}"), now);
                repo.save(&todo).await.expect("save should succeed");
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        assert_eq!(repo.count().await.expect("count should succeed"), 16);
    }

    #[tokio::test]
    async fn stale_index_entries_are_skipped() {
        let store = InMemoryStateStore::new();
        let repo = repository(store.clone());
        let now = Utc::now();

        let live = Todo::new("Still here", now);
        repo.save(&live).await.expect("save should succeed");

        // Plant a ghost entry pointing at a record that does not exist.
        let index = vec![live.id.to_string(), TodoId::new().to_string()];
        store
            .put(
                "todo-index",
                &serde_json::to_vec(&index).expect("index should serialize"),
            )
            .await
            .expect("direct put should succeed");

        let listed = repo.find_all().await.expect("list should tolerate ghosts");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
    }

    #[tokio::test]
    async fn corrupt_index_reads_as_empty() {
        let store = InMemoryStateStore::new();
        store
            .put("todo-index", b"not json at all")
            .await
            .expect("direct put should succeed");

        let repo = repository(store);
        assert!(repo.find_all().await.expect("list should succeed").is_empty());
    }

    #[tokio::test]
    async fn delete_all_empties_the_repository() {
        let repo = repository(InMemoryStateStore::new());
        let now = Utc::now();
        for name in ["One", "Two", "Three"] {
            repo.save(&Todo::new(name, now)).await.expect("save should succeed");
        }

        repo.delete_all().await.expect("delete_all should succeed");
        assert_eq!(repo.count().await.expect("count should succeed"), 0);
    }

    #[tokio::test]
    async fn failed_index_update_leaves_record_readable() {
        let store = InMemoryStateStore::new();
        let repo = repository(store.clone());
        let todo = Todo::new("Buy milk", Utc::now());

        // Primary write succeeds, index write fails.
        store.fail_puts_matching("todo-index");
        let err = repo.save(&todo).await.expect_err("save must surface the index failure");
        assert!(matches!(err, StateStoreError::Unavailable(_)));

        store.heal();
        let found = repo
            .find_by_id(&todo.id)
            .await
            .expect("find should succeed")
            .expect("primary record must have been committed");
        assert_eq!(found.name, "Buy milk");
        // But the list view is behind.
        assert!(repo.find_all().await.expect("list should succeed").is_empty());
    }
}
