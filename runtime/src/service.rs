//! Coordination service: validate → persist → index → publish.
//!
//! Each mutation runs a linear state machine with no back-edges:
//!
//! ```text
//! Idle ──▶ Validating ──▶ Persisting ──▶ Publishing ──▶ Done
//!              │               │
//!              ▼               ▼
//!           Rejected        Failed
//! ```
//!
//! Update and delete short-circuit to a terminal `NotFound` before
//! validation when the entity does not exist. Every suspension point is an
//! awaited port call; the task never blocks a worker thread.
//!
//! The error taxonomy keeps structural failures discriminable — not-found,
//! invalid input, and storage failures are distinct variants, never
//! collapsed — while recoverable dependency trouble (validator or bus
//! unreachable) is absorbed at its own component boundary and never escapes
//! as a failure of the mutation.

use crate::gateway::{ValidationGateway, ValidationOutcome};
use crate::publisher::ChangePublisher;
use crate::repository::IndexedRepository;
use std::sync::Arc;
use thiserror::Error;
use todo_coord_core::environment::Clock;
use todo_coord_core::event::{ChangeKind, TodoEvent};
use todo_coord_core::state_store::{StateStore, StateStoreError};
use todo_coord_core::todo::{Todo, TodoId};
use todo_coord_core::validator::RemoteValidator;
use tracing::{info, warn};

/// Errors a mutation can surface to its caller.
#[derive(Error, Debug)]
pub enum CoordinationError {
    /// The requested identifier does not exist (404-equivalent).
    #[error("Todo with id {id} not found")]
    NotFound {
        /// The identifier that was requested.
        id: TodoId,
    },

    /// Validation rejected the candidate name (400-equivalent).
    #[error("Todo name is invalid: {message}")]
    InvalidName {
        /// The validator's rejection message.
        message: String,
    },

    /// The primary store failed (500-equivalent); not retried here.
    #[error(transparent)]
    Storage(#[from] StateStoreError),
}

/// Orchestrates todo mutations across the repository, gateway and publisher.
pub struct CoordinationService<S, V> {
    repository: IndexedRepository<S>,
    gateway: ValidationGateway<V>,
    publisher: ChangePublisher,
    clock: Arc<dyn Clock>,
    actor: String,
    validator_id: String,
}

impl<S, V> CoordinationService<S, V>
where
    S: StateStore + 'static,
    V: RemoteValidator,
{
    /// Wires a service from its collaborators.
    ///
    /// `actor` and `validator_id` are stamped on every change event.
    #[must_use]
    pub fn new(
        repository: IndexedRepository<S>,
        gateway: ValidationGateway<V>,
        publisher: ChangePublisher,
        clock: Arc<dyn Clock>,
        actor: impl Into<String>,
        validator_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            gateway,
            publisher,
            clock,
            actor: actor.into(),
            validator_id: validator_id.into(),
        }
    }

    /// The repository this service persists through.
    #[must_use]
    pub const fn repository(&self) -> &IndexedRepository<S> {
        &self.repository
    }

    /// Creates a new todo after validating its name.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::InvalidName`] if validation rejects the name.
    /// - [`CoordinationError::Storage`] if persisting fails.
    pub async fn create(&self, name: &str) -> Result<Todo, CoordinationError> {
        info!(name, "Creating todo");
        self.check_name(name).await?;

        let now = self.clock.now();
        let todo = Todo::new(name, now);
        let saved = self.repository.save(&todo).await?;

        self.announce(ChangeKind::Created, &saved).await;
        Ok(saved)
    }

    /// Toggles the completion flag of an existing todo.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::NotFound`] if the id does not exist — checked
    ///   before any validation or publish is attempted.
    /// - [`CoordinationError::InvalidName`] if validation rejects the
    ///   stored name.
    /// - [`CoordinationError::Storage`] if persisting fails.
    pub async fn update(&self, id: &TodoId) -> Result<Todo, CoordinationError> {
        info!(%id, "Updating todo");
        let mut todo = self.require(id).await?;

        self.check_name(&todo.name).await?;

        todo.toggle_completed(self.clock.now());
        let saved = self.repository.save(&todo).await?;

        self.announce(ChangeKind::Updated, &saved).await;
        Ok(saved)
    }

    /// Deletes an existing todo, returning its last persisted state.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::NotFound`] if the id does not exist.
    /// - [`CoordinationError::Storage`] if the delete fails.
    pub async fn delete(&self, id: &TodoId) -> Result<Todo, CoordinationError> {
        info!(%id, "Deleting todo");
        let todo = self.require(id).await?;

        self.repository.delete_by_id(id).await?;

        self.announce(ChangeKind::Deleted, &todo).await;
        Ok(todo)
    }

    /// Fetches a todo by id.
    ///
    /// # Errors
    ///
    /// - [`CoordinationError::NotFound`] if the id does not exist.
    /// - [`CoordinationError::Storage`] if the read fails.
    pub async fn get(&self, id: &TodoId) -> Result<Todo, CoordinationError> {
        self.require(id).await
    }

    /// Lists all discoverable todos.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Storage`] if the list fails.
    pub async fn list(&self) -> Result<Vec<Todo>, CoordinationError> {
        Ok(self.repository.find_all().await?)
    }

    /// Number of discoverable todos.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Storage`] if the underlying list fails.
    pub async fn count(&self) -> Result<usize, CoordinationError> {
        Ok(self.repository.count().await?)
    }

    /// Validating state: rejection is terminal, degraded acceptance is
    /// logged and the machine continues.
    async fn check_name(&self, name: &str) -> Result<(), CoordinationError> {
        match self.gateway.validate(name).await {
            ValidationOutcome::Rejected { message } => {
                info!(name, message = %message, "Validation rejected name");
                Err(CoordinationError::InvalidName { message })
            }
            ValidationOutcome::AcceptedDegraded { reason } => {
                warn!(name, reason = %reason, "Proceeding with unvalidated name");
                Ok(())
            }
            ValidationOutcome::Accepted { .. } => Ok(()),
        }
    }

    async fn require(&self, id: &TodoId) -> Result<Todo, CoordinationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoordinationError::NotFound { id: id.clone() })
    }

    /// Publishing state: always succeeds from the machine's point of view;
    /// a dropped event is the publisher's concern (§ best-effort publish).
    async fn announce(&self, kind: ChangeKind, todo: &Todo) {
        let event = TodoEvent::new(
            kind,
            todo,
            self.clock.now(),
            self.actor.clone(),
            self.validator_id.clone(),
        );
        let _outcome = self.publisher.publish(&event).await;
    }
}

impl<S, V> std::fmt::Debug for CoordinationService<S, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationService")
            .field("actor", &self.actor)
            .field("validator_id", &self.validator_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::panic)] // Panics: tests fail loudly on broken plumbing

    use super::*;
    use crate::config::CoordinationConfig;
    use std::time::Duration;
    use todo_coord_core::event_bus::EventBus;
    use todo_coord_core::validator::{RuleBasedValidator, ValidationRules};
    use todo_coord_testing::{FixedClock, InMemoryEventBus, InMemoryStateStore, StaticValidator};

    type RuleService = CoordinationService<InMemoryStateStore, RuleBasedValidator>;

    fn service_with_bus(bus: Arc<InMemoryEventBus>) -> RuleService {
        let config = CoordinationConfig::default();
        let repository = IndexedRepository::new(
            InMemoryStateStore::new(),
            config.key_prefix.clone(),
            config.index_key.clone(),
            config.store_timeout(),
        );
        let gateway = ValidationGateway::new(
            RuleBasedValidator::new(ValidationRules::default()),
            config.validation_timeout(),
        );
        let publisher = ChangePublisher::new(
            bus as Arc<dyn EventBus>,
            config.topic.clone(),
            config.source.clone(),
            config.publish_timeout(),
        );
        CoordinationService::new(
            repository,
            gateway,
            publisher,
            Arc::new(FixedClock::default()),
            config.actor,
            config.validator_id,
        )
    }

    #[tokio::test]
    async fn create_rejected_name_never_persists() {
        let bus = Arc::new(InMemoryEventBus::new());
        let service = service_with_bus(Arc::clone(&bus));

        let err = service.create("x").await.expect_err("short name must be rejected");
        let CoordinationError::InvalidName { message } = err else {
            panic!("expected InvalidName");
        };
        assert!(message.contains("at least 3"));

        assert_eq!(service.count().await.expect("count should succeed"), 0);
        assert_eq!(bus.published_count(), 0);
    }

    #[tokio::test]
    async fn update_missing_id_short_circuits() {
        let bus = Arc::new(InMemoryEventBus::new());
        let validator = StaticValidator::accepting();
        let config = CoordinationConfig::default();
        let repository = IndexedRepository::new(
            InMemoryStateStore::new(),
            config.key_prefix.clone(),
            config.index_key.clone(),
            config.store_timeout(),
        );
        let gateway = ValidationGateway::new(validator.clone(), config.validation_timeout());
        let publisher = ChangePublisher::new(
            Arc::clone(&bus) as Arc<dyn EventBus>,
            config.topic.clone(),
            config.source.clone(),
            config.publish_timeout(),
        );
        let service = CoordinationService::new(
            repository,
            gateway,
            publisher,
            Arc::new(FixedClock::default()),
            config.actor,
            config.validator_id,
        );

        let err = service
            .update(&TodoId::new())
            .await
            .expect_err("missing id must be NotFound");
        assert!(matches!(err, CoordinationError::NotFound { .. }));

        // Terminal NotFound: neither validation nor publish was attempted.
        assert_eq!(validator.calls(), 0);
        assert_eq!(bus.published_count(), 0);
    }

    #[tokio::test]
    async fn delete_returns_last_state_and_removes_record() {
        let bus = Arc::new(InMemoryEventBus::new());
        let service = service_with_bus(Arc::clone(&bus));

        let created = service.create("Buy milk").await.expect("create should succeed");
        let deleted = service.delete(&created.id).await.expect("delete should succeed");
        assert_eq!(deleted, created);

        let err = service.get(&created.id).await.expect_err("record must be gone");
        assert!(matches!(err, CoordinationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn second_delete_is_not_found() {
        let bus = Arc::new(InMemoryEventBus::new());
        let service = service_with_bus(bus);

        let created = service.create("Buy milk").await.expect("create should succeed");
        service.delete(&created.id).await.expect("delete should succeed");
        let err = service
            .delete(&created.id)
            .await
            .expect_err("second delete must be NotFound");
        assert!(matches!(err, CoordinationError::NotFound { .. }));
    }
}
