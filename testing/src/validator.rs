//! Validator mocks: scripted verdicts, unreachable peers, slow peers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use todo_coord_core::validator::{
    RemoteValidator, ValidationRequest, ValidationVerdict, ValidatorError,
};

/// Validator that always answers with the same verdict and counts calls.
///
/// Clones share the call counter, so a test can hand one clone to the
/// gateway and keep another to assert how often validation was attempted.
#[derive(Clone, Debug)]
pub struct StaticValidator {
    verdict: ValidationVerdict,
    calls: Arc<AtomicUsize>,
}

impl StaticValidator {
    /// Validator that accepts every name.
    #[must_use]
    pub fn accepting() -> Self {
        Self {
            verdict: ValidationVerdict::accept("Todo name is valid"),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Validator that rejects every name with `message`.
    #[must_use]
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            verdict: ValidationVerdict::reject(message),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many validation calls this validator has answered.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteValidator for StaticValidator {
    async fn validate(
        &self,
        _request: ValidationRequest,
    ) -> Result<ValidationVerdict, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.clone())
    }
}

/// Validator whose transport always fails, for fail-open tests.
#[derive(Clone, Debug, Default)]
pub struct UnreachableValidator;

impl UnreachableValidator {
    /// Creates an unreachable validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RemoteValidator for UnreachableValidator {
    async fn validate(
        &self,
        _request: ValidationRequest,
    ) -> Result<ValidationVerdict, ValidatorError> {
        Err(ValidatorError::Unreachable(
            "validation service is down".to_string(),
        ))
    }
}

/// Validator that accepts, but only after a fixed delay — for driving the
/// gateway's timeout path.
#[derive(Clone, Debug)]
pub struct SlowValidator {
    delay: Duration,
}

impl SlowValidator {
    /// Creates a validator that sleeps for `delay` before answering.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RemoteValidator for SlowValidator {
    async fn validate(
        &self,
        _request: ValidationRequest,
    ) -> Result<ValidationVerdict, ValidatorError> {
        tokio::time::sleep(self.delay).await;
        Ok(ValidationVerdict::accept("Todo name is valid"))
    }
}
