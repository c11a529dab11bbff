//! Validation gateway: bounded-timeout remote validation with fail-open.
//!
//! Validation is advisory. When the remote validator answers, its verdict
//! decides; when it cannot answer — timeout, unreachable, internal failure —
//! the gateway admits the name anyway and records the degraded path as a
//! distinct outcome instead of an error. Blocking writes on an unrelated
//! service's availability is judged worse than occasionally admitting an
//! invalid name, and the fail-open behavior is a deliberate, testable
//! contract.

use std::time::Duration;
use todo_coord_core::validator::{RemoteValidator, ValidationRequest};
use tracing::{debug, warn};

/// Result of asking the gateway about a candidate name.
///
/// `AcceptedDegraded` is the fail-open path: the write may proceed, but the
/// name was never actually checked. Keeping it separate from `Accepted`
/// lets callers and tests observe degradation without treating it as a
/// failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The validator answered and accepted the name.
    Accepted {
        /// The validator's message, e.g. `Todo name is valid`.
        message: String,
    },
    /// The validator answered and rejected the name.
    Rejected {
        /// Why the name was rejected.
        message: String,
    },
    /// The validator could not answer; the name is admitted unchecked.
    AcceptedDegraded {
        /// What went wrong with the validation call.
        reason: String,
    },
}

impl ValidationOutcome {
    /// Whether the write may proceed.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::AcceptedDegraded { .. })
    }

    /// Whether this is the fail-open path.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::AcceptedDegraded { .. })
    }
}

/// Wraps a [`RemoteValidator`] with a bounded timeout and fail-open policy.
#[derive(Debug, Clone)]
pub struct ValidationGateway<V> {
    validator: V,
    timeout: Duration,
}

impl<V: RemoteValidator> ValidationGateway<V> {
    /// Creates a gateway bounding every validation call by `timeout`.
    #[must_use]
    pub const fn new(validator: V, timeout: Duration) -> Self {
        Self { validator, timeout }
    }

    /// Asks whether `name` is acceptable.
    ///
    /// Never returns an error: transport failures and timeouts collapse
    /// into [`ValidationOutcome::AcceptedDegraded`].
    pub async fn validate(&self, name: &str) -> ValidationOutcome {
        let request = ValidationRequest::new(name);
        match tokio::time::timeout(self.timeout, self.validator.validate(request)).await {
            Ok(Ok(verdict)) if verdict.valid => {
                debug!(name, "Validator accepted name");
                ValidationOutcome::Accepted {
                    message: verdict.message,
                }
            }
            Ok(Ok(verdict)) => {
                debug!(name, message = %verdict.message, "Validator rejected name");
                ValidationOutcome::Rejected {
                    message: verdict.message,
                }
            }
            Ok(Err(error)) => {
                warn!(name, error = %error, "Validator unreachable, failing open");
                ValidationOutcome::AcceptedDegraded {
                    reason: error.to_string(),
                }
            }
            Err(_) => {
                warn!(name, timeout = ?self.timeout, "Validation timed out, failing open");
                ValidationOutcome::AcceptedDegraded {
                    reason: format!("validation timed out after {:?}", self.timeout),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)] // Panics: tests fail loudly on unexpected outcomes

    use super::*;
    use todo_coord_core::validator::{RuleBasedValidator, ValidationRules};
    use todo_coord_testing::{SlowValidator, UnreachableValidator};

    fn rule_gateway() -> ValidationGateway<RuleBasedValidator> {
        ValidationGateway::new(
            RuleBasedValidator::new(ValidationRules::default()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn reachable_validator_verdict_decides() {
        let gateway = rule_gateway();

        assert!(matches!(
            gateway.validate("Buy milk").await,
            ValidationOutcome::Accepted { .. }
        ));

        let outcome = gateway.validate("x").await;
        let ValidationOutcome::Rejected { message } = outcome else {
            panic!("short name must be rejected, got {outcome:?}");
        };
        assert!(message.contains("at least 3"));
    }

    #[tokio::test]
    async fn unreachable_validator_fails_open_for_any_name() {
        let gateway = ValidationGateway::new(UnreachableValidator::new(), Duration::from_secs(2));

        // Even a name the rules would reject is admitted, degraded.
        let outcome = gateway.validate("x").await;
        assert!(outcome.is_accepted());
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn slow_validator_times_out_and_fails_open() {
        // Validator needs 5 seconds, gateway allows 50ms; the gateway's
        // timeout wins and the test finishes quickly.
        let gateway = ValidationGateway::new(
            SlowValidator::new(Duration::from_secs(5)),
            Duration::from_millis(50),
        );

        let outcome = gateway.validate("Buy milk").await;
        let ValidationOutcome::AcceptedDegraded { reason } = outcome else {
            panic!("timeout must fail open, got {outcome:?}");
        };
        assert!(reason.contains("timed out"));
    }
}
