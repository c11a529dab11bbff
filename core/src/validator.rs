//! Remote validator port and the validation rule set.
//!
//! Name validation is advisory: the coordination service asks a remote peer
//! whether a candidate name is acceptable before writing. The peer's
//! decision logic — length bounds plus a case-insensitive forbidden-word
//! scan — lives in [`ValidationRules`], and [`RuleBasedValidator`] exposes
//! it through the [`RemoteValidator`] port for in-process use and tests.
//!
//! The rule set is configured once at startup and read-only afterwards;
//! unsynchronized concurrent reads are safe.

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Request sent to the validator: the candidate name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// The candidate todo name.
    pub name: String,
}

impl ValidationRequest {
    /// Builds a request for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The validator's answer: accept or reject, with a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the candidate name is acceptable.
    pub valid: bool,
    /// Why — e.g. `Todo name must be at least 3 characters long`.
    pub message: String,
}

impl ValidationVerdict {
    /// An accepting verdict.
    #[must_use]
    pub fn accept(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
        }
    }

    /// A rejecting verdict.
    #[must_use]
    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Errors that can occur while calling the remote validator.
///
/// These are transport-level failures. A rejection is not an error — it
/// arrives as a [`ValidationVerdict`] with `valid = false`.
#[derive(Error, Debug, Clone)]
pub enum ValidatorError {
    /// The validator could not be reached.
    #[error("Validator unreachable: {0}")]
    Unreachable(String),

    /// The validator answered with something undecodable.
    #[error("Malformed validator response: {0}")]
    MalformedResponse(String),

    /// The validator reported an internal failure (5xx-equivalent).
    #[error("Validator internal error: {0}")]
    Internal(String),
}

/// Remote validation port.
///
/// The gateway in `todo-coord-runtime` wraps this call with a bounded
/// timeout and a fail-open default; implementations only need to answer or
/// fail honestly.
pub trait RemoteValidator: Send + Sync {
    /// Asks whether the candidate name is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError`] on transport or remote failure. Rejection
    /// is expressed through the verdict, not an error.
    fn validate(
        &self,
        request: ValidationRequest,
    ) -> impl Future<Output = Result<ValidationVerdict, ValidatorError>> + Send;
}

/// The validation rule set: length bounds and forbidden substrings.
///
/// Process-wide, immutable after initialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Minimum name length, in characters.
    pub min_length: usize,
    /// Maximum name length, in characters.
    pub max_length: usize,
    /// Substrings that may not appear in a name (case-insensitive).
    pub forbidden_words: Vec<String>,
    /// Whether the forbidden-word scan is enabled.
    pub profanity_check: bool,
    /// Whether an external reputation check is enabled (reserved; the
    /// rule-based validator never performs it).
    pub external_check: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 100,
            forbidden_words: [
                "spam", "test123", "delete", "bad", "terrible", "awful", "hate", "stupid", "dumb",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            profanity_check: true,
            external_check: false,
        }
    }
}

impl ValidationRules {
    /// Evaluates a candidate name against the rule set.
    ///
    /// Checks run in order: presence, minimum length, maximum length,
    /// forbidden words. The first failing check decides the verdict.
    ///
    /// ```
    /// use todo_coord_core::validator::ValidationRules;
    ///
    /// let rules = ValidationRules::default();
    /// assert!(rules.evaluate("Buy milk").valid);
    /// assert!(!rules.evaluate("x").valid);
    /// ```
    #[must_use]
    pub fn evaluate(&self, name: &str) -> ValidationVerdict {
        if name.trim().is_empty() {
            return ValidationVerdict::reject("Todo name is required");
        }

        let length = name.chars().count();
        if length < self.min_length {
            return ValidationVerdict::reject(format!(
                "Todo name must be at least {} characters long",
                self.min_length
            ));
        }
        if length > self.max_length {
            return ValidationVerdict::reject(format!(
                "Todo name must be less than {} characters long",
                self.max_length
            ));
        }

        if self.profanity_check {
            let lowered = name.to_lowercase();
            if let Some(word) = self
                .forbidden_words
                .iter()
                .find(|word| lowered.contains(&word.to_lowercase()))
            {
                return ValidationVerdict::reject(format!(
                    "Todo name contains forbidden word: \"{word}\""
                ));
            }
        }

        ValidationVerdict::accept("Todo name is valid")
    }
}

/// [`RemoteValidator`] that evaluates the rule set in-process.
///
/// Stands in for the remote validation peer: same decision logic, no
/// transport. Production deployments would put a thin RPC adapter behind
/// the same port instead.
#[derive(Clone, Debug, Default)]
pub struct RuleBasedValidator {
    rules: ValidationRules,
}

impl RuleBasedValidator {
    /// Builds a validator over the given rule set.
    #[must_use]
    pub const fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    /// The rule set this validator applies.
    #[must_use]
    pub const fn rules(&self) -> &ValidationRules {
        &self.rules
    }
}

impl RemoteValidator for RuleBasedValidator {
    async fn validate(
        &self,
        request: ValidationRequest,
    ) -> Result<ValidationVerdict, ValidatorError> {
        Ok(self.rules.evaluate(&request.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_name_is_required() {
        let rules = ValidationRules::default();
        let verdict = rules.evaluate("   ");
        assert!(!verdict.valid);
        assert_eq!(verdict.message, "Todo name is required");
    }

    #[test]
    fn short_name_names_minimum() {
        let rules = ValidationRules::default();
        let verdict = rules.evaluate("x");
        assert!(!verdict.valid);
        assert_eq!(verdict.message, "Todo name must be at least 3 characters long");
    }

    #[test]
    fn forbidden_word_match_is_case_insensitive() {
        let rules = ValidationRules::default();
        let verdict = rules.evaluate("this is SPAM really");
        assert!(!verdict.valid);
        assert!(verdict.message.contains("spam"));
    }

    #[test]
    fn forbidden_word_matches_as_substring() {
        let rules = ValidationRules::default();
        // "delete" is forbidden; "undeletable" contains it.
        assert!(!rules.evaluate("undeletable chore").valid);
    }

    #[test]
    fn disabled_profanity_check_skips_word_scan() {
        let rules = ValidationRules {
            profanity_check: false,
            ..ValidationRules::default()
        };
        assert!(rules.evaluate("spam spam spam").valid);
    }

    #[tokio::test]
    #[allow(clippy::expect_used)] // Panics: test fails if the port errors
    async fn rule_based_validator_answers_through_the_port() {
        let validator = RuleBasedValidator::default();
        let verdict = validator
            .validate(ValidationRequest::new("Buy milk"))
            .await
            .expect("rule-based validation cannot fail");
        assert!(verdict.valid);
        assert_eq!(verdict.message, "Todo name is valid");
    }

    proptest! {
        #[test]
        fn names_below_minimum_always_rejected(name in "[a-zA-Z]{1,2}") {
            let rules = ValidationRules::default();
            prop_assert!(!rules.evaluate(&name).valid);
        }

        #[test]
        fn clean_names_within_bounds_accepted(name in "[fgjkl]{3,100}") {
            // Alphabet chosen so no forbidden word can occur.
            let rules = ValidationRules::default();
            prop_assert!(rules.evaluate(&name).valid);
        }

        #[test]
        fn names_over_maximum_always_rejected(name in "[fgjkl]{101,150}") {
            let rules = ValidationRules::default();
            prop_assert!(!rules.evaluate(&name).valid);
        }
    }
}
