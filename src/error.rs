//! Error types for the onboarding flow.
//!
//! Every failure here is step-local and recoverable. Nothing in this crate
//! ends the session; the orchestrator has no notion of a fatal error.

use uuid::Uuid;

use crate::onboarding::state::OnboardingStep;

/// Top-level error type for the onboarding flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A single local field constraint that is not met.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All field failures of one form, reported together.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// Ok when no field failed, otherwise every failure at once.
    pub fn check(errors: Vec<ValidationError>) -> std::result::Result<(), ValidationErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }

    /// Whether a given field is among the failures.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

/// Metadata lookup failures. Never fatal: the step falls back to manual entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum LookupError {
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// Verification code errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("No verification code has been issued")]
    NotIssued,

    #[error("Verification code must not be empty")]
    EmptyCode,

    #[error("Verification code does not match")]
    Mismatch,

    #[error("Resend not available for another {remaining_secs}s")]
    CooldownActive { remaining_secs: u32 },

    #[error("Session is already verified")]
    AlreadyVerified,

    #[error("Code issuer failed: {0}")]
    Issuer(String),
}

/// Background job errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} is already running")]
    AlreadyRunning { id: Uuid },

    #[error("Job has no items")]
    Empty,

    #[error("Item id {item} appears more than once")]
    DuplicateItem { item: String },

    #[error("Item {item} not found in job {id}")]
    ItemNotFound { id: Uuid, item: String },

    #[error("Item {item} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        item: String,
        state: String,
        target: String,
    },
}

/// Step sequencing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Step {requested} is not the current step ({current})")]
    NotCurrentStep {
        requested: OnboardingStep,
        current: OnboardingStep,
    },

    #[error("Step {step} is not complete: {reason}")]
    StepIncomplete { step: OnboardingStep, reason: String },

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition {
        from: OnboardingStep,
        to: OnboardingStep,
    },

    #[error("Onboarding already reached its terminal step")]
    Terminal,
}

/// Result type alias for the onboarding flow.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_passes_without_failures() {
        assert!(ValidationErrors::check(Vec::new()).is_ok());
    }

    #[test]
    fn check_reports_every_failure() {
        let errors = ValidationErrors::check(vec![
            ValidationError::new("name", "Name is required"),
            ValidationError::new("email", "Please enter a valid email address"),
        ])
        .unwrap_err();
        assert!(errors.has_field("name"));
        assert!(errors.has_field("email"));
        assert_eq!(
            errors.to_string(),
            "name: Name is required; email: Please enter a valid email address"
        );

        let err: Error = errors.into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
