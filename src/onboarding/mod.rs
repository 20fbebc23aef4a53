//! Onboarding wizard: user registration, organization setup, and chatbot
//! integration, in that order.
//!
//! `OnboardingManager` owns the `WorkflowState` and one handler per step.
//! A step only mutates its own slice; when the user leaves it, its payload
//! is recorded in the `StepDataAggregator` and the wizard moves forward.

pub mod aggregator;
pub mod manager;
pub mod model;
pub mod routes;
pub mod state;
pub mod steps;
pub mod validation;

pub use aggregator::StepDataAggregator;
pub use manager::{AdvanceOutcome, OnboardingDeps, OnboardingEvent, OnboardingManager, OnboardingStatus};
pub use model::{IntegrationData, OrganizationData, RegistrationData, StepPayload, TrackedField};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{OnboardingStep, StepProgress, WorkflowState};
