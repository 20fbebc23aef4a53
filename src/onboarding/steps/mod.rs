//! Step handlers. Each owns its form and any background work it started.

pub mod integration;
pub mod organization;
pub mod registration;

use async_trait::async_trait;

use super::model::StepPayload;
use super::state::OnboardingStep;
use crate::error::ValidationErrors;

pub use integration::{IntegrationStatus, IntegrationStep, IntegrationView};
pub use organization::{LOOKUP_FALLBACK_MESSAGE, OrganizationForm, OrganizationStep, OrganizationView};
pub use registration::{RegistrationStep, RegistrationView};

/// What the orchestrator needs from a step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn step(&self) -> OnboardingStep;

    /// The step's validated output, or every reason it is not ready yet.
    async fn completion(&self) -> Result<StepPayload, ValidationErrors>;

    /// Called once the payload has been recorded and the wizard moved on.
    async fn fold(&self) {}
}
