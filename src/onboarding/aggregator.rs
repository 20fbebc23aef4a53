//! Step data aggregator: the combined record of every finished step.

use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{IntegrationData, OrganizationData, RegistrationData, StepPayload};
use super::state::OnboardingStep;

/// Payloads keyed by the step that produced them.
///
/// Stores exactly what it is given; validation is each step's business.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StepDataAggregator {
    records: BTreeMap<OnboardingStep, StepPayload>,
}

impl StepDataAggregator {
    /// Store `payload` for `step`, replacing any earlier record for it.
    pub fn record(&mut self, step: OnboardingStep, payload: StepPayload) {
        if self.records.insert(step, payload).is_some() {
            tracing::debug!(step = %step, "Step data re-recorded");
        }
    }

    pub fn get(&self, step: OnboardingStep) -> Option<&StepPayload> {
        self.records.get(&step)
    }

    pub fn contains(&self, step: OnboardingStep) -> bool {
        self.records.contains_key(&step)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn registration(&self) -> Option<&RegistrationData> {
        match self.get(OnboardingStep::UserRegistration) {
            Some(StepPayload::UserRegistration(data)) => Some(data),
            _ => None,
        }
    }

    pub fn organization(&self) -> Option<&OrganizationData> {
        match self.get(OnboardingStep::OrganizationSetup) {
            Some(StepPayload::OrganizationSetup(data)) => Some(data),
            _ => None,
        }
    }

    pub fn integration(&self) -> Option<&IntegrationData> {
        match self.get(OnboardingStep::ChatbotIntegration) {
            Some(StepPayload::ChatbotIntegration(data)) => Some(data),
            _ => None,
        }
    }
}
