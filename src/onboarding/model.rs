//! Step payloads and form field models.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::state::OnboardingStep;
use crate::jobs::{DataChunk, ItemStatus, JobItem};

/// Output of the registration step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationData {
    pub name: String,
    pub email: String,
    /// Never serialized.
    #[serde(skip)]
    pub password: Option<SecretString>,
    pub verified_at: DateTime<Utc>,
}

/// A scraped page as seen by the organization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub name: String,
    pub status: ItemStatus,
    pub chunks: Vec<DataChunk>,
}

impl From<&JobItem<Vec<DataChunk>>> for ScrapedPage {
    fn from(item: &JobItem<Vec<DataChunk>>) -> Self {
        Self {
            name: item.id.clone(),
            status: item.status,
            chunks: item.result.clone().unwrap_or_default(),
        }
    }
}

/// Output of the organization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationData {
    pub company_name: String,
    pub website_url: String,
    pub description: String,
    /// Scrape progress at the moment the step was left.
    pub pages: Vec<ScrapedPage>,
    pub fully_scraped: bool,
}

/// Output of the chatbot integration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationData {
    pub embed_snippet: String,
    pub integrated_at: DateTime<Utc>,
}

/// A validated step output, keyed by the step that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum StepPayload {
    UserRegistration(RegistrationData),
    OrganizationSetup(OrganizationData),
    ChatbotIntegration(IntegrationData),
}

impl StepPayload {
    pub fn step(&self) -> OnboardingStep {
        match self {
            Self::UserRegistration(_) => OnboardingStep::UserRegistration,
            Self::OrganizationSetup(_) => OnboardingStep::OrganizationSetup,
            Self::ChatbotIntegration(_) => OnboardingStep::ChatbotIntegration,
        }
    }
}

/// A form field that external data may fill only until the user touches it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackedField {
    value: String,
    user_edited: bool,
}

impl TrackedField {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_user_edited(&self) -> bool {
        self.user_edited
    }

    /// A user edit. Permanently excludes the field from auto-fill.
    pub fn edit(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.user_edited = true;
    }

    /// Apply an externally derived value if the field is still untouched and
    /// at its default. Returns whether it was applied.
    pub fn autofill(&mut self, value: impl Into<String>) -> bool {
        if self.user_edited || !self.value.is_empty() {
            return false;
        }
        self.value = value.into();
        true
    }
}
