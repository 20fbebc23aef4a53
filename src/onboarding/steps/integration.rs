//! Chatbot integration: hand out the embed snippet and wait for it to go live.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::StepHandler;
use crate::error::{ValidationError, ValidationErrors};
use crate::onboarding::model::{IntegrationData, StepPayload};
use crate::onboarding::state::OnboardingStep;
use crate::timer::{self, TimerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    NotStarted,
    Integrating,
    Integrated,
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Integrating => "integrating",
            Self::Integrated => "integrated",
        };
        write!(f, "{s}")
    }
}

struct IntegrationState {
    status: IntegrationStatus,
    integrated_at: Option<DateTime<Utc>>,
    timer: Option<TimerHandle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationView {
    pub status: IntegrationStatus,
    pub embed_snippet: String,
    pub integrated_at: Option<DateTime<Utc>>,
}

pub struct IntegrationStep {
    state: Arc<RwLock<IntegrationState>>,
    delay: Duration,
    embed_script_url: String,
}

impl IntegrationStep {
    pub fn new(delay: Duration, embed_script_url: impl Into<String>) -> Self {
        Self {
            state: Arc::new(RwLock::new(IntegrationState {
                status: IntegrationStatus::NotStarted,
                integrated_at: None,
                timer: None,
            })),
            delay,
            embed_script_url: embed_script_url.into(),
        }
    }

    pub fn embed_snippet(&self) -> String {
        format!(r#"<script src="{}"></script>"#, self.embed_script_url)
    }

    /// Begin integrating. Returns false if already integrating or done.
    pub async fn integrate(&self) -> bool {
        let mut state = self.state.write().await;
        if state.status != IntegrationStatus::NotStarted {
            tracing::debug!(status = %state.status, "Integrate ignored");
            return false;
        }
        state.status = IntegrationStatus::Integrating;

        let shared = Arc::clone(&self.state);
        state.timer = Some(timer::schedule(self.delay, async move {
            let mut state = shared.write().await;
            state.status = IntegrationStatus::Integrated;
            state.integrated_at = Some(Utc::now());
            state.timer = None;
            tracing::info!("Chatbot integrated");
        }));
        tracing::info!(delay_ms = self.delay.as_millis() as u64, "Chatbot integration started");
        true
    }

    pub async fn status(&self) -> IntegrationStatus {
        self.state.read().await.status
    }

    pub async fn view(&self) -> IntegrationView {
        let state = self.state.read().await;
        IntegrationView {
            status: state.status,
            embed_snippet: self.embed_snippet(),
            integrated_at: state.integrated_at,
        }
    }

    pub async fn shutdown(&self) {
        if let Some(timer) = self.state.write().await.timer.take() {
            timer.cancel();
        }
    }
}

#[async_trait]
impl StepHandler for IntegrationStep {
    fn step(&self) -> OnboardingStep {
        OnboardingStep::ChatbotIntegration
    }

    async fn completion(&self) -> Result<StepPayload, ValidationErrors> {
        let state = self.state.read().await;
        match (state.status, state.integrated_at) {
            (IntegrationStatus::Integrated, Some(integrated_at)) => {
                Ok(StepPayload::ChatbotIntegration(IntegrationData {
                    embed_snippet: self.embed_snippet(),
                    integrated_at,
                }))
            }
            (status, _) => Err(ValidationErrors(vec![ValidationError::new(
                "integration",
                format!("Chatbot is not integrated yet ({status})"),
            )])),
        }
    }
}
