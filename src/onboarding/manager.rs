//! OnboardingManager: owns the workflow state and the step handlers, and
//! mediates every step transition.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

use super::aggregator::StepDataAggregator;
use super::state::{OnboardingStep, StepProgress, WorkflowState};
use super::steps::{
    IntegrationStep, IntegrationView, OrganizationStep, OrganizationView, RegistrationStep,
    RegistrationView, StepHandler,
};
use crate::config::WizardConfig;
use crate::error::ValidationErrors;
use crate::lookup::MetadataProvider;
use crate::verification::CodeIssuer;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// External collaborators the steps talk to.
pub struct OnboardingDeps {
    pub issuer: Arc<dyn CodeIssuer>,
    pub metadata: Arc<dyn MetadataProvider>,
}

/// What happened to an `advance` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced {
        from: OnboardingStep,
        to: OnboardingStep,
    },
    /// `requested` was not the current step; nothing changed.
    Ignored {
        requested: OnboardingStep,
        current: OnboardingStep,
    },
    /// The step's completion predicate failed.
    NotReady { errors: ValidationErrors },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnboardingEvent {
    StepAdvanced {
        from: OnboardingStep,
        to: OnboardingStep,
    },
    Completed,
}

/// One entry of the stepper.
#[derive(Debug, Clone, Serialize)]
pub struct StepEntry {
    pub step: OnboardingStep,
    pub title: &'static str,
    pub progress: StepProgress,
}

/// Onboarding status returned by the REST endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub current_step: OnboardingStep,
    pub steps: Vec<StepEntry>,
    pub registration: RegistrationView,
    pub organization: OrganizationView,
    pub integration: IntegrationView,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Coordinates the wizard: forward-only transitions, payload recording, and
/// progress snapshots.
pub struct OnboardingManager {
    state: Arc<RwLock<WorkflowState>>,
    registration: RegistrationStep,
    organization: OrganizationStep,
    integration: IntegrationStep,
    tx: broadcast::Sender<OnboardingEvent>,
}

impl OnboardingManager {
    pub fn new(config: &WizardConfig, deps: OnboardingDeps) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(WorkflowState::default())),
            registration: RegistrationStep::new(
                deps.issuer,
                config.code_window_secs,
                config.countdown_tick,
            ),
            organization: OrganizationStep::new(deps.metadata, config),
            integration: IntegrationStep::new(
                config.integration_delay,
                config.embed_script_url.clone(),
            ),
            tx,
        }
    }

    pub fn registration(&self) -> &RegistrationStep {
        &self.registration
    }

    pub fn organization(&self) -> &OrganizationStep {
        &self.organization
    }

    pub fn integration(&self) -> &IntegrationStep {
        &self.integration
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OnboardingEvent> {
        self.tx.subscribe()
    }

    fn handler(&self, step: OnboardingStep) -> Option<&dyn StepHandler> {
        match step {
            OnboardingStep::UserRegistration => Some(&self.registration as &dyn StepHandler),
            OnboardingStep::OrganizationSetup => Some(&self.organization),
            OnboardingStep::ChatbotIntegration => Some(&self.integration),
            OnboardingStep::Success => None,
        }
    }

    pub async fn current_step(&self) -> OnboardingStep {
        self.state.read().await.current_step
    }

    pub async fn is_complete(&self) -> bool {
        self.state.read().await.is_complete()
    }

    /// Leave `from` and move to the next step.
    ///
    /// Only the current step may advance. Its payload is taken from its
    /// completion handler and recorded as-is.
    pub async fn advance(&self, from: OnboardingStep) -> AdvanceOutcome {
        let mut state = self.state.write().await;
        let current = state.current_step;

        let handler = match self.handler(from) {
            Some(handler) if handler.step() == current => handler,
            _ => {
                tracing::debug!(requested = %from, current = %current, "Advance ignored");
                return AdvanceOutcome::Ignored {
                    requested: from,
                    current,
                };
            }
        };

        let payload = match handler.completion().await {
            Ok(payload) => payload,
            Err(errors) => {
                tracing::debug!(step = %from, "Step not ready: {}", errors);
                return AdvanceOutcome::NotReady { errors };
            }
        };

        let to = match state.advance(from, payload) {
            Ok(to) => to,
            Err(e) => {
                tracing::warn!(step = %from, "Failed to advance onboarding step: {}", e);
                return AdvanceOutcome::Ignored {
                    requested: from,
                    current,
                };
            }
        };
        drop(state);

        handler.fold().await;
        tracing::info!(from = %from, to = %to, "Onboarding step advanced");

        // Ok if no receivers are listening
        let _ = self.tx.send(OnboardingEvent::StepAdvanced { from, to });
        if to.is_terminal() {
            tracing::info!("Onboarding complete");
            let _ = self.tx.send(OnboardingEvent::Completed);
        }

        AdvanceOutcome::Advanced { from, to }
    }

    /// Advance whatever step is current.
    pub async fn advance_current(&self) -> AdvanceOutcome {
        let current = self.current_step().await;
        self.advance(current).await
    }

    /// The combined record of every finished step.
    pub async fn record(&self) -> StepDataAggregator {
        self.state.read().await.step_data.clone()
    }

    /// Closing message, once the wizard has reached its terminal step.
    pub async fn summary(&self) -> Option<String> {
        let state = self.state.read().await;
        if !state.is_complete() {
            return None;
        }
        let name = state.step_data.registration().map(|r| r.name.as_str())?;
        let company = state
            .step_data
            .organization()
            .map(|o| o.company_name.as_str())?;
        Some(format!(
            "Congratulations, {name}! Your account for {company} has been successfully \
             created and your chatbot has been integrated."
        ))
    }

    pub async fn status(&self) -> OnboardingStatus {
        let (current_step, steps, completed) = {
            let state = self.state.read().await;
            let steps: Vec<StepEntry> = OnboardingStep::ALL
                .into_iter()
                .map(|step| StepEntry {
                    step,
                    title: step.title(),
                    progress: state.progress_of(step),
                })
                .collect();
            (state.current_step, steps, state.is_complete())
        };

        OnboardingStatus {
            current_step,
            steps,
            registration: self.registration.view().await,
            organization: self.organization.view().await,
            integration: self.integration.view().await,
            completed,
            summary: self.summary().await,
        }
    }

    /// Stop every timer the steps still own, including a background scrape.
    pub async fn shutdown(&self) {
        self.registration.shutdown().await;
        self.organization.shutdown().await;
        self.integration.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::lookup::SimulatedMetadataProvider;
    use crate::onboarding::model::StepPayload;
    use crate::verification::InMemoryCodeIssuer;

    fn manager() -> (OnboardingManager, Arc<InMemoryCodeIssuer>) {
        let issuer = Arc::new(InMemoryCodeIssuer::new());
        let deps = OnboardingDeps {
            issuer: Arc::clone(&issuer) as Arc<dyn CodeIssuer>,
            metadata: Arc::new(SimulatedMetadataProvider::new()),
        };
        (OnboardingManager::new(&WizardConfig::default(), deps), issuer)
    }

    async fn register(manager: &OnboardingManager, issuer: &InMemoryCodeIssuer) {
        let reg = manager.registration();
        reg.set_name("Ada").await;
        reg.set_email("ada@example.com").await;
        reg.set_password("analytical").await;
        reg.send_code().await.unwrap();
        let code = issuer.peek("ada@example.com").await.unwrap();
        reg.submit_code(&code).await.unwrap();
    }

    #[test]
    fn every_step_handler_reports_its_own_step() {
        let (manager, _) = manager();
        for step in OnboardingStep::ALL {
            match manager.handler(step) {
                Some(handler) => assert_eq!(handler.step(), step),
                None => assert!(step.is_terminal()),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn advance_from_non_current_step_is_ignored() {
        let (manager, _) = manager();
        let outcome = manager.advance(OnboardingStep::OrganizationSetup).await;
        assert_eq!(
            outcome,
            AdvanceOutcome::Ignored {
                requested: OnboardingStep::OrganizationSetup,
                current: OnboardingStep::UserRegistration,
            }
        );
        assert_eq!(manager.current_step().await, OnboardingStep::UserRegistration);
        assert!(manager.record().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unverified_registration_is_not_ready() {
        let (manager, _) = manager();
        let errors = match manager.advance(OnboardingStep::UserRegistration).await {
            AdvanceOutcome::NotReady { errors } => errors,
            other => panic!("expected NotReady, got {other:?}"),
        };
        assert!(errors.has_field("verification_code"));
        assert_eq!(manager.current_step().await, OnboardingStep::UserRegistration);
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_reaches_success() {
        let (manager, issuer) = manager();
        let mut events = manager.subscribe();

        register(&manager, &issuer).await;
        assert_eq!(
            manager.advance(OnboardingStep::UserRegistration).await,
            AdvanceOutcome::Advanced {
                from: OnboardingStep::UserRegistration,
                to: OnboardingStep::OrganizationSetup,
            }
        );

        let org = manager.organization();
        org.set_company_name("Acme").await;
        org.set_website_url("https://acme.io").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        org.start_scraping().await.unwrap();
        assert!(matches!(
            manager.advance_current().await,
            AdvanceOutcome::Advanced { to: OnboardingStep::ChatbotIntegration, .. }
        ));

        assert!(manager.integration().integrate().await);
        assert!(matches!(
            manager.advance_current().await,
            AdvanceOutcome::NotReady { .. }
        ));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(matches!(
            manager.advance_current().await,
            AdvanceOutcome::Advanced { to: OnboardingStep::Success, .. }
        ));

        assert!(manager.is_complete().await);
        assert_eq!(
            manager.summary().await.unwrap(),
            "Congratulations, Ada! Your account for Acme has been successfully created \
             and your chatbot has been integrated."
        );
        assert!(matches!(
            manager.advance(OnboardingStep::Success).await,
            AdvanceOutcome::Ignored { .. }
        ));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.last(), Some(&OnboardingEvent::Completed));

        let status = manager.status().await;
        assert!(status.completed);
        assert!(
            status
                .steps
                .iter()
                .all(|entry| entry.progress == StepProgress::Completed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recorded_payloads_match_step_output() {
        let (manager, issuer) = manager();
        register(&manager, &issuer).await;
        manager.advance_current().await;

        let org = manager.organization();
        org.set_company_name("Acme").await;
        org.set_website_url("https://acme.io").await;
        org.set_description("We make everything").await;
        let StepPayload::OrganizationSetup(expected) = org.completion().await.unwrap() else {
            panic!("wrong payload variant");
        };
        manager.advance_current().await;

        let record = manager.record().await;
        assert_eq!(record.organization(), Some(&expected));
        let registration = record.registration().unwrap();
        assert_eq!(registration.name, "Ada");
        assert_eq!(registration.email, "ada@example.com");
        assert_eq!(record.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn scraping_continues_after_leaving_step() {
        let (manager, issuer) = manager();
        register(&manager, &issuer).await;
        manager.advance_current().await;

        let org = manager.organization();
        org.set_company_name("Acme").await;
        org.set_description("Widgets").await;
        org.set_website_url("https://acme.io").await;
        org.start_scraping().await.unwrap();
        manager.advance_current().await;

        let recorded = manager.record().await;
        assert!(!recorded.organization().unwrap().fully_scraped);

        tokio::time::sleep(Duration::from_secs(13)).await;
        let status = manager.status().await;
        assert!(status.organization.fully_scraped);
        assert_eq!(status.current_step, OnboardingStep::ChatbotIntegration);
    }
}
