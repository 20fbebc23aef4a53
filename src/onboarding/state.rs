//! Onboarding state machine. Tracks which step the user is in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregator::StepDataAggregator;
use super::model::StepPayload;
use crate::error::WorkflowError;

/// The steps of the onboarding wizard.
///
/// Progresses linearly and forward only: UserRegistration →
/// OrganizationSetup → ChatbotIntegration → Success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    UserRegistration,
    OrganizationSetup,
    ChatbotIntegration,
    Success,
}

impl OnboardingStep {
    /// All steps in order.
    pub const ALL: [OnboardingStep; 4] = [
        Self::UserRegistration,
        Self::OrganizationSetup,
        Self::ChatbotIntegration,
        Self::Success,
    ];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingStep) -> bool {
        use OnboardingStep::*;
        matches!(
            (self, target),
            (UserRegistration, OrganizationSetup)
                | (OrganizationSetup, ChatbotIntegration)
                | (ChatbotIntegration, Success)
        )
    }

    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<OnboardingStep> {
        use OnboardingStep::*;
        match self {
            UserRegistration => Some(OrganizationSetup),
            OrganizationSetup => Some(ChatbotIntegration),
            ChatbotIntegration => Some(Success),
            Success => None,
        }
    }

    /// Zero-based position in the wizard.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Heading shown in the stepper.
    pub fn title(&self) -> &'static str {
        match self {
            Self::UserRegistration => "User Registration",
            Self::OrganizationSetup => "Setup Organisation",
            Self::ChatbotIntegration => "Chatbot Integration",
            Self::Success => "Success",
        }
    }
}

impl Default for OnboardingStep {
    fn default() -> Self {
        Self::UserRegistration
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UserRegistration => "user_registration",
            Self::OrganizationSetup => "organization_setup",
            Self::ChatbotIntegration => "chatbot_integration",
            Self::Success => "success",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OnboardingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.to_string() == s)
            .ok_or_else(|| format!("unknown onboarding step: {s}"))
    }
}

/// How a step looks from the stepper's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepProgress {
    Completed,
    InProgress,
    Pending,
}

/// The whole wizard: where the user is and what each finished step produced.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    /// Current step.
    pub current_step: OnboardingStep,
    /// Validated output of every step left behind.
    pub step_data: StepDataAggregator,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            current_step: OnboardingStep::default(),
            step_data: StepDataAggregator::default(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

impl WorkflowState {
    /// Record `from`'s payload and move to the next step.
    ///
    /// `from` must be the current step and `payload` must belong to it; the
    /// state is untouched otherwise.
    pub fn advance(
        &mut self,
        from: OnboardingStep,
        payload: StepPayload,
    ) -> Result<OnboardingStep, WorkflowError> {
        if from != self.current_step {
            return Err(WorkflowError::NotCurrentStep {
                requested: from,
                current: self.current_step,
            });
        }
        let next = self.current_step.next().ok_or(WorkflowError::Terminal)?;
        if !self.current_step.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition { from, to: next });
        }
        if payload.step() != from {
            return Err(WorkflowError::StepIncomplete {
                step: from,
                reason: format!("received a {} payload", payload.step()),
            });
        }

        self.step_data.record(from, payload);
        self.current_step = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(next)
    }

    pub fn progress_of(&self, step: OnboardingStep) -> StepProgress {
        use std::cmp::Ordering;
        match step.index().cmp(&self.current_step.index()) {
            Ordering::Less => StepProgress::Completed,
            Ordering::Equal if step.is_terminal() => StepProgress::Completed,
            Ordering::Equal => StepProgress::InProgress,
            Ordering::Greater => StepProgress::Pending,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_step.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::IntegrationData;

    fn payload() -> StepPayload {
        StepPayload::ChatbotIntegration(IntegrationData {
            embed_snippet: "<script></script>".into(),
            integrated_at: Utc::now(),
        })
    }

    #[test]
    fn valid_transitions() {
        use OnboardingStep::*;
        let transitions = [
            (UserRegistration, OrganizationSetup),
            (OrganizationSetup, ChatbotIntegration),
            (ChatbotIntegration, Success),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use OnboardingStep::*;
        // Skip steps
        assert!(!UserRegistration.can_transition_to(ChatbotIntegration));
        assert!(!UserRegistration.can_transition_to(Success));
        // Go backward
        assert!(!OrganizationSetup.can_transition_to(UserRegistration));
        assert!(!ChatbotIntegration.can_transition_to(OrganizationSetup));
        assert!(!Success.can_transition_to(ChatbotIntegration));
        // Self-transition
        assert!(!OrganizationSetup.can_transition_to(OrganizationSetup));
    }

    #[test]
    fn no_backward_transition_exists() {
        for from in OnboardingStep::ALL {
            for to in OnboardingStep::ALL {
                if to.index() <= from.index() {
                    assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
                }
            }
        }
    }

    #[test]
    fn next_walks_all_steps() {
        use OnboardingStep::*;
        let mut current = UserRegistration;
        for expected in [OrganizationSetup, ChatbotIntegration, Success] {
            let next = current.next().unwrap();
            assert_eq!(next, expected);
            current = next;
        }
        assert!(current.next().is_none());
        assert!(current.is_terminal());
    }

    #[test]
    fn display_matches_serde() {
        for step in OnboardingStep::ALL {
            let display = format!("{step}");
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{display}\""), json, "Display and serde should match for {step:?}");
            assert_eq!(display.parse::<OnboardingStep>().unwrap(), step);
        }
    }

    #[test]
    fn advance_from_non_current_step_leaves_state_unchanged() {
        let mut state = WorkflowState::default();
        let err = state
            .advance(OnboardingStep::ChatbotIntegration, payload())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotCurrentStep { .. }));
        assert_eq!(state.current_step, OnboardingStep::UserRegistration);
        assert!(state.step_data.is_empty());
    }

    #[test]
    fn advance_from_terminal_is_rejected() {
        let mut state = WorkflowState {
            current_step: OnboardingStep::Success,
            ..WorkflowState::default()
        };
        assert_eq!(
            state.advance(OnboardingStep::Success, payload()).unwrap_err(),
            WorkflowError::Terminal
        );
        assert!(state.step_data.is_empty());
    }

    #[test]
    fn advance_with_other_steps_payload_is_rejected() {
        let mut state = WorkflowState::default();
        let err = state
            .advance(OnboardingStep::UserRegistration, payload())
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::StepIncomplete {
                step: OnboardingStep::UserRegistration,
                reason: "received a chatbot_integration payload".into(),
            }
        );
        assert_eq!(state.current_step, OnboardingStep::UserRegistration);
        assert!(state.step_data.is_empty());
    }

    #[test]
    fn advance_records_matching_payload() {
        let mut state = WorkflowState {
            current_step: OnboardingStep::ChatbotIntegration,
            ..WorkflowState::default()
        };
        let to = state
            .advance(OnboardingStep::ChatbotIntegration, payload())
            .unwrap();
        assert_eq!(to, OnboardingStep::Success);
        assert!(state.is_complete());
        assert!(state.completed_at.is_some());
        assert!(state.step_data.get(OnboardingStep::ChatbotIntegration).is_some());
    }

    #[test]
    fn progress_follows_current_step() {
        let state = WorkflowState {
            current_step: OnboardingStep::OrganizationSetup,
            ..WorkflowState::default()
        };
        assert_eq!(state.progress_of(OnboardingStep::UserRegistration), StepProgress::Completed);
        assert_eq!(state.progress_of(OnboardingStep::OrganizationSetup), StepProgress::InProgress);
        assert_eq!(state.progress_of(OnboardingStep::Success), StepProgress::Pending);
    }

    #[test]
    fn default_state() {
        let state = WorkflowState::default();
        assert_eq!(state.current_step, OnboardingStep::UserRegistration);
        assert!(state.step_data.is_empty());
        assert!(!state.is_complete());
        assert!(state.completed_at.is_none());
    }
}
