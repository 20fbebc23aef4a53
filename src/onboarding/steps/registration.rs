//! User registration: account form plus e-mail verification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::RwLock;

use super::StepHandler;
use crate::error::{ValidationError, ValidationErrors};
use crate::onboarding::model::{RegistrationData, StepPayload};
use crate::onboarding::state::OnboardingStep;
use crate::onboarding::validation::{validate_email, validate_name, validate_password};
use crate::verification::{
    CodeIssuer, VerificationController, VerificationSession, VerificationStatus,
};

struct RegistrationForm {
    name: String,
    email: String,
    password: SecretString,
}

impl RegistrationForm {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let errors = [
            validate_name(&self.name),
            validate_email(&self.email),
            validate_password(self.password.expose_secret()),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();
        ValidationErrors::check(errors)
    }
}

/// Read-only view for hosts.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    pub name: String,
    pub email: String,
    pub password_set: bool,
    /// Fields are frozen once a code has been sent, and stay frozen after
    /// verification.
    pub locked: bool,
    pub verification: VerificationSession,
}

pub struct RegistrationStep {
    form: RwLock<RegistrationForm>,
    verification: VerificationController,
}

impl RegistrationStep {
    pub fn new(issuer: Arc<dyn CodeIssuer>, window_secs: u32, tick: Duration) -> Self {
        Self {
            form: RwLock::new(RegistrationForm {
                name: String::new(),
                email: String::new(),
                password: SecretString::from(String::new()),
            }),
            verification: VerificationController::new(issuer, window_secs, tick),
        }
    }

    /// Locked from the first send onward, verification included.
    async fn is_locked(&self) -> bool {
        self.verification.snapshot().await.status != VerificationStatus::Idle
    }

    /// Returns false when the form is already locked.
    pub async fn set_name(&self, name: &str) -> bool {
        if self.is_locked().await {
            tracing::debug!("Registration form locked; name edit ignored");
            return false;
        }
        self.form.write().await.name = name.trim().to_string();
        true
    }

    pub async fn set_email(&self, email: &str) -> bool {
        if self.is_locked().await {
            tracing::debug!("Registration form locked; email edit ignored");
            return false;
        }
        self.form.write().await.email = email.trim().to_string();
        true
    }

    pub async fn set_password(&self, password: &str) -> bool {
        if self.is_locked().await {
            tracing::debug!("Registration form locked; password edit ignored");
            return false;
        }
        self.form.write().await.password = SecretString::from(password.to_string());
        true
    }

    pub async fn validate(&self) -> Result<(), ValidationErrors> {
        self.form.read().await.validate()
    }

    /// Validate every field, then issue a code to the entered address.
    pub async fn send_code(&self) -> crate::Result<()> {
        let email = {
            let form = self.form.read().await;
            form.validate()?;
            form.email.clone()
        };
        self.verification.send(&email).await?;
        Ok(())
    }

    /// Returns false while the countdown is still running.
    pub async fn resend_code(&self) -> crate::Result<bool> {
        let email = self.form.read().await.email.clone();
        Ok(self.verification.resend(&email).await?)
    }

    pub async fn submit_code(&self, code: &str) -> crate::Result<()> {
        self.verification.submit(code).await?;
        Ok(())
    }

    pub async fn is_verified(&self) -> bool {
        self.verification.is_verified().await
    }

    pub async fn view(&self) -> RegistrationView {
        let verification = self.verification.snapshot().await;
        let form = self.form.read().await;
        RegistrationView {
            name: form.name.clone(),
            email: form.email.clone(),
            password_set: !form.password.expose_secret().is_empty(),
            locked: verification.status != VerificationStatus::Idle,
            verification,
        }
    }

    pub async fn shutdown(&self) {
        self.verification.shutdown().await;
    }
}

#[async_trait]
impl StepHandler for RegistrationStep {
    fn step(&self) -> OnboardingStep {
        OnboardingStep::UserRegistration
    }

    async fn completion(&self) -> Result<StepPayload, ValidationErrors> {
        let session = self.verification.snapshot().await;
        let Some(verified_at) = session.verified_at else {
            return Err(ValidationErrors(vec![ValidationError::new(
                "verification_code",
                "Please verify your email address",
            )]));
        };

        let form = self.form.read().await;
        form.validate()?;
        Ok(StepPayload::UserRegistration(RegistrationData {
            name: form.name.clone(),
            email: form.email.clone(),
            password: Some(form.password.clone()),
            verified_at,
        }))
    }

    async fn fold(&self) {
        self.shutdown().await;
        tracing::debug!("Registration step folded; countdown stopped");
    }
}
