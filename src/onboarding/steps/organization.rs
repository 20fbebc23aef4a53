//! Organization setup: company form, website metadata auto-fill, and the
//! background page scrape.
//!
//! Lock order: the lookup task holds its own state lock while the sink
//! writes the form, so nothing here may call into [`DebouncedLookup`] while
//! holding the form lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StepHandler;
use crate::config::WizardConfig;
use crate::error::{LookupError, ValidationErrors};
use crate::jobs::{JobTracker, SimulatedPageScraper, page_specs};
use crate::lookup::model::LookupOutcome;
use crate::lookup::{DebouncedLookup, DebouncedLookupResult, LookupSink, LookupStatus, MetadataProvider};
use crate::onboarding::model::{OrganizationData, ScrapedPage, StepPayload, TrackedField};
use crate::onboarding::state::OnboardingStep;
use crate::onboarding::validation::{require, validate_website_url};

/// Shown when the metadata lookup fails; the user fills the form by hand.
pub const LOOKUP_FALLBACK_MESSAGE: &str =
    "Could not fetch website metadata. Please enter description manually.";

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrganizationForm {
    pub company_name: TrackedField,
    pub website_url: TrackedField,
    pub description: TrackedField,
    pub lookup_error: Option<String>,
}

impl OrganizationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors: Vec<_> = [
            require("company_name", "Company name", self.company_name.value()),
            require("description", "Description", self.description.value()),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();
        if let Err(e) = validate_website_url(self.website_url.value()) {
            errors.push(e);
        }
        ValidationErrors::check(errors)
    }
}

/// Applies lookup results to the form.
struct FormAutofill {
    form: Arc<RwLock<OrganizationForm>>,
}

#[async_trait]
impl LookupSink for FormAutofill {
    async fn apply(&self, result: &DebouncedLookupResult) {
        let mut form = self.form.write().await;
        match &result.outcome {
            LookupOutcome::Success(meta) => {
                form.lookup_error = None;
                let name = meta
                    .company_name()
                    .is_some_and(|name| form.company_name.autofill(name));
                let description = meta
                    .description_text()
                    .is_some_and(|text| form.description.autofill(text));
                tracing::debug!(
                    query = %result.query,
                    company_name = name,
                    description,
                    "Organization form auto-filled"
                );
            }
            LookupOutcome::Failure(_) => {
                form.lookup_error = Some(LOOKUP_FALLBACK_MESSAGE.to_string());
            }
        }
    }
}

/// Read-only view for hosts.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationView {
    #[serde(flatten)]
    pub form: OrganizationForm,
    pub lookup_status: LookupStatus,
    pub scraping: bool,
    pub fully_scraped: bool,
    pub pages: Vec<ScrapedPage>,
}

pub struct OrganizationStep {
    form: Arc<RwLock<OrganizationForm>>,
    lookup: DebouncedLookup,
    jobs: JobTracker<SimulatedPageScraper>,
    scrape_pages: Vec<String>,
    scrape_delay: Duration,
}

impl OrganizationStep {
    pub fn new(provider: Arc<dyn MetadataProvider>, config: &WizardConfig) -> Self {
        let form = Arc::new(RwLock::new(OrganizationForm::default()));
        let sink = Arc::new(FormAutofill {
            form: Arc::clone(&form),
        });
        Self {
            lookup: DebouncedLookup::new(provider, sink, config.lookup_debounce),
            form,
            jobs: JobTracker::new(),
            scrape_pages: config.scrape_pages.clone(),
            scrape_delay: config.scrape_delay,
        }
    }

    pub async fn set_company_name(&self, value: &str) {
        self.form.write().await.company_name.edit(value.trim());
    }

    pub async fn set_description(&self, value: &str) {
        self.form.write().await.description.edit(value.trim());
    }

    /// Record the URL and (re)arm the metadata lookup for it.
    pub async fn set_website_url(&self, value: &str) {
        {
            let mut form = self.form.write().await;
            form.website_url.edit(value.trim());
            form.lookup_error = None;
        }

        match self.lookup.request(value).await {
            Ok(()) => {}
            Err(LookupError::MalformedInput(reason)) => {
                tracing::debug!(url = value, "No lookup for incomplete URL: {}", reason);
            }
            Err(e) => tracing::warn!(url = value, "Lookup request rejected: {}", e),
        }
    }

    pub async fn form(&self) -> OrganizationForm {
        self.form.read().await.clone()
    }

    pub fn lookup(&self) -> &DebouncedLookup {
        &self.lookup
    }

    /// Start scraping the configured pages. Requires a complete form and no
    /// scrape already in progress.
    pub async fn start_scraping(&self) -> crate::Result<Uuid> {
        let company_name = {
            let form = self.form.read().await;
            form.validate()?;
            form.company_name.value().to_string()
        };

        let worker = Arc::new(SimulatedPageScraper::new(
            company_name,
            self.scrape_pages.clone(),
        ));
        let specs = page_specs(&self.scrape_pages, self.scrape_delay);
        Ok(self.jobs.start(worker, specs).await?)
    }

    /// Whatever the page holds right now, pending or not.
    pub async fn select_page(&self, name: &str) -> Option<ScrapedPage> {
        self.jobs.select(name).await.map(|item| ScrapedPage::from(&item))
    }

    pub fn jobs(&self) -> &JobTracker<SimulatedPageScraper> {
        &self.jobs
    }

    async fn pages(&self) -> (Vec<ScrapedPage>, bool) {
        match self.jobs.snapshot().await {
            Some(job) => (
                job.items.iter().map(ScrapedPage::from).collect(),
                job.is_finished(),
            ),
            None => (Vec::new(), false),
        }
    }

    pub async fn view(&self) -> OrganizationView {
        let form = self.form().await;
        let lookup_status = self.lookup.status().await;
        let scraping = self.jobs.is_running().await;
        let (pages, fully_scraped) = self.pages().await;
        OrganizationView {
            form,
            lookup_status,
            scraping,
            fully_scraped,
            pages,
        }
    }

    pub async fn shutdown(&self) {
        self.lookup.cancel().await;
        self.jobs.cancel().await;
    }
}

#[async_trait]
impl StepHandler for OrganizationStep {
    fn step(&self) -> OnboardingStep {
        OnboardingStep::OrganizationSetup
    }

    async fn completion(&self) -> Result<StepPayload, ValidationErrors> {
        let form = self.form().await;
        form.validate()?;
        let (pages, fully_scraped) = self.pages().await;
        if !fully_scraped && !pages.is_empty() {
            tracing::info!("Leaving organization setup; scraping will continue in background");
        }
        Ok(StepPayload::OrganizationSetup(OrganizationData {
            company_name: form.company_name.value().to_string(),
            website_url: form.website_url.value().to_string(),
            description: form.description.value().to_string(),
            pages,
            fully_scraped,
        }))
    }

    /// The scrape keeps running after the step is left; only the lookup stops.
    async fn fold(&self) {
        self.lookup.cancel().await;
    }
}
