//! Configuration types.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::ConfigError;

/// Pages scraped when `ONBOARD_SCRAPE_PAGES` is not set.
pub const DEFAULT_SCRAPE_PAGES: &[&str] =
    &["Home", "About Us", "Products", "Services", "Blog", "Contact"];

/// Onboarding wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Quiet period before a website metadata lookup fires.
    pub lookup_debounce: Duration,
    /// Verification code window; resend unlocks when it runs out.
    pub code_window_secs: u32,
    /// Countdown tick period.
    pub countdown_tick: Duration,
    /// Per-position scrape delay. Page `i` completes at `(i + 1) * delay`.
    pub scrape_delay: Duration,
    /// Pages scraped by the organization step.
    pub scrape_pages: Vec<String>,
    /// Simulated time for the chatbot integration to go live.
    pub integration_delay: Duration,
    /// Metadata endpoint. `None` uses the simulated provider.
    pub meta_endpoint: Option<String>,
    /// Port for the status API.
    pub http_port: u16,
    /// Script URL embedded in the chatbot snippet.
    pub embed_script_url: String,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            lookup_debounce: Duration::from_millis(500),
            code_window_secs: 60,
            countdown_tick: Duration::from_secs(1),
            scrape_delay: Duration::from_millis(2000),
            scrape_pages: DEFAULT_SCRAPE_PAGES.iter().map(|s| s.to_string()).collect(),
            integration_delay: Duration::from_millis(2000),
            meta_endpoint: None,
            http_port: 8080,
            embed_script_url: "https://example.com/chatbot.js".to_string(),
        }
    }
}

impl WizardConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let lookup_debounce = env_parse::<u64>("ONBOARD_LOOKUP_DEBOUNCE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.lookup_debounce);

        let code_window_secs =
            env_parse("ONBOARD_CODE_WINDOW_SECS").unwrap_or(defaults.code_window_secs);

        let scrape_delay = env_parse::<u64>("ONBOARD_SCRAPE_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.scrape_delay);

        let scrape_pages: Vec<String> = std::env::var("ONBOARD_SCRAPE_PAGES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let scrape_pages = if scrape_pages.is_empty() {
            defaults.scrape_pages
        } else {
            scrape_pages
        };

        let integration_delay = env_parse::<u64>("ONBOARD_INTEGRATION_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.integration_delay);

        let meta_endpoint = std::env::var("ONBOARD_META_ENDPOINT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let http_port = env_parse("ONBOARD_HTTP_PORT").unwrap_or(defaults.http_port);

        let embed_script_url =
            std::env::var("ONBOARD_EMBED_SCRIPT_URL").unwrap_or(defaults.embed_script_url);

        Self {
            lookup_debounce,
            code_window_secs,
            countdown_tick: defaults.countdown_tick,
            scrape_delay,
            scrape_pages,
            integration_delay,
            meta_endpoint,
            http_port,
            embed_script_url,
        }
    }

    /// Reject values that would make a timer fire in a tight loop or never.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_window_secs == 0 {
            return Err(invalid("code_window_secs", "must be at least 1 second"));
        }
        if self.countdown_tick.is_zero() {
            return Err(invalid("countdown_tick", "must be non-zero"));
        }
        if self.lookup_debounce.is_zero() {
            return Err(invalid("lookup_debounce", "must be non-zero"));
        }
        if self.scrape_pages.is_empty() {
            return Err(invalid("scrape_pages", "at least one page is required"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.scrape_pages.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(invalid("scrape_pages", &format!("page {dup} is listed more than once")));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Parse an env var, warning (and returning `None`) on garbage.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
            None
        }
    }
}
