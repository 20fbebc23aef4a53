//! Debounced lookup task.
//!
//! `request()` (re)arms a single debounce timer. A request for a different
//! query cancels the pending timer, including a fetch already running inside
//! it, and bumps the generation so that any result that still slips through
//! is flagged stale and dropped before it reaches the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::model::{DebouncedLookupResult, LookupOutcome, LookupStatus, PageMetadata};
use super::provider::MetadataProvider;
use crate::error::LookupError;
use crate::onboarding::validation::validate_website_url;
use crate::timer::{self, TimerHandle};

/// Receives the result of the most recent lookup.
///
/// Called while the lookup state is locked, so an implementation must not
/// call back into [`DebouncedLookup::request`].
#[async_trait]
pub trait LookupSink: Send + Sync {
    async fn apply(&self, result: &DebouncedLookupResult);
}

#[derive(Debug)]
struct LookupState {
    generation: u64,
    query: Option<String>,
    pending: Option<TimerHandle>,
    status: LookupStatus,
    last: Option<DebouncedLookupResult>,
}

/// Debounces metadata lookups for one input field.
pub struct DebouncedLookup {
    provider: Arc<dyn MetadataProvider>,
    sink: Arc<dyn LookupSink>,
    debounce: Duration,
    state: Arc<Mutex<LookupState>>,
    external_calls: Arc<AtomicU64>,
}

impl DebouncedLookup {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        sink: Arc<dyn LookupSink>,
        debounce: Duration,
    ) -> Self {
        Self {
            provider,
            sink,
            debounce,
            state: Arc::new(Mutex::new(LookupState {
                generation: 0,
                query: None,
                pending: None,
                status: LookupStatus::Idle,
                last: None,
            })),
            external_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule a lookup for `query` after the quiet period.
    ///
    /// Malformed input supersedes whatever was pending but never reaches the
    /// provider. Repeating the query that is already pending is a no-op.
    pub async fn request(&self, query: &str) -> Result<(), LookupError> {
        let query = query.trim();
        let mut state = self.state.lock().await;

        let in_flight = matches!(
            state.status,
            LookupStatus::Debouncing | LookupStatus::Fetching
        );
        if in_flight && state.query.as_deref() == Some(query) {
            return Ok(());
        }

        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.generation += 1;
        state.query = Some(query.to_string());

        if let Err(e) = validate_website_url(query) {
            state.status = LookupStatus::Idle;
            tracing::debug!(query, "Lookup skipped: {}", e.message);
            return Err(LookupError::MalformedInput(e.message));
        }

        state.status = LookupStatus::Debouncing;
        let generation = state.generation;
        state.pending = Some(timer::schedule(
            self.debounce,
            Self::fire(
                Arc::clone(&self.state),
                Arc::clone(&self.provider),
                Arc::clone(&self.sink),
                Arc::clone(&self.external_calls),
                generation,
                query.to_string(),
            ),
        ));

        tracing::debug!(query, generation, "Lookup scheduled");
        Ok(())
    }

    /// Cancel any pending or in-flight lookup without scheduling a new one.
    pub async fn cancel(&self) {
        let mut state = self.state.lock().await;
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.generation += 1;
        if matches!(
            state.status,
            LookupStatus::Debouncing | LookupStatus::Fetching
        ) {
            state.status = LookupStatus::Idle;
        }
    }

    async fn fire(
        state: Arc<Mutex<LookupState>>,
        provider: Arc<dyn MetadataProvider>,
        sink: Arc<dyn LookupSink>,
        external_calls: Arc<AtomicU64>,
        generation: u64,
        query: String,
    ) {
        {
            let mut st = state.lock().await;
            if st.generation != generation {
                return;
            }
            st.status = LookupStatus::Fetching;
        }

        external_calls.fetch_add(1, Ordering::SeqCst);
        tracing::info!(provider = provider.name(), query = %query, "Fetching website metadata");

        let outcome = match provider
            .lookup(&query)
            .await
            .and_then(PageMetadata::into_usable)
        {
            Ok(meta) => LookupOutcome::Success(meta),
            Err(e) => LookupOutcome::Failure(e),
        };

        let mut st = state.lock().await;
        let result = DebouncedLookupResult {
            query,
            outcome,
            stale: st.generation != generation,
            resolved_at: Utc::now(),
        };

        if result.stale {
            tracing::debug!(query = %result.query, "Discarding stale lookup result");
            return;
        }

        st.status = match result.outcome {
            LookupOutcome::Success(_) => LookupStatus::Loaded,
            LookupOutcome::Failure(ref e) => {
                tracing::warn!(query = %result.query, "Metadata lookup failed: {}", e);
                LookupStatus::Failed
            }
        };
        st.pending = None;
        sink.apply(&result).await;
        st.last = Some(result);
    }

    pub async fn status(&self) -> LookupStatus {
        self.state.lock().await.status
    }

    /// The last result that was applied (never a stale one).
    pub async fn latest(&self) -> Option<DebouncedLookupResult> {
        self.state.lock().await.last.clone()
    }

    /// Number of calls that actually reached the provider.
    pub fn external_calls(&self) -> u64 {
        self.external_calls.load(Ordering::SeqCst)
    }
}
