//! Lookup payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// What the metadata collaborator returns for a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageMetadata {
    /// A payload is usable when it carries no error and has a non-blank
    /// title or description.
    pub fn into_usable(self) -> Result<PageMetadata, LookupError> {
        if let Some(error) = self.error {
            return Err(LookupError::InvalidResponse(error));
        }
        if non_blank(&self.title).is_none() && non_blank(&self.description).is_none() {
            return Err(LookupError::InvalidResponse(
                "response has neither title nor description".to_string(),
            ));
        }
        Ok(self)
    }

    /// Company name derived from the title: its first `|`-separated segment.
    pub fn company_name(&self) -> Option<String> {
        let title = non_blank(&self.title)?;
        let name = title.split('|').next()?.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    pub fn description_text(&self) -> Option<String> {
        non_blank(&self.description).map(|s| s.trim().to_string())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Outcome of one lookup, tagged with the query that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebouncedLookupResult {
    pub query: String,
    #[serde(flatten)]
    pub outcome: LookupOutcome,
    /// True when a newer query was issued after this one was requested.
    pub stale: bool,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOutcome {
    Success(PageMetadata),
    Failure(LookupError),
}

/// What the lookup task is doing right now, for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Idle,
    Debouncing,
    Fetching,
    Loaded,
    Failed,
}

impl std::fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Debouncing => "debouncing",
            Self::Fetching => "fetching",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_name_takes_first_title_segment() {
        let meta = PageMetadata {
            title: Some("  Acme Corp | Home | Welcome".into()),
            ..Default::default()
        };
        assert_eq!(meta.company_name().as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn payload_without_title_or_description_is_soft_failure() {
        let meta = PageMetadata {
            title: Some("   ".into()),
            description: None,
            error: None,
        };
        assert!(matches!(
            meta.into_usable(),
            Err(LookupError::InvalidResponse(_))
        ));
    }

    #[test]
    fn payload_error_field_wins() {
        let meta = PageMetadata {
            title: Some("Acme".into()),
            description: Some("Widgets".into()),
            error: Some("upstream timeout".into()),
        };
        assert_eq!(
            meta.into_usable(),
            Err(LookupError::InvalidResponse("upstream timeout".into()))
        );
    }

    #[test]
    fn description_only_payload_is_usable() {
        let meta = PageMetadata {
            description: Some("We make widgets".into()),
            ..Default::default()
        };
        let usable = meta.into_usable().unwrap();
        assert_eq!(usable.company_name(), None);
        assert_eq!(usable.description_text().as_deref(), Some("We make widgets"));
    }

    #[test]
    fn status_display_matches_serde() {
        for status in [
            LookupStatus::Idle,
            LookupStatus::Debouncing,
            LookupStatus::Fetching,
            LookupStatus::Loaded,
            LookupStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
        }
    }
}
