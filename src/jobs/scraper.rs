//! Page scraping worker for the organization step.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::tracker::{ItemSpec, ItemWorker};

/// One labelled piece of scraped page content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChunk {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl DataChunk {
    fn new(kind: &str, content: String) -> Self {
        Self {
            kind: kind.to_string(),
            content,
        }
    }
}

/// Item specs for a page list: page `i` completes at `(i + 1) * delay`.
pub fn page_specs(pages: &[String], delay: Duration) -> Vec<ItemSpec> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| ItemSpec::new(page.clone(), delay * (i as u32 + 1)))
        .collect()
}

/// Produces canned content for each page of the company's site.
pub struct SimulatedPageScraper {
    company_name: String,
    all_pages: Vec<String>,
}

impl SimulatedPageScraper {
    pub fn new(company_name: impl Into<String>, all_pages: Vec<String>) -> Self {
        Self {
            company_name: company_name.into(),
            all_pages,
        }
    }
}

#[async_trait]
impl ItemWorker for SimulatedPageScraper {
    type Output = Vec<DataChunk>;

    fn name(&self) -> &str {
        "page_scraper"
    }

    async fn run(&self, item: &ItemSpec) -> Result<Vec<DataChunk>, String> {
        let page = item.id.as_str();
        let page_lower = page.to_lowercase();
        let company_lower = self.company_name.to_lowercase();

        Ok(vec![
            DataChunk::new(
                "Meta Information",
                format!(
                    "Title: {page} | {}\nDescription: Comprehensive information about our {page_lower} section.",
                    self.company_name
                ),
            ),
            DataChunk::new(
                "Main Content",
                format!(
                    "Detailed content about {page_lower} including key features and benefits."
                ),
            ),
            DataChunk::new(
                "SEO Data",
                format!(
                    "Keywords: {page_lower}, {company_lower}, business\nMeta Description: Learn more about our {page_lower} offerings."
                ),
            ),
            DataChunk::new("Navigation Links", self.all_pages.join(", ")),
        ])
    }
}
