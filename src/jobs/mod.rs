//! Background jobs made of independently completing items.
//!
//! - `tracker`: `BackgroundJob` / `JobItem` state and the `JobTracker` that
//!   schedules one timer per item
//! - `scraper`: page-scrape item worker used by the organization step

pub mod scraper;
pub mod tracker;

pub use scraper::{DataChunk, SimulatedPageScraper, page_specs};
pub use tracker::{BackgroundJob, ItemSpec, ItemStatus, ItemWorker, JobEvent, JobItem, JobTracker};
