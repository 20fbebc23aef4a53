//! Website metadata lookup: a debounced, cancellable wrapper around an
//! external metadata fetch.
//!
//! - `model`: lookup payloads and results
//! - `provider`: the `MetadataProvider` contract plus HTTP and simulated backends
//! - `task`: `DebouncedLookup` (debounce, supersession, stale-result discard)

pub mod model;
pub mod provider;
pub mod task;

pub use model::{DebouncedLookupResult, LookupStatus, PageMetadata};
pub use provider::{HttpMetadataProvider, MetadataProvider, SimulatedMetadataProvider};
pub use task::{DebouncedLookup, LookupSink};
