//! Onboard Flow: a multi-step onboarding wizard orchestrator.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod lookup;
pub mod onboarding;
pub mod timer;
pub mod verification;

pub use error::{Error, Result};
