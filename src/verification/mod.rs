//! One-time verification codes with an expiring resend cooldown.
//!
//! - `session`: `VerificationSession` state machine (Idle → Issued → Verified | AwaitingResend)
//! - `issuer`: the `CodeIssuer` contract and an in-memory issuer
//! - `controller`: drives the countdown on the tokio clock

pub mod controller;
pub mod issuer;
pub mod session;

pub use controller::VerificationController;
pub use issuer::{CodeIssuer, InMemoryCodeIssuer, IssuedCode};
pub use session::{VerificationSession, VerificationStatus};
