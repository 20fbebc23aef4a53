//! Verification session state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issuer::IssuedCode;
use crate::error::VerificationError;

/// Where a verification session stands.
///
/// `AwaitingResend` is not a failure: the issued code may still be
/// accepted, the countdown has simply unlocked the resend action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Idle,
    Issued,
    AwaitingResend,
    Verified,
}

impl VerificationStatus {
    pub fn can_transition_to(&self, target: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, target),
            (Idle, Issued)
                | (Issued, AwaitingResend)
                | (AwaitingResend, Issued)
                | (Issued, Verified)
                | (AwaitingResend, Verified)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// A code is outstanding and may be submitted.
    pub fn accepts_code(&self) -> bool {
        matches!(self, Self::Issued | Self::AwaitingResend)
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Issued => "issued",
            Self::AwaitingResend => "awaiting_resend",
            Self::Verified => "verified",
        };
        write!(f, "{s}")
    }
}

/// Client-side view of one verification exchange.
///
/// Holds only the issuer's ticket, never the code itself.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSession {
    pub status: VerificationStatus,
    #[serde(skip)]
    ticket: Option<IssuedCode>,
    pub issued_at: Option<DateTime<Utc>>,
    /// Fixed countdown window.
    pub window_secs: u32,
    /// Seconds left before resend unlocks.
    pub remaining_secs: u32,
    #[serde(skip)]
    attempted_code: Option<String>,
    pub failed_attempts: u32,
    pub verified_at: Option<DateTime<Utc>>,
}

impl VerificationSession {
    pub fn new(window_secs: u32) -> Self {
        Self {
            status: VerificationStatus::Idle,
            ticket: None,
            issued_at: None,
            window_secs,
            remaining_secs: 0,
            attempted_code: None,
            failed_attempts: 0,
            verified_at: None,
        }
    }

    /// Resend is only available once the countdown has reached zero.
    pub fn can_resend(&self) -> bool {
        self.status == VerificationStatus::AwaitingResend && self.remaining_secs == 0
    }

    pub fn ticket(&self) -> Option<&IssuedCode> {
        self.ticket.as_ref()
    }

    pub fn attempted_code(&self) -> Option<&str> {
        self.attempted_code.as_deref()
    }

    /// Record a freshly issued code and restart the countdown from the full
    /// window. Replaces any previous ticket.
    pub fn issue(&mut self, ticket: IssuedCode) -> Result<(), VerificationError> {
        if self.status.is_terminal() {
            return Err(VerificationError::AlreadyVerified);
        }
        if !self.status.can_transition_to(VerificationStatus::Issued) {
            return Err(VerificationError::CooldownActive {
                remaining_secs: self.remaining_secs,
            });
        }
        self.issued_at = Some(ticket.issued_at);
        self.ticket = Some(ticket);
        self.status = VerificationStatus::Issued;
        self.remaining_secs = self.window_secs;
        self.attempted_code = None;
        Ok(())
    }

    /// Advance the countdown by one second. Returns true on the tick that
    /// unlocks resend.
    pub fn tick(&mut self) -> bool {
        if self.status != VerificationStatus::Issued {
            return false;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.status = VerificationStatus::AwaitingResend;
            return true;
        }
        false
    }

    /// Check that a submission is eligible before asking the issuer about it.
    pub fn prepare_attempt(&mut self, code: &str) -> Result<IssuedCode, VerificationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(VerificationError::EmptyCode);
        }
        if self.status.is_terminal() {
            return Err(VerificationError::AlreadyVerified);
        }
        let ticket = match (&self.ticket, self.status.accepts_code()) {
            (Some(ticket), true) => ticket.clone(),
            _ => return Err(VerificationError::NotIssued),
        };
        self.attempted_code = Some(code.to_string());
        Ok(ticket)
    }

    /// A mismatch leaves the countdown and the issued code untouched.
    pub fn record_mismatch(&mut self) {
        self.failed_attempts += 1;
    }

    pub fn mark_verified(&mut self) {
        self.status = VerificationStatus::Verified;
        self.remaining_secs = 0;
        self.verified_at = Some(Utc::now());
        self.ticket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ticket() -> IssuedCode {
        IssuedCode {
            id: Uuid::new_v4(),
            recipient: "ada@example.com".into(),
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn valid_transitions() {
        use VerificationStatus::*;
        assert!(Idle.can_transition_to(Issued));
        assert!(Issued.can_transition_to(AwaitingResend));
        assert!(AwaitingResend.can_transition_to(Issued));
        assert!(Issued.can_transition_to(Verified));
        assert!(AwaitingResend.can_transition_to(Verified));
    }

    #[test]
    fn invalid_transitions() {
        use VerificationStatus::*;
        assert!(!Idle.can_transition_to(Verified));
        assert!(!Issued.can_transition_to(Issued));
        assert!(!Verified.can_transition_to(Issued));
        assert!(!Verified.can_transition_to(Idle));
    }

    #[test]
    fn countdown_unlocks_resend_only_at_zero() {
        let mut session = VerificationSession::new(3);
        session.issue(ticket()).unwrap();
        assert_eq!(session.remaining_secs, 3);

        assert!(!session.tick());
        assert!(!session.can_resend());
        assert!(!session.tick());
        assert!(!session.can_resend());
        assert!(session.tick());
        assert!(session.can_resend());
        assert_eq!(session.status, VerificationStatus::AwaitingResend);

        // Further ticks are inert.
        assert!(!session.tick());
        assert_eq!(session.remaining_secs, 0);
    }

    #[test]
    fn reissue_resets_window_and_clears_resend() {
        let mut session = VerificationSession::new(2);
        session.issue(ticket()).unwrap();
        session.tick();
        session.tick();
        assert!(session.can_resend());

        let second = ticket();
        let second_id = second.id;
        session.issue(second).unwrap();
        assert_eq!(session.remaining_secs, 2);
        assert!(!session.can_resend());
        assert_eq!(session.ticket().map(|t| t.id), Some(second_id));
    }

    #[test]
    fn reissue_during_countdown_is_rejected() {
        let mut session = VerificationSession::new(60);
        session.issue(ticket()).unwrap();
        session.tick();
        assert_eq!(
            session.issue(ticket()),
            Err(VerificationError::CooldownActive { remaining_secs: 59 })
        );
        assert_eq!(session.remaining_secs, 59);
    }

    #[test]
    fn empty_code_rejected_in_every_state() {
        let mut session = VerificationSession::new(60);
        assert_eq!(session.prepare_attempt(""), Err(VerificationError::EmptyCode));
        session.issue(ticket()).unwrap();
        assert_eq!(session.prepare_attempt("  "), Err(VerificationError::EmptyCode));
        session.mark_verified();
        assert_eq!(session.prepare_attempt(""), Err(VerificationError::EmptyCode));
    }

    #[test]
    fn attempt_without_issued_code_rejected() {
        let mut session = VerificationSession::new(60);
        assert_eq!(
            session.prepare_attempt("123456"),
            Err(VerificationError::NotIssued)
        );
    }

    #[test]
    fn mismatch_keeps_countdown_and_ticket() {
        let mut session = VerificationSession::new(60);
        let t = ticket();
        let id = t.id;
        session.issue(t).unwrap();
        session.tick();

        session.prepare_attempt("000000").unwrap();
        session.record_mismatch();

        assert_eq!(session.remaining_secs, 59);
        assert_eq!(session.status, VerificationStatus::Issued);
        assert_eq!(session.ticket().map(|t| t.id), Some(id));
        assert_eq!(session.failed_attempts, 1);
        assert_eq!(session.attempted_code(), Some("000000"));
    }

    #[test]
    fn verified_is_terminal() {
        let mut session = VerificationSession::new(60);
        session.issue(ticket()).unwrap();
        session.mark_verified();
        assert!(session.verified_at.is_some());
        assert!(session.ticket().is_none());
        assert_eq!(session.issue(ticket()), Err(VerificationError::AlreadyVerified));
    }
}
