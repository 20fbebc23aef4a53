//! VerificationController: issues codes through a `CodeIssuer` and runs
//! the resend countdown.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::issuer::CodeIssuer;
use super::session::{VerificationSession, VerificationStatus};
use crate::error::VerificationError;
use crate::timer::{self, TimerHandle};

/// Owns one verification session and its countdown timer.
pub struct VerificationController {
    issuer: Arc<dyn CodeIssuer>,
    session: Arc<RwLock<VerificationSession>>,
    /// At most one countdown runs at a time; a new one cancels the old.
    countdown: Mutex<Option<TimerHandle>>,
    tick: Duration,
}

impl VerificationController {
    pub fn new(issuer: Arc<dyn CodeIssuer>, window_secs: u32, tick: Duration) -> Self {
        Self {
            issuer,
            session: Arc::new(RwLock::new(VerificationSession::new(window_secs))),
            countdown: Mutex::new(None),
            tick,
        }
    }

    /// Issue a code to `recipient` and start the countdown.
    ///
    /// Allowed from `Idle`, or from `AwaitingResend` once the countdown ran out.
    pub async fn send(&self, recipient: &str) -> Result<(), VerificationError> {
        let mut countdown = self.countdown.lock().await;

        {
            let session = self.session.read().await;
            if session.status.is_terminal() {
                return Err(VerificationError::AlreadyVerified);
            }
            if !session.status.can_transition_to(VerificationStatus::Issued) {
                return Err(VerificationError::CooldownActive {
                    remaining_secs: session.remaining_secs,
                });
            }
        }

        let ticket = self.issuer.issue(recipient).await?;
        self.session.write().await.issue(ticket)?;

        if let Some(previous) = countdown.take() {
            previous.cancel();
        }
        *countdown = Some(self.start_countdown());

        tracing::info!(recipient, "Verification countdown started");
        Ok(())
    }

    /// Re-issue a code. Ignored (returns `false`) while the countdown runs.
    pub async fn resend(&self, recipient: &str) -> Result<bool, VerificationError> {
        let can_resend = self.session.read().await.can_resend();
        if !can_resend {
            tracing::debug!(recipient, "Resend ignored: countdown still running");
            return Ok(false);
        }
        self.send(recipient).await?;
        Ok(true)
    }

    /// Submit a code. On success the session is verified and the countdown
    /// stops; a mismatch leaves both untouched.
    pub async fn submit(&self, code: &str) -> Result<(), VerificationError> {
        let ticket = self.session.write().await.prepare_attempt(code)?;

        if !self.issuer.check(&ticket, code.trim()).await? {
            self.session.write().await.record_mismatch();
            tracing::warn!(recipient = %ticket.recipient, "Verification code mismatch");
            return Err(VerificationError::Mismatch);
        }

        {
            let mut session = self.session.write().await;
            // A resend may have replaced the ticket while the issuer was checking.
            if session.ticket().map(|t| t.id) != Some(ticket.id) {
                return Err(VerificationError::Mismatch);
            }
            session.mark_verified();
        }
        if let Some(countdown) = self.countdown.lock().await.take() {
            countdown.cancel();
        }

        tracing::info!(recipient = %ticket.recipient, "Verification succeeded");
        Ok(())
    }

    fn start_countdown(&self) -> TimerHandle {
        let session = Arc::clone(&self.session);
        timer::schedule_every(self.tick, move || {
            let session = Arc::clone(&session);
            async move {
                let mut session = session.write().await;
                if session.tick() {
                    tracing::debug!("Verification countdown finished; resend unlocked");
                    return ControlFlow::Break(());
                }
                if session.status != VerificationStatus::Issued {
                    return ControlFlow::Break(());
                }
                tracing::trace!(remaining = session.remaining_secs, "Countdown tick");
                ControlFlow::Continue(())
            }
        })
    }

    pub async fn snapshot(&self) -> VerificationSession {
        self.session.read().await.clone()
    }

    pub async fn is_verified(&self) -> bool {
        self.session.read().await.status == VerificationStatus::Verified
    }

    /// Stop the countdown, e.g. when the owning step is folded away.
    pub async fn shutdown(&self) {
        if let Some(countdown) = self.countdown.lock().await.take() {
            countdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::issuer::InMemoryCodeIssuer;

    const EMAIL: &str = "ada@example.com";

    fn controller() -> (VerificationController, Arc<InMemoryCodeIssuer>) {
        let issuer = Arc::new(InMemoryCodeIssuer::new());
        let controller = VerificationController::new(
            Arc::clone(&issuer) as Arc<dyn CodeIssuer>,
            60,
            Duration::from_secs(1),
        );
        (controller, issuer)
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_once_per_second() {
        let (controller, _issuer) = controller();
        controller.send(EMAIL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let session = controller.snapshot().await;
        assert_eq!(session.remaining_secs, 50);
        assert!(!session.can_resend());
    }

    #[tokio::test(start_paused = true)]
    async fn resend_ignored_while_counting_down() {
        let (controller, issuer) = controller();
        controller.send(EMAIL).await.unwrap();
        let code = issuer.peek(EMAIL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        assert!(!controller.resend(EMAIL).await.unwrap());

        let session = controller.snapshot().await;
        assert_eq!(session.remaining_secs, 30);
        // The original code is still the live one.
        assert_eq!(issuer.peek(EMAIL).await.unwrap(), code);
    }

    #[tokio::test(start_paused = true)]
    async fn resend_after_expiry_resets_window_and_invalidates_old_code() {
        let (controller, issuer) = controller();
        controller.send(EMAIL).await.unwrap();
        let old_code = issuer.peek(EMAIL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        let expired = controller.snapshot().await;
        assert_eq!(expired.remaining_secs, 0);
        assert!(expired.can_resend());
        assert_eq!(expired.status, VerificationStatus::AwaitingResend);

        assert!(controller.resend(EMAIL).await.unwrap());
        let session = controller.snapshot().await;
        assert_eq!(session.remaining_secs, 60);
        assert!(!session.can_resend());

        let new_code = issuer.peek(EMAIL).await.unwrap();
        if new_code != old_code {
            assert_eq!(
                controller.submit(&old_code).await,
                Err(VerificationError::Mismatch)
            );
        }
        controller.submit(&new_code).await.unwrap();
        assert!(controller.is_verified().await);
    }

    #[tokio::test(start_paused = true)]
    async fn resend_does_not_compound_tick_rate() {
        let (controller, _issuer) = controller();
        controller.send(EMAIL).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60_500)).await;
        assert!(controller.resend(EMAIL).await.unwrap());

        tokio::time::sleep(Duration::from_millis(5_200)).await;
        assert_eq!(controller.snapshot().await.remaining_secs, 55);
    }

    #[tokio::test(start_paused = true)]
    async fn code_still_accepted_after_expiry() {
        let (controller, issuer) = controller();
        controller.send(EMAIL).await.unwrap();
        let code = issuer.peek(EMAIL).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        controller.submit(&code).await.unwrap();
        assert!(controller.is_verified().await);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatch_does_not_reset_countdown() {
        let (controller, issuer) = controller();
        controller.send(EMAIL).await.unwrap();
        let code = issuer.peek(EMAIL).await.unwrap();
        let wrong = if code == "999999" { "000000" } else { "999999" };

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(controller.submit(wrong).await, Err(VerificationError::Mismatch));

        let session = controller.snapshot().await;
        assert_eq!(session.remaining_secs, 55);
        assert_eq!(session.status, VerificationStatus::Issued);
        assert_eq!(session.failed_attempts, 1);

        controller.submit(&code).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_submission_rejected_before_and_after_issue() {
        let (controller, _issuer) = controller();
        assert_eq!(controller.submit("").await, Err(VerificationError::EmptyCode));
        controller.send(EMAIL).await.unwrap();
        assert_eq!(controller.submit("   ").await, Err(VerificationError::EmptyCode));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_before_send_is_not_issued() {
        let (controller, _issuer) = controller();
        assert_eq!(
            controller.submit("123456").await,
            Err(VerificationError::NotIssued)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn verification_stops_countdown() {
        let (controller, issuer) = controller();
        controller.send(EMAIL).await.unwrap();
        let code = issuer.peek(EMAIL).await.unwrap();
        controller.submit(&code).await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        let session = controller.snapshot().await;
        assert_eq!(session.status, VerificationStatus::Verified);
        assert_eq!(session.remaining_secs, 0);
        assert_eq!(
            controller.send(EMAIL).await,
            Err(VerificationError::AlreadyVerified)
        );
    }
}
