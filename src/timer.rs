//! Cancellable timers on the tokio clock.
//!
//! Every deferred callback in the wizard (lookup debounce, countdown ticks,
//! per-item job delays) goes through here so it can be cancelled by handle
//! and driven by tokio's paused clock in tests.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Handle to a scheduled timer.
///
/// Dropping the handle leaves the timer running; only [`TimerHandle::cancel`]
/// stops it.
#[derive(Debug)]
pub struct TimerHandle {
    id: Uuid,
    handle: JoinHandle<()>,
}

impl TimerHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancel the timer. A no-op if it already fired.
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            self.handle.abort();
            tracing::trace!(timer_id = %self.id, "Timer cancelled");
        }
    }

    /// Whether the timer has fired (or was cancelled) and will not run again.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run `task` once after `delay`.
pub fn schedule<F>(delay: Duration, task: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let id = Uuid::new_v4();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        task.await;
    });
    TimerHandle { id, handle }
}

/// Call `tick` every `period`, first after one full period, until it
/// returns `ControlFlow::Break`.
pub fn schedule_every<F, Fut>(period: Duration, mut tick: F) -> TimerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let id = Uuid::new_v4();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if tick().await.is_break() {
                break;
            }
        }
    });
    TimerHandle { id, handle }
}
