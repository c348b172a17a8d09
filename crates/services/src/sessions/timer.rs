use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Nominal tick period of the round countdown.
pub const TICK: Duration = Duration::from_millis(100);

/// Countdown task for a running round.
///
/// Publishes the remaining time on a watch channel every [`TICK`] and stops
/// after publishing zero. Dropping the timer aborts the task.
#[derive(Debug)]
pub struct RoundTimer {
    handle: JoinHandle<()>,
    cancelled: AtomicBool,
}

impl RoundTimer {
    /// Spawn a countdown of `duration` on the current tokio runtime.
    #[must_use]
    pub fn start(duration: Duration) -> (Self, watch::Receiver<Duration>) {
        let deadline = Instant::now() + duration;
        let (tx, rx) = watch::channel(duration);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let remaining = deadline.saturating_duration_since(Instant::now());
                if tx.send(remaining).is_err() {
                    debug!("round timer has no listeners");
                    break;
                }
                if remaining.is_zero() {
                    debug!("round timer expired");
                    break;
                }
            }
        });

        (
            Self {
                handle,
                cancelled: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Stop the countdown. Returns true only for the first call.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.handle.abort();
        true
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
