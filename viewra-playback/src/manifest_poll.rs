//! Manifest-readiness polling: exponential backoff from 200 ms, capped at
//! 2 s, for up to 30 attempts (~30 s ceiling) — the fixed schedule spec.md
//! §9 asks for in place of the source's two conflicting backoff schedules.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use viewra_core::metrics::transcoding::MANIFEST_POLL_ATTEMPTS;

#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl PollSchedule {
    #[must_use]
    pub fn from_config(config: &viewra_core::config::TranscodingConfig) -> Self {
        Self {
            initial: config.manifest_poll_initial,
            max: config.manifest_poll_max,
            max_attempts: config.manifest_poll_max_attempts,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    TimedOut,
    Cancelled,
}

/// Calls `check` (expected to be a cheap existence/validity probe against the
/// manifest path) on the schedule above until it returns `true`, the
/// attempt budget is exhausted, or `cancel` fires.
pub async fn poll_until_ready<F, Fut>(
    schedule: PollSchedule,
    cancel: &CancellationToken,
    mut check: F,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let mut delay = schedule.initial;
    for attempt in 1..=schedule.max_attempts {
        if cancel.is_cancelled() {
            MANIFEST_POLL_ATTEMPTS
                .with_label_values(&["cancelled"])
                .observe(f64::from(attempt));
            return PollOutcome::Cancelled;
        }

        if check().await {
            MANIFEST_POLL_ATTEMPTS
                .with_label_values(&["ready"])
                .observe(f64::from(attempt));
            return PollOutcome::Ready;
        }

        tokio::select! {
            () = cancel.cancelled() => {
                MANIFEST_POLL_ATTEMPTS
                    .with_label_values(&["cancelled"])
                    .observe(f64::from(attempt));
                return PollOutcome::Cancelled;
            }
            () = tokio::time::sleep(delay) => {}
        }

        delay = std::cmp::min(delay.mul_f64(1.5), schedule.max);
    }

    MANIFEST_POLL_ATTEMPTS
        .with_label_values(&["timeout"])
        .observe(f64::from(schedule.max_attempts));
    PollOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_check_returns_immediately() {
        let schedule = PollSchedule {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(2),
            max_attempts: 30,
        };
        let cancel = CancellationToken::new();
        let outcome = poll_until_ready(schedule, &cancel, || async { true }).await;
        assert_eq!(outcome, PollOutcome::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_times_out() {
        let schedule = PollSchedule {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(4),
            max_attempts: 3,
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let outcome = poll_until_ready(schedule, &cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;
        assert_eq!(outcome, PollOutcome::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_short_circuits() {
        let schedule = PollSchedule {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(2),
            max_attempts: 30,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = poll_until_ready(schedule, &cancel, || async { false }).await;
        assert_eq!(outcome, PollOutcome::Cancelled);
    }
}
