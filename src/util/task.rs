//! Owned, cancellable timer tasks
//!
//! A [`ScheduledTask`] is a spawned tokio task tied to the
//! [`CancellationToken`] that stops it. Dropping the handle cancels the task,
//! so a task can never outlive the state that owns it.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct ScheduledTask {
    token: CancellationToken,
}

impl ScheduledTask {
    /// Run `job` once after `delay` unless cancelled first.
    ///
    /// Cancellation is only observed while waiting. Once the delay has
    /// elapsed the job runs to completion, which lets a job replace the very
    /// handle that spawned it.
    pub fn after<F, Fut>(delay: Duration, token: CancellationToken, job: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let child = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = sleep(delay) => job().await,
            }
        });
        Self { token }
    }

    /// Run `job` every `period`, first run one period from now.
    pub fn every<F, Fut>(period: Duration, token: CancellationToken, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let child = token.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        if child.is_cancelled() {
                            break;
                        }
                        job().await;
                    }
                }
            }
        });
        Self { token }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
