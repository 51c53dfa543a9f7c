//! Fixed-timestep physics loop

use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Longest real frame fed to the accumulator. Anything longer is dropped
/// so a stall does not turn into a burst of catch-up steps.
pub const MAX_FRAME: Duration = Duration::from_millis(200);

/// Accumulates real elapsed time and hands it out in equal steps
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    max_frame: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32, max_frame: Duration) -> Self {
        Self {
            step: Duration::from_secs(1) / tick_rate.max(1),
            max_frame,
            accumulator: Duration::ZERO,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Step length in seconds, as passed to the simulation
    pub fn dt(&self) -> f32 {
        self.step.as_secs_f32()
    }

    pub fn accumulate(&mut self, frame: Duration) {
        self.accumulator += frame.min(self.max_frame);
    }

    /// Take one step out of the accumulator if a full one is available
    pub fn consume(&mut self) -> bool {
        if self.accumulator >= self.step {
            self.accumulator -= self.step;
            true
        } else {
            false
        }
    }
}

/// Drives a step callback at a fixed rate until stopped
pub struct PhysicsTickLoop {
    timestep: FixedTimestep,
}

impl PhysicsTickLoop {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            timestep: FixedTimestep::new(tick_rate, MAX_FRAME),
        }
    }

    /// Run until `stop` is cancelled. `on_step` always receives the same
    /// dt, however irregularly the loop itself is woken.
    pub async fn run<F>(mut self, stop: CancellationToken, mut on_step: F)
    where
        F: FnMut(f32),
    {
        let dt = self.timestep.dt();
        info!(dt, "Physics loop started");

        let mut ticker = interval(self.timestep.step());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last = Instant::now();
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if stop.is_cancelled() {
                break;
            }

            let now = Instant::now();
            self.timestep.accumulate(now.saturating_duration_since(last));
            last = now;

            while self.timestep.consume() {
                on_step(dt);
                ticks += 1;
            }
        }

        debug!(ticks, "Physics loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn irregular_frames_yield_whole_steps() {
        let mut ts = FixedTimestep::new(50, MAX_FRAME);
        let mut steps = 0;
        for frame_ms in [7, 13, 5, 40, 1, 14] {
            ts.accumulate(Duration::from_millis(frame_ms));
            while ts.consume() {
                steps += 1;
            }
        }
        // 80ms total at 20ms per step
        assert_eq!(steps, 4);
        assert!(!ts.consume());
    }

    #[test]
    fn long_stall_is_capped() {
        let mut ts = FixedTimestep::new(50, MAX_FRAME);
        ts.accumulate(Duration::from_secs(10));
        let mut steps = 0;
        while ts.consume() {
            steps += 1;
        }
        assert_eq!(steps, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_feeds_constant_dt_until_stopped() {
        let stop = CancellationToken::new();
        let steps = Arc::new(AtomicU64::new(0));
        let counter = steps.clone();

        let handle = tokio::spawn(PhysicsTickLoop::new(50).run(stop.clone(), move |dt| {
            assert!((dt - 0.02).abs() < 1e-6);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(1010)).await;
        stop.cancel();
        handle.await.unwrap();

        let count = steps.load(Ordering::SeqCst);
        assert!((49..=51).contains(&count), "ran {count} steps");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(steps.load(Ordering::SeqCst), count);
    }
}
