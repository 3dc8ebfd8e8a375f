//! Fixed-frequency control loop.
//!
//! Each iteration runs one tick, measures it and sleeps for whatever is left
//! of the period. An overrun is not compensated: the next iteration starts
//! immediately and the schedule simply slips.
//!
//! ```text
//! |<------------- period ------------->|
//! | tick | after_tick |     sleep      | tick | ...
//! ```

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use minstant::Instant;

use crate::trace::{debug, info};

/// Loop rate used against the robot controller.
pub const DEFAULT_FREQUENCY_HZ: u32 = 400;

/// One unit of periodic work.
pub trait Tick {
    type Error;

    /// # Errors
    ///
    /// An error ends the loop and is returned from [`Scheduler::run`].
    fn tick(&mut self) -> Result<(), Self::Error>;

    /// Continuation predicate, checked between iterations.
    fn is_alive(&self) -> bool;
}

/// Summary of a finished loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopReport {
    pub ticks: u64,
    /// Iterations whose work exceeded the period.
    pub overruns: u64,
}

fn period_of(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(hz))
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Duration,
    stop: Arc<AtomicBool>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_period(period_of(DEFAULT_FREQUENCY_HZ))
    }
}

impl Scheduler {
    /// Period is `1 / hz`, so 400 Hz gives 2.5 ms.
    #[must_use]
    pub fn with_frequency(hz: NonZeroU32) -> Self {
        Self::from_period(period_of(hz.get()))
    }

    #[must_use]
    pub fn from_period(period: Duration) -> Self {
        Self {
            period,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Flag that ends the loop at the next iteration boundary when set.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Sleep owed after an iteration that took `elapsed`. Zero on overrun.
    #[must_use]
    pub fn remaining_budget(&self, elapsed: Duration) -> Duration {
        self.period.saturating_sub(elapsed)
    }

    /// Runs `task` until it reports not alive, fails, or the stop flag is set.
    ///
    /// # Errors
    ///
    /// Returns the first tick error.
    pub fn run<T: Tick>(&self, task: &mut T) -> Result<LoopReport, T::Error> {
        self.run_with(task, |_| {})
    }

    /// Like [`run`](Self::run), calling `after_tick` inside each iteration's
    /// budget once the tick succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first tick error.
    pub fn run_with<T, F>(&self, task: &mut T, mut after_tick: F) -> Result<LoopReport, T::Error>
    where
        T: Tick,
        F: FnMut(&mut T),
    {
        let mut report = LoopReport::default();
        info!(period = ?self.period, "control loop started");

        while task.is_alive() && !self.stop.load(Ordering::Relaxed) {
            let start = Instant::now();

            if let Err(err) = task.tick() {
                info!(ticks = report.ticks, "control loop stopped on tick error");
                return Err(err);
            }
            after_tick(task);
            report.ticks += 1;

            let elapsed = start.elapsed();
            let remaining = self.remaining_budget(elapsed);
            if remaining.is_zero() {
                report.overruns += 1;
                debug!(?elapsed, period = ?self.period, "tick overran its period");
            } else {
                thread::sleep(remaining);
            }
        }

        info!(
            ticks = report.ticks,
            overruns = report.overruns,
            "control loop finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTick {
        work: Duration,
        remaining: u64,
        fail_at: Option<u64>,
        ticks: u64,
    }

    impl FakeTick {
        fn new(work: Duration, remaining: u64) -> Self {
            Self {
                work,
                remaining,
                fail_at: None,
                ticks: 0,
            }
        }
    }

    impl Tick for FakeTick {
        type Error = u64;

        fn tick(&mut self) -> Result<(), u64> {
            self.ticks += 1;
            if self.fail_at == Some(self.ticks) {
                return Err(self.ticks);
            }
            if !self.work.is_zero() {
                thread::sleep(self.work);
            }
            self.remaining = self.remaining.saturating_sub(1);
            Ok(())
        }

        fn is_alive(&self) -> bool {
            self.remaining > 0
        }
    }

    #[test]
    fn default_period_is_400hz() {
        assert_eq!(Scheduler::default().period(), Duration::from_micros(2500));
        let hz = NonZeroU32::new(1000).unwrap();
        assert_eq!(Scheduler::with_frequency(hz).period(), Duration::from_millis(1));
    }

    #[test]
    fn budget_is_period_minus_work() {
        let scheduler = Scheduler::default();
        assert_eq!(
            scheduler.remaining_budget(Duration::from_millis(1)),
            Duration::from_micros(1500)
        );
        assert_eq!(
            scheduler.remaining_budget(Duration::from_millis(3)),
            Duration::ZERO
        );
    }

    #[test]
    fn runs_until_not_alive() {
        let scheduler = Scheduler::from_period(Duration::from_micros(200));
        let mut task = FakeTick::new(Duration::ZERO, 5);
        let report = scheduler.run(&mut task).unwrap();
        assert_eq!(report.ticks, 5);
        assert_eq!(task.ticks, 5);
    }

    #[test]
    fn short_ticks_sleep_out_the_period() {
        const TICKS: u64 = 40;
        let scheduler = Scheduler::default();
        let mut task = FakeTick::new(Duration::from_millis(1), TICKS);
        let mut stamps = Vec::with_capacity(TICKS as usize);

        let start = Instant::now();
        let report = scheduler
            .run_with(&mut task, |_| stamps.push(Instant::now()))
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(report.ticks, TICKS);
        assert!(report.overruns < 4, "overruns: {}", report.overruns);
        // Each iteration is 1 ms of work plus ~1.5 ms of sleep.
        let period = scheduler.period();
        assert!(elapsed >= period * (TICKS as u32 - 1), "{elapsed:?}");
        assert!(elapsed < period * 2 * TICKS as u32, "{elapsed:?}");

        let gaps: Vec<_> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = gaps.iter().sum::<Duration>() / gaps.len() as u32;
        assert!(mean >= period.mul_f64(0.9), "mean iteration {mean:?}");
    }

    #[test]
    fn slow_ticks_are_overruns_without_catch_up() {
        let scheduler = Scheduler::default();
        let mut task = FakeTick::new(Duration::from_millis(3), 4);
        let start = Instant::now();
        let report = scheduler.run(&mut task).unwrap();
        assert_eq!(report.ticks, 4);
        assert_eq!(report.overruns, 4);
        // No sleeps follow an overrun, so the loop is bounded by the work.
        assert!(start.elapsed() < Duration::from_millis(4 * 3 + 50));
    }

    #[test]
    fn stop_flag_ends_loop() {
        let scheduler = Scheduler::from_period(Duration::from_micros(100));
        let stop = scheduler.stop_flag();
        let mut task = FakeTick::new(Duration::ZERO, u64::MAX);
        let report = scheduler
            .run_with(&mut task, |t| {
                if t.ticks == 3 {
                    stop.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();
        assert_eq!(report.ticks, 3);
    }

    #[test]
    fn tick_error_propagates() {
        let scheduler = Scheduler::from_period(Duration::from_micros(100));
        let mut task = FakeTick::new(Duration::ZERO, 10);
        task.fail_at = Some(2);
        assert_eq!(scheduler.run(&mut task), Err(2));
    }
}
