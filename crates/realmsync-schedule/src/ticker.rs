//! Fixed-period ticker.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Must be non-zero.
    pub period: Duration,
    /// Fraction of the period (0.0–1.0) a tick's work may use before a
    /// warning is logged. Default 0.8.
    pub budget_warn_threshold: f64,
    /// Random delay (up to this much) added to the first tick so timers
    /// created together do not all fire together.
    pub initial_jitter: Duration,
}

impl TickConfig {
    /// A ticker firing every `period` with default settings.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            budget_warn_threshold: 0.80,
            initial_jitter: Duration::from_millis(2),
        }
    }

    /// Clamps out-of-range values. Called by [`Ticker::new`].
    ///
    /// A zero period becomes one millisecond so `wait_for_tick` can never
    /// spin.
    pub fn validated(mut self) -> Self {
        if self.period.is_zero() {
            warn!("tick period is zero, clamping to 1ms");
            self.period = Duration::from_millis(1);
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

/// Returned by [`Ticker::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// `true` if the tick fired more than a tenth of a period late.
    pub overrun: bool,
    /// Whole periods skipped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Drives one recurring background job.
pub struct Ticker {
    config: TickConfig,
    tick_count: u64,
    next_tick: Instant,
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
}

impl Ticker {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max.max(1)))
        };

        debug!(
            period_ms = config.period.as_millis() as u64,
            "ticker created"
        );

        Self {
            next_tick: Instant::now() + config.period + jitter,
            config,
            tick_count: 0,
            tick_start: None,
        }
    }

    /// A ticker firing every `period` with default settings.
    pub fn every(period: Duration) -> Self {
        Self::new(TickConfig::every(period))
    }

    /// Waits until the next tick is due.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = self.next_tick;
        let period = self.config.period;

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.tick_start = Some(now);

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / period.as_nanos()) as u64
        } else {
            0
        };

        // Missed ticks are forgotten; the next one is a full period from
        // now, so a slow store never causes a burst of back-to-back jobs.
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_millis() as u64,
                "tick overrun, skipping ahead"
            );
        }
        self.next_tick = now + period;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the current tick's work is done and returns how long
    /// it took. Warns when that nears the period. Returns `None` without a
    /// preceding tick.
    pub fn record_tick_end(&mut self) -> Option<Duration> {
        let start = self.tick_start.take()?;
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.period.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = self.config.period.as_millis() as u64,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching its period"
            );
        }
        Some(elapsed)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }
}
