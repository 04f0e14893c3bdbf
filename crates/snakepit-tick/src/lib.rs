//! Fixed-interval tick timer for Snakepit rooms.
//!
//! A room ticks only while a game is running. The scheduler therefore has
//! an explicit [`start`](TickScheduler::start) / [`stop`](TickScheduler::stop)
//! switch; both are idempotent, so the room actor can simply re-assert the
//! desired state after every command.
//!
//! # Integration
//!
//! The scheduler sits inside the room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_tick() => {
//!             room.tick();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`TickScheduler`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between two ticks.
    pub interval: Duration,
    /// Budget warning threshold (0.0–1.0). Default: 0.80 (80%).
    /// A tracing warning is emitted when tick execution exceeds this
    /// fraction of the interval.
    pub budget_warn_threshold: f64,
    /// Budget critical threshold (0.0–1.0). Default: 1.0 (100%).
    pub budget_critical_threshold: f64,
    /// Random jitter (0–max µs) added to the first tick after each
    /// [`TickScheduler::start`], so rooms started together do not tick in
    /// lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Config with the given interval and default thresholds.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `interval` raised to at least [`Self::MIN_INTERVAL`].
    /// - Thresholds clamped to `0.0..=1.0`, warn ≤ critical.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(interval = ?self.interval, "tick interval too short, clamping");
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }
}

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Ticks fired by this scheduler so far, including this one.
    pub tick: u64,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Start/stop fixed-interval timer. One per room actor.
///
/// Late ticks are never replayed: after an overrun the next deadline is
/// computed from the moment the late tick fired.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire. `None` while stopped.
    next_tick: Option<TokioInstant>,
    /// Wall-clock instant when the current tick's work started.
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    last_utilization: f64,
}

impl TickScheduler {
    /// Creates a stopped scheduler.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            "tick scheduler created"
        );
        Self {
            config,
            tick_count: 0,
            next_tick: None,
            tick_start: None,
            last_utilization: 0.0,
        }
    }

    /// Creates a stopped scheduler with the given interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Starts ticking. The first tick fires one interval (plus jitter)
    /// from now. No-op if already running.
    pub fn start(&mut self) {
        if self.next_tick.is_some() {
            return;
        }
        let jitter = if self.config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..self.config.initial_jitter_us))
        } else {
            Duration::ZERO
        };
        self.next_tick = Some(TokioInstant::now() + self.config.interval + jitter);
        debug!(tick = self.tick_count, "tick scheduler started");
    }

    /// Stops ticking. No-op if already stopped.
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            self.tick_start = None;
            debug!(tick = self.tick_count, "tick scheduler stopped");
        }
    }

    /// Whether the scheduler is currently started.
    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Waits until the next tick is due.
    ///
    /// While stopped this future pends forever; `tokio::select!` keeps
    /// serving its other branches. Cancel-safe: nothing changes until the
    /// deadline is reached.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let interval = self.config.interval;
        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        if overrun {
            let skipped = late_by.as_nanos() / interval.as_nanos();
            if skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = skipped as u64,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun, skipping ahead"
                );
            }
        }
        self.next_tick = Some(now + interval);

        trace!(tick = self.tick_count, overrun, "tick fired");
        TickInfo {
            tick: self.tick_count,
            overrun,
        }
    }

    /// Records that the work for the current tick has finished and warns
    /// if it used too much of the interval.
    ///
    /// A call without a preceding tick is a no-op.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let budget = self.config.interval;
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        self.last_utilization = utilization;

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "CRITICAL: tick exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick approaching budget limit"
            );
        }
    }

    /// Ticks fired since creation.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Fraction of the interval the last recorded tick used.
    pub fn last_utilization(&self) -> f64 {
        self.last_utilization
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
