//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Scheduler counters
//!
//! Plain atomics are always maintained so tests and embedders can read a
//! [`SchedulerMetricsSnapshot`]. With the `metrics` feature each record is
//! also forwarded to the `metrics` facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::priority::Priority;

/// Counters for one scheduler
#[derive(Debug)]
pub struct SchedulerMetrics {
    /// Tasks appended through `Queue::add`
    pub tasks_enqueued: AtomicU64,

    /// Tasks that ran to completion or panicked
    pub tasks_executed: AtomicU64,

    /// Tasks that panicked
    pub tasks_panicked: AtomicU64,

    /// Drain passes started
    pub drains: AtomicU64,

    /// Drain passes stopped by a pacing limit with work left
    pub budget_yields: AtomicU64,

    /// Frame pulse callbacks received
    pub frame_pulses: AtomicU64,

    /// Idle window callbacks received
    pub idle_windows: AtomicU64,

    /// Jobs handed to the immediate-deferral primitive
    pub deferrals: AtomicU64,

    /// Queue batches that drained and resolved their completion signals
    pub batches_completed: AtomicU64,

    /// Per-tier executed task counts, indexed by `Priority::index`
    pub executed_by_tier: [AtomicU64; 3],

    start_time: Instant,
}

impl SchedulerMetrics {
    /// Create new metrics instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks_enqueued: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            drains: AtomicU64::new(0),
            budget_yields: AtomicU64::new(0),
            frame_pulses: AtomicU64::new(0),
            idle_windows: AtomicU64::new(0),
            deferrals: AtomicU64::new(0),
            batches_completed: AtomicU64::new(0),
            executed_by_tier: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            start_time: Instant::now(),
        }
    }

    /// Record an `add`
    pub fn record_enqueue(&self, priority: Priority) {
        self.tasks_enqueued.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_tasks_enqueued_total", "tier" => priority.name()).increment(1);
        #[cfg(not(feature = "metrics"))]
        let _ = priority;
    }

    /// Record a task execution
    pub fn record_execution(&self, priority: Priority, panicked: bool) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.executed_by_tier[priority.index()].fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "metrics")]
        {
            counter!("frame_pulse_tasks_executed_total", "tier" => priority.name()).increment(1);
            if panicked {
                counter!("frame_pulse_tasks_panicked_total", "tier" => priority.name()).increment(1);
            }
        }
    }

    /// Record the start of a drain pass
    pub fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_drains_total").increment(1);
    }

    /// Record a drain stopped by its pacing limit
    pub fn record_budget_yield(&self, priority: Priority) {
        self.budget_yields.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_budget_yields_total", "tier" => priority.name()).increment(1);
        #[cfg(not(feature = "metrics"))]
        let _ = priority;
    }

    /// Record a frame pulse callback
    pub fn record_frame_pulse(&self) {
        self.frame_pulses.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_frames_total").increment(1);
    }

    /// Record an idle window callback
    pub fn record_idle_window(&self) {
        self.idle_windows.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_idle_windows_total").increment(1);
    }

    /// Record a job handed to the deferral primitive
    pub fn record_deferral(&self) {
        self.deferrals.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_deferrals_total").increment(1);
    }

    /// Record a queue batch completion
    pub fn record_batch_complete(&self) {
        self.batches_completed.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("frame_pulse_batches_completed_total").increment(1);
    }

    /// Seconds since the scheduler was created
    #[must_use]
    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
            budget_yields: self.budget_yields.load(Ordering::Relaxed),
            frame_pulses: self.frame_pulses.load(Ordering::Relaxed),
            idle_windows: self.idle_windows.load(Ordering::Relaxed),
            deferrals: self.deferrals.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            executed_by_tier: [
                self.executed_by_tier[0].load(Ordering::Relaxed),
                self.executed_by_tier[1].load(Ordering::Relaxed),
                self.executed_by_tier[2].load(Ordering::Relaxed),
            ],
        }
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SchedulerMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerMetricsSnapshot {
    /// Tasks appended
    pub tasks_enqueued: u64,
    /// Tasks executed (including panicked ones)
    pub tasks_executed: u64,
    /// Tasks that panicked
    pub tasks_panicked: u64,
    /// Drain passes started
    pub drains: u64,
    /// Drain passes stopped by a pacing limit
    pub budget_yields: u64,
    /// Frame pulses received
    pub frame_pulses: u64,
    /// Idle windows received
    pub idle_windows: u64,
    /// Deferral jobs issued
    pub deferrals: u64,
    /// Completed queue batches
    pub batches_completed: u64,
    /// Executions per tier, most urgent first
    pub executed_by_tier: [u64; 3],
}

impl SchedulerMetricsSnapshot {
    /// Executions recorded for one tier
    #[must_use]
    pub fn executed(&self, priority: Priority) -> u64 {
        self.executed_by_tier[priority.index()]
    }

    /// Tasks enqueued but not yet executed
    #[must_use]
    pub fn backlog(&self) -> u64 {
        self.tasks_enqueued.saturating_sub(self.tasks_executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = SchedulerMetrics::new();

        metrics.record_enqueue(Priority::High);
        metrics.record_enqueue(Priority::Low);
        metrics.record_execution(Priority::High, false);
        metrics.record_execution(Priority::Low, true);
        metrics.record_budget_yield(Priority::Low);
        metrics.record_frame_pulse();
        metrics.record_idle_window();
        metrics.record_deferral();
        metrics.record_drain();
        metrics.record_batch_complete();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_enqueued, 2);
        assert_eq!(snapshot.tasks_executed, 2);
        assert_eq!(snapshot.tasks_panicked, 1);
        assert_eq!(snapshot.budget_yields, 1);
        assert_eq!(snapshot.frame_pulses, 1);
        assert_eq!(snapshot.idle_windows, 1);
        assert_eq!(snapshot.deferrals, 1);
        assert_eq!(snapshot.drains, 1);
        assert_eq!(snapshot.batches_completed, 1);
        assert_eq!(snapshot.executed(Priority::High), 1);
        assert_eq!(snapshot.executed(Priority::Critical), 0);
        assert_eq!(snapshot.backlog(), 0);
    }

    #[test]
    fn test_uptime() {
        let metrics = SchedulerMetrics::default();
        assert!(metrics.uptime_seconds() >= 0.0);
    }
}
