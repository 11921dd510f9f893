//! Deterministic, manually driven host
//!
//! `ManualHost` implements every host primitive on top of a virtual clock and
//! three queues of pending callbacks. Nothing happens until the owner calls
//! [`pulse`](ManualHost::pulse), [`idle`](ManualHost::idle) or
//! [`run_jobs`](ManualHost::run_jobs), which makes it suitable for embedding
//! the scheduler in a custom loop and for reproducible tests. Delayed jobs
//! join the job queue once [`advance`](ManualHost::advance) reaches their
//! deadline.
//!
//! ```
//! use frame_pulse::{ManualHost, PacingConfig, Priority, Scheduler};
//!
//! let host = ManualHost::new();
//! let scheduler = Scheduler::new(host.frame_only_environment(), PacingConfig::default()).unwrap();
//! let queue = scheduler.queue(Priority::High);
//!
//! queue.add(|| {});
//! assert_eq!(queue.size(), 1);
//!
//! host.pulse();
//! assert_eq!(queue.size(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Deferral, Environment, FrameCallback, FramePulse, IdleCallback, IdleDeadline, IdleTime, Job};
use crate::timing::Clock;

#[derive(Default)]
struct ManualState {
    now: Duration,
    frames: Vec<FrameCallback>,
    idles: Vec<IdleCallback>,
    jobs: VecDeque<Job>,
    /// Delayed jobs, sorted by virtual deadline
    timers: VecDeque<(Duration, Job)>,
    pulses: u64,
}

/// Simulated host with a virtual clock
#[derive(Clone, Default)]
pub struct ManualHost {
    state: Arc<Mutex<ManualState>>,
}

impl ManualHost {
    /// New host at virtual time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment exposing frame pulses and idle windows (full backend)
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.frame_only_environment().with_idle_time(Arc::new(self.clone()))
    }

    /// Environment exposing frame pulses only
    #[must_use]
    pub fn frame_only_environment(&self) -> Environment {
        self.headless_environment().with_frame_pulse(Arc::new(self.clone()))
    }

    /// Environment exposing neither frame pulses nor idle windows
    #[must_use]
    pub fn headless_environment(&self) -> Environment {
        Environment::with_deferral_only(Arc::new(self.clone())).with_clock(Arc::new(self.clone()))
    }

    /// Advance the virtual clock. Delayed jobs that fall due are appended to
    /// the job queue in deadline order.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.now += by;

        let now = state.now;
        while state.timers.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, job)) = state.timers.pop_front() {
                state.jobs.push_back(job);
            }
        }
    }

    /// Frame callbacks waiting for the next pulse
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Idle callbacks waiting for the next idle window
    #[must_use]
    pub fn pending_idle(&self) -> usize {
        self.state.lock().idles.len()
    }

    /// Deferred jobs not yet run
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Delayed jobs whose deadline has not been reached
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Pulses delivered so far
    #[must_use]
    pub fn pulses(&self) -> u64 {
        self.state.lock().pulses
    }

    /// Runs the oldest deferred job. Returns `false` if there was none.
    pub fn run_next_job(&self) -> bool {
        let job = self.state.lock().jobs.pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs deferred jobs, including ones deferred meanwhile, until none are
    /// left. Returns the number run.
    pub fn run_jobs(&self) -> usize {
        self.run_jobs_until(|| false)
    }

    /// Runs deferred jobs until `done` returns `true` (checked before each job)
    /// or none are left. Returns the number run.
    ///
    /// This models an `await`: the caller's continuation runs as soon as the
    /// awaited condition holds, before any later job.
    pub fn run_jobs_until(&self, mut done: impl FnMut() -> bool) -> usize {
        let mut ran = 0;
        while !done() && self.run_next_job() {
            ran += 1;
        }
        ran
    }

    /// Delivers one frame pulse: flushes deferred jobs, then invokes every
    /// frame callback requested so far with the current virtual time, flushing
    /// jobs after each. Callbacks requested during the pulse wait for the next
    /// one. Returns the number of frame callbacks invoked.
    pub fn pulse(&self) -> usize {
        self.run_jobs();
        let (callbacks, timestamp) = {
            let mut state = self.state.lock();
            state.pulses += 1;
            (std::mem::take(&mut state.frames), state.now)
        };

        let fired = callbacks.len();
        for callback in callbacks {
            callback(timestamp);
            self.run_jobs();
        }
        fired
    }

    /// Delivers one idle window of length `window`, starting now. Returns the
    /// number of idle callbacks invoked.
    pub fn idle(&self, window: Duration) -> usize {
        self.run_jobs();
        let (callbacks, deadline) = {
            let mut state = self.state.lock();
            (std::mem::take(&mut state.idles), state.now + window)
        };

        let fired = callbacks.len();
        for callback in callbacks {
            let deadline = ManualDeadline {
                host: self.clone(),
                deadline,
            };
            callback(&deadline);
            self.run_jobs();
        }
        fired
    }
}

impl FramePulse for ManualHost {
    fn request_frame(&self, callback: FrameCallback) {
        self.state.lock().frames.push(callback);
    }
}

impl IdleTime for ManualHost {
    fn request_idle(&self, callback: IdleCallback) {
        self.state.lock().idles.push(callback);
    }
}

impl Deferral for ManualHost {
    fn defer(&self, job: Job) {
        self.state.lock().jobs.push_back(job);
    }

    fn defer_after(&self, delay: Duration, job: Job) {
        let mut state = self.state.lock();
        if delay.is_zero() {
            state.jobs.push_back(job);
            return;
        }

        let due = state.now + delay;
        let position = state.timers.partition_point(|(at, _)| *at <= due);
        state.timers.insert(position, (due, job));
    }
}

impl Clock for ManualHost {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualHost")
            .field("now", &state.now)
            .field("frames", &state.frames.len())
            .field("idles", &state.idles.len())
            .field("jobs", &state.jobs.len())
            .field("timers", &state.timers.len())
            .finish()
    }
}

/// Idle deadline measured against a [`ManualHost`]'s virtual clock
pub struct ManualDeadline {
    host: ManualHost,
    deadline: Duration,
}

impl IdleDeadline for ManualDeadline {
    fn time_remaining(&self) -> Duration {
        self.deadline.saturating_sub(self.host.now())
    }
}
