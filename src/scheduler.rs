//! Priority-tiered cooperative scheduler
//!
//! The scheduler owns the three tier lanes and the backend chosen for the
//! host. Queues hand it tasks; it asks the backend for a slot whenever a lane
//! wakes up, and drains lanes from the callbacks the backend delivers:
//!
//! - Critical work drains to exhaustion on the next immediate deferral
//! - High work drains to exhaustion on the next frame pulse
//! - Low work drains in idle windows (full backend) or inside the frame pulse
//!   after High, within the frame budget (frame-only backend)
//! - Without frame pulses, one pump job drains every tier in strict tier order,
//!   in chunks, re-deferring itself between chunks
//!
//! Every drain pass pops the most urgent pending task first, so a pass for a
//! less urgent tier also runs any more urgent work added in the meantime. That
//! keeps the global tier order intact at every suspension point. In particular
//! an idle window that opens while High work still waits for its pulse runs
//! that High work before any Low task; the pulse then finds the lane empty.
//!
//! A headless chunk that resolves a completion signal parks the pump instead
//! of re-deferring it. The pump resumes once the awaiting caller waits on a
//! signal that is still pending, or after `handoff_timeout`, so the caller
//! observes the state at completion before lower tiers continue.
//!
//! Exactly one drain pass runs at a time. Tasks run with no scheduler lock
//! held and may add to any queue, including one being drained.

#![forbid(unsafe_code)]
#![allow(clippy::significant_drop_tightening)] // Lane guards are held for a single pop

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, trace, warn};

use crate::backend::{Backend, BackendKind, Pacing};
use crate::config::{ConfigError, PacingConfig};
use crate::hooks::HookRegistry;
use crate::host::{Environment, IdleDeadline};
use crate::lane::{Budget, DrainReport, DrainTrigger, Lane, LaneState, StopReason};
use crate::metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
use crate::priority::Priority;
use crate::probe::Capabilities;
use crate::queue::{Queue, QueueCore, QueueId, Task};
use crate::timing::Clock;

/// Process-wide scheduler
static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// Scheduler construction errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The process-wide scheduler exists already
    #[error("process-wide scheduler is already initialized")]
    AlreadyInitialized,

    /// The pacing configuration failed validation
    #[error("invalid pacing configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Headless pump cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pump {
    /// No pump job outstanding
    Idle,
    /// A pump job is deferred
    Requested,
    /// Waiting for the caller of a completed batch; `epoch` tags the timer
    Parked { epoch: u64 },
}

/// Lane table plus the outstanding-request flags shared between lanes
struct Lanes {
    lanes: [Lane; 3],
    /// One frame callback serves High and (frame-only) Low
    frame_requested: bool,
    /// One pump job serves every tier in fallback mode
    pump: Pump,
    park_epoch: u64,
}

impl Lanes {
    fn new() -> Self {
        Self {
            lanes: Priority::ALL.map(Lane::new),
            frame_requested: false,
            pump: Pump::Idle,
            park_epoch: 0,
        }
    }

    fn lane(&self, priority: Priority) -> &Lane {
        &self.lanes[priority.index()]
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut Lane {
        &mut self.lanes[priority.index()]
    }

    fn has_pending(&self, ceiling: Priority) -> bool {
        tiers_through(ceiling).any(|p| self.lane(p).pending() > 0)
    }

    /// Most urgent pending task at or above `ceiling`
    fn pop_next(&mut self, ceiling: Priority) -> Option<(Arc<QueueCore>, Task)> {
        tiers_through(ceiling).find_map(|p| self.lane_mut(p).pop_front_task())
    }
}

/// Tiers from most urgent down to and including `ceiling`
fn tiers_through(ceiling: Priority) -> impl Iterator<Item = Priority> {
    ceiling
        .more_urgent()
        .iter()
        .copied()
        .chain(std::iter::once(ceiling))
}

struct Shared {
    backend: Backend,
    capabilities: Capabilities,
    clock: Arc<dyn Clock>,
    config: PacingConfig,
    lanes: Mutex<Lanes>,
    /// Held for the duration of a drain pass
    gate: ReentrantMutex<()>,
    hooks: HookRegistry,
    metrics: SchedulerMetrics,
    next_queue_id: AtomicU64,
}

/// Handle to a scheduler instance
///
/// Cheap to clone; all clones drive the same lanes. Most programs use the
/// process-wide instance through [`Queue::new`]. Separate instances are useful
/// for embedding and tests.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Probes `env`, selects a backend and builds a scheduler
    pub fn new(env: Environment, config: PacingConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::build(&env, config))
    }

    /// Scheduler on a headless environment with default pacing
    #[must_use]
    pub fn headless() -> Self {
        Self::build(&Environment::headless(), PacingConfig::default())
    }

    fn build(env: &Environment, config: PacingConfig) -> Self {
        let (backend, capabilities) = Backend::from_environment(env);

        #[cfg(feature = "tracing")]
        {
            if !capabilities.is_consistent() {
                warn!("Idle windows offered without frame pulses, ignoring them");
            }
            info!(
                backend = %backend.kind(),
                clock = env.clock().name(),
                frame_budget_us = config.frame_budget.as_micros() as u64,
                chunk_size = config.chunk_size,
                "Scheduler created"
            );
        }

        Self {
            shared: Arc::new(Shared {
                backend,
                capabilities,
                clock: env.clock().clone(),
                config,
                lanes: Mutex::new(Lanes::new()),
                gate: ReentrantMutex::new(()),
                hooks: HookRegistry::new(),
                metrics: SchedulerMetrics::new(),
                next_queue_id: AtomicU64::new(1),
            }),
        }
    }

    /// Installs the process-wide scheduler. Fails if one exists already,
    /// including one created implicitly by [`Queue::new`].
    pub fn install(env: Environment, config: PacingConfig) -> Result<Self, SchedulerError> {
        if GLOBAL.get().is_some() {
            return Err(SchedulerError::AlreadyInitialized);
        }

        let scheduler = Self::new(env, config)?;
        GLOBAL
            .set(scheduler.clone())
            .map_err(|_| SchedulerError::AlreadyInitialized)?;

        #[cfg(feature = "tracing")]
        info!(backend = %scheduler.backend(), "Process-wide scheduler installed");

        Ok(scheduler)
    }

    /// The process-wide scheduler, created on a headless environment on first
    /// use unless [`install`](Self::install) ran before
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.get_or_init(Self::headless).clone()
    }

    /// New empty queue at `priority`
    #[must_use]
    pub fn queue(&self, priority: Priority) -> Queue {
        let id = QueueId(self.shared.next_queue_id.fetch_add(1, Ordering::Relaxed));
        Queue::from_parts(Arc::new(QueueCore::new(id, priority)), self.clone())
    }

    /// Selected backend
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.shared.backend.kind()
    }

    /// Capabilities found when the environment was probed
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.shared.capabilities
    }

    /// Pacing configuration
    #[must_use]
    pub fn config(&self) -> &PacingConfig {
        &self.shared.config
    }

    /// Current state of a tier lane
    #[must_use]
    pub fn lane_state(&self, priority: Priority) -> LaneState {
        self.shared.lanes.lock().lane(priority).state()
    }

    /// Tasks pending across every queue of a tier
    #[must_use]
    pub fn pending(&self, priority: Priority) -> usize {
        self.shared.lanes.lock().lane(priority).pending()
    }

    /// Hook registry
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.shared.hooks
    }

    /// Counter snapshot
    #[must_use]
    pub fn metrics(&self) -> SchedulerMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub(crate) fn enqueue(&self, queue: &Arc<QueueCore>, task: Task) {
        let priority = queue.priority();
        let wake = {
            let mut lanes = self.shared.lanes.lock();
            let enlist = queue.push_task(task);
            lanes.lane_mut(priority).push(enlist.then(|| queue.clone()))
        };

        self.shared.metrics.record_enqueue(priority);
        if wake {
            self.request_slot(priority);
        }
    }

    /* Backend requests */

    fn request_slot(&self, priority: Priority) {
        match self.shared.backend.kind().pacing(priority) {
            Pacing::Immediate => {
                let scheduler = self.clone();
                self.shared.metrics.record_deferral();
                self.shared
                    .backend
                    .defer(Box::new(move || scheduler.on_deferral(priority)));
            }
            Pacing::FramePulse | Pacing::FrameBudget => self.request_frame(),
            Pacing::IdleWindow => self.request_idle(),
            Pacing::Chunked => self.request_pump(),
        }
    }

    fn request_frame(&self) {
        let Some(frame) = self.shared.backend.frame_pulse() else {
            return;
        };
        {
            let mut lanes = self.shared.lanes.lock();
            if lanes.frame_requested {
                return;
            }
            lanes.frame_requested = true;
        }

        let scheduler = self.clone();
        frame.request_frame(Box::new(move |timestamp| scheduler.on_frame_pulse(timestamp)));
    }

    fn request_idle(&self) {
        if let Some(idle) = self.shared.backend.idle_time() {
            let scheduler = self.clone();
            idle.request_idle(Box::new(move |deadline: &dyn IdleDeadline| scheduler.on_idle_window(deadline)));
        }
    }

    /// Defers the pump unless one is deferred already. A parked pump is left
    /// alone; its resumption serves every tier.
    fn request_pump(&self) {
        {
            let mut lanes = self.shared.lanes.lock();
            if lanes.pump != Pump::Idle {
                return;
            }
            lanes.pump = Pump::Requested;
        }

        let scheduler = self.clone();
        self.shared.metrics.record_deferral();
        self.shared.backend.defer(Box::new(move || scheduler.on_pump()));
    }

    /// Parks the pump ahead of resolving completion signals, so a caller
    /// woken by them finds it parked
    fn park_pump(&self) {
        let mut lanes = self.shared.lanes.lock();
        lanes.park_epoch += 1;
        lanes.pump = Pump::Parked {
            epoch: lanes.park_epoch,
        };
    }

    /// Resumes a parked pump. With `epoch`, only the park it tags.
    fn resume_pump(&self, epoch: Option<u64>) {
        {
            let mut lanes = self.shared.lanes.lock();
            match (lanes.pump, epoch) {
                (Pump::Parked { .. }, None) => {}
                (Pump::Parked { epoch: parked }, Some(epoch)) if parked == epoch => {}
                _ => return,
            }
            lanes.pump = Pump::Idle;
        }

        #[cfg(feature = "tracing")]
        trace!(timer = epoch.is_some(), "Pump resumed");

        self.request_pump();
    }

    /// Called when a caller finds a completion signal still pending
    pub(crate) fn caller_waiting(&self) {
        if self.backend() == BackendKind::Fallback {
            self.resume_pump(None);
        }
    }

    /* Backend callbacks */

    fn on_deferral(&self, priority: Priority) {
        let _gate = self.shared.gate.lock();
        if self.begin_drain(priority) {
            let report = self.drain(DrainTrigger::Deferral, priority, Budget::Unbounded);
            self.settle(priority, report.stop);
        }
    }

    fn on_frame_pulse(&self, timestamp: Duration) {
        self.shared.lanes.lock().frame_requested = false;
        self.shared.metrics.record_frame_pulse();

        #[cfg(feature = "tracing")]
        trace!(?timestamp, "Frame pulse");
        #[cfg(not(feature = "tracing"))]
        let _ = timestamp;

        let _gate = self.shared.gate.lock();
        let started = self.shared.clock.now();

        if self.begin_drain(Priority::High) {
            let report = self.drain(DrainTrigger::FramePulse, Priority::High, Budget::Unbounded);
            self.settle(Priority::High, report.stop);
        }

        if self.backend() == BackendKind::FrameOnly && self.begin_drain(Priority::Low) {
            let budget = Budget::Frame {
                started,
                allowance: self.shared.config.frame_budget,
            };
            let report = self.drain(DrainTrigger::FramePulse, Priority::Low, budget);
            self.settle(Priority::Low, report.stop);
        }
    }

    fn on_idle_window(&self, deadline: &dyn IdleDeadline) {
        self.shared.metrics.record_idle_window();

        #[cfg(feature = "tracing")]
        trace!(remaining = ?deadline.time_remaining(), "Idle window");

        let _gate = self.shared.gate.lock();
        if self.begin_drain(Priority::Low) {
            let budget = Budget::Idle {
                deadline,
                margin: self.shared.config.idle_margin,
            };
            let report = self.drain(DrainTrigger::IdleWindow, Priority::Low, budget);
            self.settle(Priority::Low, report.stop);
        }
    }

    fn on_pump(&self) {
        {
            let mut lanes = self.shared.lanes.lock();
            if matches!(lanes.pump, Pump::Parked { .. }) {
                // Superseded by a park; resuming defers a fresh job
                return;
            }
            lanes.pump = Pump::Idle;
        }

        let _gate = self.shared.gate.lock();
        {
            let mut lanes = self.shared.lanes.lock();
            for lane in &mut lanes.lanes {
                if lane.state() == LaneState::Scheduled {
                    lane.begin_drain();
                }
            }
        }

        let budget = Budget::Chunk {
            remaining: self.shared.config.chunk_size,
            end_on_batch: self.shared.config.yield_on_batch_complete,
        };
        let report = self.drain(DrainTrigger::Deferral, Priority::Low, budget);

        let next = {
            let mut lanes = self.shared.lanes.lock();
            let mut work_left = false;
            for priority in Priority::ALL {
                if lanes.lane_mut(priority).settle() {
                    work_left = true;
                    if report.stop == StopReason::BudgetExhausted {
                        self.shared.metrics.record_budget_yield(priority);
                    }
                }
            }

            let pump = lanes.pump;
            match pump {
                Pump::Parked { epoch } if work_left => Some(Some(epoch)),
                Pump::Parked { .. } => {
                    lanes.pump = Pump::Idle;
                    None
                }
                _ if work_left => Some(None),
                _ => None,
            }
        };

        match next {
            Some(Some(epoch)) => {
                #[cfg(feature = "tracing")]
                debug!(epoch, timeout = ?self.shared.config.handoff_timeout, "Pump parked for awaiting caller");

                let scheduler = self.clone();
                self.shared.backend.defer_after(
                    self.shared.config.handoff_timeout,
                    Box::new(move || scheduler.resume_pump(Some(epoch))),
                );
            }
            Some(None) => self.request_pump(),
            None => {}
        }
    }

    /* Drain passes */

    /// Moves a scheduled lane to draining. `false` if the lane has nothing
    /// scheduled, e.g. a callback arriving after its work drained elsewhere.
    fn begin_drain(&self, priority: Priority) -> bool {
        let mut lanes = self.shared.lanes.lock();
        let lane = lanes.lane_mut(priority);
        if lane.state() == LaneState::Scheduled {
            lane.begin_drain();
            true
        } else {
            false
        }
    }

    /// Ends a lane's drain pass and requests another slot if work is left
    fn settle(&self, priority: Priority, stop: StopReason) {
        let reschedule = self.shared.lanes.lock().lane_mut(priority).settle();
        if reschedule {
            if stop == StopReason::BudgetExhausted {
                self.shared.metrics.record_budget_yield(priority);
            }
            self.request_slot(priority);
        }
    }

    /// Runs tasks at or above `ceiling`, most urgent first, until nothing is
    /// left or `budget` says stop. Call with the gate held.
    fn drain(&self, trigger: DrainTrigger, ceiling: Priority, mut budget: Budget<'_>) -> DrainReport {
        let shared = &*self.shared;
        let mut report = DrainReport::new(trigger, ceiling);

        shared.metrics.record_drain();
        shared.hooks.on_drain_start(trigger, ceiling);

        loop {
            let next = {
                let mut lanes = shared.lanes.lock();
                if !lanes.has_pending(ceiling) {
                    report.stop = StopReason::Drained;
                    break;
                }
                if !budget.allows_next(shared.clock.as_ref()) {
                    report.stop = StopReason::BudgetExhausted;
                    break;
                }
                lanes.pop_next(ceiling)
            };

            let Some((queue, task)) = next else {
                report.stop = StopReason::Drained;
                break;
            };

            if self.run_task(&queue, task) {
                report.panicked += 1;
            }
            report.executed += 1;
            budget.record_task();

            if self.finish_task(&queue, budget.ends_on_batch_complete()) {
                report.batches_completed += 1;
                if budget.ends_on_batch_complete() {
                    report.stop = StopReason::BatchCompleted;
                    break;
                }
            }
        }

        #[cfg(feature = "tracing")]
        debug!(
            trigger = ?report.trigger,
            ceiling = %report.ceiling,
            executed = report.executed,
            panicked = report.panicked,
            stop = ?report.stop,
            "Drain pass finished"
        );

        shared.hooks.on_drain_end(&report);
        report
    }

    /// Runs one task in isolation. Returns `true` if it panicked.
    fn run_task(&self, queue: &QueueCore, task: Task) -> bool {
        let priority = queue.priority();
        let result = panic::catch_unwind(AssertUnwindSafe(task));
        let panicked = result.is_err();

        if let Err(payload) = result {
            let message = panic_message(payload.as_ref());

            #[cfg(feature = "tracing")]
            error!(tier = %priority, queue = %queue.id(), message = %message, "Task panicked");

            self.shared.hooks.on_task_panic(priority, queue.id(), &message);
        }

        self.shared.metrics.record_execution(priority, panicked);
        panicked
    }

    /// Resolves the queue's completion signals if it is now empty, parking
    /// the pump first when `park` is set. Returns `true` if any were resolved.
    fn finish_task(&self, queue: &QueueCore, park: bool) -> bool {
        let waiters = queue.take_waiters_if_empty();
        if waiters.is_empty() {
            return false;
        }
        if park {
            self.park_pump();
        }

        for waiter in waiters {
            // Receiver may be gone
            let _ = waiter.send(());
        }

        #[cfg(feature = "tracing")]
        debug!(tier = %queue.priority(), queue = %queue.id(), "Batch complete");

        self.shared.metrics.record_batch_complete();
        self.shared.hooks.on_batch_complete(queue.priority(), queue.id());
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lanes = self.shared.lanes.lock();
        f.debug_struct("Scheduler")
            .field("backend", &self.shared.backend.kind())
            .field("critical", &lanes.lane(Priority::Critical).pending())
            .field("high", &lanes.lane(Priority::High).pending())
            .field("low", &lanes.lane(Priority::Low).pending())
            .finish_non_exhaustive()
    }
}
