//! Tier lanes
//!
//! One lane per tier per scheduler. A lane tracks which queues of its tier
//! have pending work (in order of their first pending task), how many tasks
//! are pending across them, and where it is in its scheduling cycle:
//!
//! ```text
//!            add (lane idle)          backend callback
//!   Idle ─────────────────────► Scheduled ─────────────► Draining
//!    ▲                              ▲                       │
//!    │          empty               │   pacing limit hit,   │
//!    └──────────────────────────────┼── tasks left ◄────────┘
//!                                   └───────────────────────┘
//! ```
//!
//! A lane never runs tasks itself; the scheduler's drain loop pops from it.
//! The FIFO position inside each queue is the only resume point needed
//! between drain passes.

#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::host::IdleDeadline;
use crate::priority::Priority;
use crate::queue::{QueueCore, Task};
use crate::timing::Clock;

/// Scheduling state of a tier lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneState {
    /// No pending work, no outstanding backend request
    Idle,
    /// A backend request is outstanding
    Scheduled,
    /// A drain pass is running
    Draining,
}

/// What started a drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrainTrigger {
    /// Immediate deferral (Critical lane, or the headless pump)
    Deferral,
    /// Frame pulse
    FramePulse,
    /// Idle window
    IdleWindow,
}

/// Why a drain pass stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Nothing left at or above the drained tier
    Drained,
    /// The pacing limit was reached with work left
    BudgetExhausted,
    /// A completion signal resolved and the pass ceded control
    BatchCompleted,
}

/// Summary of one drain pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// What started the pass
    pub trigger: DrainTrigger,
    /// Least urgent tier the pass was allowed to run
    pub ceiling: Priority,
    /// Tasks run, panicked ones included
    pub executed: usize,
    /// Tasks that panicked
    pub panicked: usize,
    /// Queue batches that completed during the pass
    pub batches_completed: usize,
    /// Why the pass stopped
    pub stop: StopReason,
}

impl DrainReport {
    pub(crate) fn new(trigger: DrainTrigger, ceiling: Priority) -> Self {
        Self {
            trigger,
            ceiling,
            executed: 0,
            panicked: 0,
            batches_completed: 0,
            stop: StopReason::Drained,
        }
    }
}

/// Pacing limit of a drain pass, checked before every task
pub(crate) enum Budget<'a> {
    /// Run until empty
    Unbounded,
    /// Run while less than `allowance` has elapsed since `started`
    Frame { started: Duration, allowance: Duration },
    /// Run while the idle deadline has more than `margin` left
    Idle {
        deadline: &'a dyn IdleDeadline,
        margin: Duration,
    },
    /// Run at most `remaining` more tasks
    Chunk { remaining: usize, end_on_batch: bool },
}

impl Budget<'_> {
    pub(crate) fn allows_next(&self, clock: &dyn Clock) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Frame { started, allowance } => clock.elapsed_since(*started) < *allowance,
            Self::Idle { deadline, margin } => {
                let remaining = deadline.time_remaining();
                !remaining.is_zero() && remaining >= *margin
            }
            Self::Chunk { remaining, .. } => *remaining > 0,
        }
    }

    pub(crate) fn record_task(&mut self) {
        if let Self::Chunk { remaining, .. } = self {
            *remaining = remaining.saturating_sub(1);
        }
    }

    pub(crate) fn ends_on_batch_complete(&self) -> bool {
        matches!(self, Self::Chunk { end_on_batch: true, .. })
    }
}

/// Per-tier ordering lane
pub(crate) struct Lane {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    priority: Priority,
    state: LaneState,
    /// Queues with pending tasks, in order of first pending task
    active: VecDeque<Arc<QueueCore>>,
    /// Pending tasks across `active`
    pending: usize,
}

impl Lane {
    pub(crate) fn new(priority: Priority) -> Self {
        Self {
            priority,
            state: LaneState::Idle,
            active: VecDeque::new(),
            pending: 0,
        }
    }

    pub(crate) fn state(&self) -> LaneState {
        self.state
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    /// Records one appended task. `enlist` carries the queue when it had no
    /// pending tasks before. Returns `true` when the lane woke up and must
    /// request a slot.
    pub(crate) fn push(&mut self, enlist: Option<Arc<QueueCore>>) -> bool {
        if let Some(queue) = enlist {
            self.active.push_back(queue);
        }
        self.pending += 1;

        if self.state == LaneState::Idle {
            self.state = LaneState::Scheduled;

            #[cfg(feature = "tracing")]
            tracing::debug!(tier = %self.priority, "Lane scheduled");

            true
        } else {
            false
        }
    }

    pub(crate) fn begin_drain(&mut self) {
        self.state = LaneState::Draining;
    }

    /// Ends a drain pass. Returns `true` when work is left and the lane must
    /// request another slot.
    pub(crate) fn settle(&mut self) -> bool {
        if self.pending > 0 {
            self.state = LaneState::Scheduled;

            #[cfg(feature = "tracing")]
            tracing::debug!(tier = %self.priority, pending = self.pending, "Lane yielded with work left");

            true
        } else {
            self.state = LaneState::Idle;

            #[cfg(feature = "tracing")]
            tracing::trace!(tier = %self.priority, "Lane idle");

            false
        }
    }

    /// Pops the front task of the first queue that has one. Queues found
    /// empty are dropped from the active list.
    pub(crate) fn pop_front_task(&mut self) -> Option<(Arc<QueueCore>, Task)> {
        loop {
            let queue = self.active.front()?.clone();
            match queue.pop_task() {
                Some(task) => {
                    self.pending -= 1;
                    return Some((queue, task));
                }
                None => {
                    self.active.pop_front();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueId;

    fn core(id: u64) -> Arc<QueueCore> {
        Arc::new(QueueCore::new(QueueId(id), Priority::Low))
    }

    fn push(lane: &mut Lane, queue: &Arc<QueueCore>) -> bool {
        let enlist = queue.push_task(Box::new(|| {}));
        lane.push(enlist.then(|| queue.clone()))
    }

    #[test]
    fn test_lane_state_cycle() {
        let mut lane = Lane::new(Priority::Low);
        let queue = core(1);
        assert_eq!(lane.state(), LaneState::Idle);

        assert!(push(&mut lane, &queue), "first task wakes the lane");
        assert!(!push(&mut lane, &queue), "second task does not");
        assert_eq!(lane.state(), LaneState::Scheduled);
        assert_eq!(lane.pending(), 2);

        lane.begin_drain();
        assert!(lane.pop_front_task().is_some());
        assert!(lane.settle(), "work left");
        assert_eq!(lane.state(), LaneState::Scheduled);

        lane.begin_drain();
        assert!(lane.pop_front_task().is_some());
        assert!(lane.pop_front_task().is_none());
        assert!(!lane.settle());
        assert_eq!(lane.state(), LaneState::Idle);
    }

    #[test]
    fn test_queues_visited_in_first_pending_order() {
        let mut lane = Lane::new(Priority::Low);
        let first = core(1);
        let second = core(2);

        push(&mut lane, &second);
        push(&mut lane, &first);
        push(&mut lane, &second);

        let order: Vec<_> = std::iter::from_fn(|| lane.pop_front_task().map(|(q, _)| q.id())).collect();
        assert_eq!(order, vec![QueueId(2), QueueId(2), QueueId(1)]);
        assert_eq!(lane.pending(), 0);
    }

    #[test]
    fn test_budget_limits() {
        let clock = crate::host::ManualHost::new();

        let frame = Budget::Frame {
            started: Duration::ZERO,
            allowance: Duration::from_millis(5),
        };
        assert!(frame.allows_next(&clock));
        clock.advance(Duration::from_millis(5));
        assert!(!frame.allows_next(&clock));

        let mut chunk = Budget::Chunk {
            remaining: 1,
            end_on_batch: true,
        };
        assert!(chunk.allows_next(&clock));
        chunk.record_task();
        assert!(!chunk.allows_next(&clock));
        assert!(chunk.ends_on_batch_complete());
        assert!(!Budget::Unbounded.ends_on_batch_complete());
    }

    #[test]
    fn test_idle_budget_respects_margin() {
        struct Fixed(Duration);
        impl IdleDeadline for Fixed {
            fn time_remaining(&self) -> Duration {
                self.0
            }
        }

        let clock = crate::host::ManualHost::new();
        let margin = Duration::from_millis(1);

        let plenty = Fixed(Duration::from_millis(10));
        assert!(Budget::Idle { deadline: &plenty, margin }.allows_next(&clock));

        let tight = Fixed(Duration::from_micros(500));
        assert!(!Budget::Idle { deadline: &tight, margin }.allows_next(&clock));

        let none = Fixed(Duration::ZERO);
        assert!(!Budget::Idle {
            deadline: &none,
            margin: Duration::ZERO
        }
        .allows_next(&clock));
    }
}
