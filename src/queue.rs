//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Caller-facing task queues
//!
//! A [`Queue`] is an ordered container of fire-and-forget tasks at one
//! [`Priority`]. Every queue of a tier shares that tier's lane, so pacing is a
//! property of the tier and not of the queue. What a queue owns is its FIFO
//! sequence, its live `size` and its pending completion signals.
//!
//! ```
//! use frame_pulse::{ManualHost, PacingConfig, Priority, Scheduler};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let host = ManualHost::new();
//! let scheduler = Scheduler::new(host.environment(), PacingConfig::default()).unwrap();
//! let queue = scheduler.queue(Priority::Critical);
//! let ran = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..3 {
//!     let ran = ran.clone();
//!     queue.add(move || {
//!         ran.fetch_add(1, Ordering::SeqCst);
//!     });
//! }
//!
//! let mut done = queue.processing();
//! host.run_jobs_until(|| done.is_complete());
//! assert_eq!(ran.load(Ordering::SeqCst), 3);
//! assert_eq!(queue.size(), 0);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::priority::Priority;
use crate::scheduler::Scheduler;

/// Opaque unit of work
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of a queue, unique per scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u64);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue-{}", self.0)
    }
}

struct QueueState {
    tasks: VecDeque<Task>,
    /// Senders of outstanding completion signals
    waiters: Vec<oneshot::Sender<()>>,
    /// Present in its lane's active list
    enlisted: bool,
}

/// Shared state of a queue, referenced by the queue handles and by its lane
pub(crate) struct QueueCore {
    id: QueueId,
    priority: Priority,
    state: Mutex<QueueState>,
    /// Mirrors `state.tasks.len()` for lock-free reads
    size: AtomicUsize,
}

impl QueueCore {
    pub(crate) fn new(id: QueueId, priority: Priority) -> Self {
        Self {
            id,
            priority,
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                waiters: Vec::new(),
                enlisted: false,
            }),
            size: AtomicUsize::new(0),
        }
    }

    pub(crate) fn id(&self) -> QueueId {
        self.id
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Appends a task. Returns `true` when the queue must be enlisted in its
    /// lane. Call with the lanes lock held.
    pub(crate) fn push_task(&self, task: Task) -> bool {
        let mut state = self.state.lock();
        state.tasks.push_back(task);
        self.size.fetch_add(1, Ordering::AcqRel);

        let enlist = !state.enlisted;
        state.enlisted = true;
        enlist
    }

    /// Pops the front task, decrementing `size` before the task runs. An empty
    /// queue is marked as no longer enlisted. Call with the lanes lock held.
    pub(crate) fn pop_task(&self) -> Option<Task> {
        let mut state = self.state.lock();
        match state.tasks.pop_front() {
            Some(task) => {
                self.size.fetch_sub(1, Ordering::AcqRel);
                Some(task)
            }
            None => {
                state.enlisted = false;
                None
            }
        }
    }

    /// Takes every outstanding completion signal if the queue is empty
    pub(crate) fn take_waiters_if_empty(&self) -> Vec<oneshot::Sender<()>> {
        let mut state = self.state.lock();
        if state.tasks.is_empty() {
            std::mem::take(&mut state.waiters)
        } else {
            Vec::new()
        }
    }

    /// Registers a completion signal. `None` when the queue is already empty.
    fn register_waiter(&self) -> Option<oneshot::Receiver<()>> {
        let mut state = self.state.lock();
        if state.tasks.is_empty() {
            return None;
        }

        let (sender, receiver) = oneshot::channel();
        state.waiters.push(sender);
        Some(receiver)
    }
}

/// FIFO container of tasks at one priority tier
///
/// Cloning a `Queue` yields another handle to the same sequence.
#[derive(Clone)]
pub struct Queue {
    core: Arc<QueueCore>,
    scheduler: Scheduler,
}

impl Queue {
    /// New queue on the process-wide scheduler. The first queue created in a
    /// process probes the environment (see [`Scheduler::global`]).
    #[must_use]
    pub fn new(priority: Priority) -> Self {
        Scheduler::global().queue(priority)
    }

    pub(crate) fn from_parts(core: Arc<QueueCore>, scheduler: Scheduler) -> Self {
        Self { core, scheduler }
    }

    /// Appends `task`. It runs exactly once, after every task added to this
    /// queue before it and after all pending work of more urgent tiers.
    pub fn add<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.scheduler.enqueue(&self.core, Box::new(task));
    }

    /// Tasks added but not yet started
    #[must_use]
    pub fn size(&self) -> usize {
        self.core.size()
    }

    /// `size() == 0`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Tier of this queue
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.core.priority()
    }

    /// Identifier of this queue
    #[must_use]
    pub fn id(&self) -> QueueId {
        self.core.id()
    }

    /// Completion signal for the current batch.
    ///
    /// Resolves immediately if the queue is empty. Otherwise it resolves once
    /// the queue next becomes empty and the task that emptied it has returned,
    /// so tasks added before that point are included.
    #[must_use]
    pub fn processing(&self) -> Processing {
        Processing {
            receiver: self.core.register_waiter(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.core.id)
            .field("priority", &self.core.priority)
            .field("size", &self.size())
            .finish()
    }
}

/// Future returned by [`Queue::processing`]
///
/// Resolves exactly once. Finding it still pending counts as the caller
/// waiting: a headless scheduler parked after an earlier batch completed
/// resumes draining at that point.
#[derive(Debug)]
#[must_use = "a completion signal does nothing unless polled"]
pub struct Processing {
    receiver: Option<oneshot::Receiver<()>>,
    scheduler: Scheduler,
}

impl Processing {
    /// Non-blocking check, for hosts that drive the scheduler by hand
    pub fn is_complete(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return true;
        };

        match receiver.try_recv() {
            Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                self.receiver = None;
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => {
                self.scheduler.caller_waiting();
                false
            }
        }
    }
}

impl Future for Processing {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(());
        };

        match Pin::new(receiver).poll(cx) {
            Poll::Ready(_) => {
                self.receiver = None;
                Poll::Ready(())
            }
            Poll::Pending => {
                self.scheduler.caller_waiting();
                Poll::Pending
            }
        }
    }
}
