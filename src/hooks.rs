#![forbid(unsafe_code)]
#![allow(clippy::inline_always)] /* Called around every task */

/*
 *     ______   __  __     __         ______     ______
 *    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
 *    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
 *     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
 *      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
 *
 * Author: Colin MacRitchie / Ripple Group
 */

/* Observation hooks for lane drains */

use crate::lane::{DrainReport, DrainTrigger};
use crate::priority::Priority;
use crate::queue::QueueId;
use parking_lot::RwLock;
use std::sync::Arc;

/// Scheduler observation interface.
pub trait SchedulerHooks: Send + Sync {
    /// Called when a drain pass begins.
    fn on_drain_start(&self, trigger: DrainTrigger, ceiling: Priority);

    /// Called when a drain pass stops.
    fn on_drain_end(&self, report: &DrainReport);

    /// Called when a task panics. The drain continues with the next task.
    fn on_task_panic(&self, priority: Priority, queue: QueueId, message: &str);

    /// Called when a queue's pending batch drains and its completion signals resolve.
    fn on_batch_complete(&self, priority: Priority, queue: QueueId);
}

/// No-op `SchedulerHooks`
#[derive(Debug, Default)]
pub struct NullHooks;

impl SchedulerHooks for NullHooks {
    #[inline(always)]
    fn on_drain_start(&self, _trigger: DrainTrigger, _ceiling: Priority) {
        // No-op
    }

    #[inline(always)]
    fn on_drain_end(&self, _report: &DrainReport) {
        // No-op
    }

    #[inline(always)]
    fn on_task_panic(&self, _priority: Priority, _queue: QueueId, _message: &str) {
        // No-op
    }

    #[inline(always)]
    fn on_batch_complete(&self, _priority: Priority, _queue: QueueId) {
        // No-op
    }
}

/// Slot for the installed [`SchedulerHooks`], shared by every drain pass
///
/// ```
/// use std::sync::Arc;
/// use frame_pulse::{HookRegistry, NullHooks};
///
/// let registry = HookRegistry::new();
/// assert!(!registry.has_hooks());
///
/// registry.set_hooks(Arc::new(NullHooks));
/// assert!(registry.has_hooks());
/// assert!(registry.clear_hooks().is_some());
/// ```
pub struct HookRegistry {
    hooks: Arc<RwLock<Option<Arc<dyn SchedulerHooks>>>>,
}

impl HookRegistry {
    /// Registry with no hooks installed
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: Arc::new(RwLock::new(None)),
        }
    }

    /// Installs `hooks`, returning the ones they replace
    pub fn set_hooks(&self, hooks: Arc<dyn SchedulerHooks>) -> Option<Arc<dyn SchedulerHooks>> {
        self.hooks.write().replace(hooks)
    }

    /// Removes the installed hooks, returning them
    pub fn clear_hooks(&self) -> Option<Arc<dyn SchedulerHooks>> {
        self.hooks.write().take()
    }

    /* Clone the installed hooks out so no guard is held while they run */
    #[inline(always)]
    fn current(&self) -> Option<Arc<dyn SchedulerHooks>> {
        self.hooks.read().clone()
    }

    /// Forwards a drain start to the installed hooks
    #[inline(always)]
    pub fn on_drain_start(&self, trigger: DrainTrigger, ceiling: Priority) {
        if let Some(hooks) = self.current() {
            hooks.on_drain_start(trigger, ceiling);
        }
    }

    /// Forwards a drain report to the installed hooks
    #[inline(always)]
    pub fn on_drain_end(&self, report: &DrainReport) {
        if let Some(hooks) = self.current() {
            hooks.on_drain_end(report);
        }
    }

    /// Forwards a task panic to the installed hooks
    #[inline(always)]
    pub fn on_task_panic(&self, priority: Priority, queue: QueueId, message: &str) {
        if let Some(hooks) = self.current() {
            hooks.on_task_panic(priority, queue, message);
        }
    }

    /// Forwards a batch completion to the installed hooks
    #[inline(always)]
    pub fn on_batch_complete(&self, priority: Priority, queue: QueueId) {
        if let Some(hooks) = self.current() {
            hooks.on_batch_complete(priority, queue);
        }
    }

    /// Whether hooks are installed
    #[inline]
    #[must_use]
    pub fn has_hooks(&self) -> bool {
        self.hooks.read().is_some()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("has_hooks", &self.has_hooks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::StopReason;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHooks {
        drains: AtomicUsize,
        ends: AtomicUsize,
        panics: AtomicUsize,
        batches: AtomicUsize,
    }

    impl SchedulerHooks for CountingHooks {
        fn on_drain_start(&self, _trigger: DrainTrigger, _ceiling: Priority) {
            self.drains.fetch_add(1, Ordering::Relaxed);
        }

        fn on_drain_end(&self, _report: &DrainReport) {
            self.ends.fetch_add(1, Ordering::Relaxed);
        }

        fn on_task_panic(&self, _priority: Priority, _queue: QueueId, _message: &str) {
            self.panics.fetch_add(1, Ordering::Relaxed);
        }

        fn on_batch_complete(&self, _priority: Priority, _queue: QueueId) {
            self.batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn report() -> DrainReport {
        DrainReport {
            trigger: DrainTrigger::Deferral,
            ceiling: Priority::Low,
            executed: 0,
            panicked: 0,
            batches_completed: 0,
            stop: StopReason::Drained,
        }
    }

    #[test]
    fn test_registry_without_hooks_is_noop() {
        let registry = HookRegistry::new();
        assert!(!registry.has_hooks());

        registry.on_drain_start(DrainTrigger::FramePulse, Priority::High);
        registry.on_drain_end(&report());
        registry.on_task_panic(Priority::Low, QueueId(1), "boom");
        registry.on_batch_complete(Priority::Low, QueueId(1));
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = HookRegistry::new();
        let hooks = Arc::new(CountingHooks::default());
        assert!(registry.set_hooks(hooks.clone()).is_none());
        assert!(registry.has_hooks());

        registry.on_drain_start(DrainTrigger::IdleWindow, Priority::Low);
        registry.on_drain_end(&report());
        registry.on_task_panic(Priority::High, QueueId(7), "boom");
        registry.on_batch_complete(Priority::High, QueueId(7));

        assert_eq!(hooks.drains.load(Ordering::Relaxed), 1);
        assert_eq!(hooks.ends.load(Ordering::Relaxed), 1);
        assert_eq!(hooks.panics.load(Ordering::Relaxed), 1);
        assert_eq!(hooks.batches.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_registry_switching() {
        let registry = HookRegistry::new();
        registry.set_hooks(Arc::new(NullHooks));

        let old = registry.set_hooks(Arc::new(CountingHooks::default()));
        assert!(old.is_some());

        let old = registry.clear_hooks();
        assert!(old.is_some());
        assert!(!registry.has_hooks());
    }
}
