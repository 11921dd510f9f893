//! Host environment capabilities
//!
//! The scheduler does not own a frame loop. It borrows up to four primitives
//! from its host:
//!
//! - a **frame pulse** ([`FramePulse`]): run a callback once before the next
//!   screen refresh, passing a monotonically increasing timestamp
//! - an **idle window** ([`IdleTime`]): run a callback in a gap between pulses,
//!   passing an [`IdleDeadline`] that reports the time left
//! - an **immediate deferral** ([`Deferral`]): run a job as soon as possible,
//!   after the current one (the finest-grained async deferral available), or
//!   after a delay where the primitive has a timer
//! - a **clock** ([`Clock`]) for budget measurements
//!
//! Frame pulse and idle window are optional; their presence decides the
//! backend (see [`Capabilities`](crate::Capabilities)). Deferral and clock are
//! always present; [`Environment::headless`] supplies a dedicated driver
//! thread and a monotonic clock.
//!
//! Primitives must never invoke the supplied callback synchronously from inside
//! the request call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::timing::{Clock, create_clock};

mod driver;
mod manual;

pub use driver::DriverThread;
pub use manual::{ManualDeadline, ManualHost};

/// Job handed to a [`Deferral`] primitive
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Callback handed to a [`FramePulse`] primitive, receiving the pulse timestamp
pub type FrameCallback = Box<dyn FnOnce(Duration) + Send + 'static>;

/// Callback handed to an [`IdleTime`] primitive
pub type IdleCallback = Box<dyn FnOnce(&dyn IdleDeadline) + Send + 'static>;

/// Frame pulse primitive (`requestAnimationFrame`-like)
pub trait FramePulse: Send + Sync {
    /// Run `callback` once before the next refresh
    fn request_frame(&self, callback: FrameCallback);
}

/// Idle window primitive (`requestIdleCallback`-like)
pub trait IdleTime: Send + Sync {
    /// Run `callback` in the next idle window
    fn request_idle(&self, callback: IdleCallback);
}

/// Deadline of an idle window
pub trait IdleDeadline {
    /// Time left before the next pulse is due
    fn time_remaining(&self) -> Duration;
}

/// Immediate-deferral primitive (microtask-like)
pub trait Deferral: Send + Sync {
    /// Run `job` soon, after the currently running job. Jobs run in FIFO order.
    fn defer(&self, job: Job);

    /// Run `job` once `delay` has passed. Primitives without a timer run it
    /// as a plain deferral.
    fn defer_after(&self, _delay: Duration, job: Job) {
        self.defer(job);
    }
}

/// The set of primitives a scheduler runs against
#[derive(Clone)]
pub struct Environment {
    frame_pulse: Option<Arc<dyn FramePulse>>,
    idle_time: Option<Arc<dyn IdleTime>>,
    deferral: Arc<dyn Deferral>,
    clock: Arc<dyn Clock>,
}

impl Environment {
    /// Environment with no visual timing: a dedicated driver thread for
    /// deferral and a monotonic clock
    #[must_use]
    pub fn headless() -> Self {
        Self::with_deferral_only(Arc::new(DriverThread::new()))
    }

    /// Environment with only the given deferral primitive and a monotonic clock
    #[must_use]
    pub fn with_deferral_only(deferral: Arc<dyn Deferral>) -> Self {
        Self {
            frame_pulse: None,
            idle_time: None,
            deferral,
            clock: create_clock(),
        }
    }

    /// Add a frame pulse primitive
    #[must_use]
    pub fn with_frame_pulse(mut self, frame_pulse: Arc<dyn FramePulse>) -> Self {
        self.frame_pulse = Some(frame_pulse);
        self
    }

    /// Add an idle window primitive
    #[must_use]
    pub fn with_idle_time(mut self, idle_time: Arc<dyn IdleTime>) -> Self {
        self.idle_time = Some(idle_time);
        self
    }

    /// Replace the deferral primitive
    #[must_use]
    pub fn with_deferral(mut self, deferral: Arc<dyn Deferral>) -> Self {
        self.deferral = deferral;
        self
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Frame pulse primitive, if the host has one
    #[must_use]
    pub fn frame_pulse(&self) -> Option<&Arc<dyn FramePulse>> {
        self.frame_pulse.as_ref()
    }

    /// Idle window primitive, if the host has one
    #[must_use]
    pub fn idle_time(&self) -> Option<&Arc<dyn IdleTime>> {
        self.idle_time.as_ref()
    }

    /// Deferral primitive
    #[must_use]
    pub fn deferral(&self) -> &Arc<dyn Deferral> {
        &self.deferral
    }

    /// Clock
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::headless()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("frame_pulse", &self.frame_pulse.is_some())
            .field("idle_time", &self.idle_time.is_some())
            .field("clock", &self.clock.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_environment_has_no_visual_timing() {
        let env = Environment::headless();
        assert!(env.frame_pulse().is_none());
        assert!(env.idle_time().is_none());
        assert!(format!("{env:?}").contains("frame_pulse: false"));
    }

    #[test]
    fn test_builder_installs_primitives() {
        let host = ManualHost::new();
        let env = Environment::with_deferral_only(Arc::new(host.clone()))
            .with_frame_pulse(Arc::new(host.clone()))
            .with_idle_time(Arc::new(host.clone()))
            .with_clock(Arc::new(host.clone()));

        assert!(env.frame_pulse().is_some());
        assert!(env.idle_time().is_some());
        assert_eq!(env.clock().name(), "manual");
    }
}
