//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Backend adapter
//!
//! Turns a [`Capabilities`] record into one of three pacing strategies and
//! holds the host primitives that strategy needs. The choice is made once,
//! when the scheduler is built; scheduling calls dispatch on the stored variant
//! and never look at the environment again.
//!
//! # Pacing table
//!
//! ```text
//! Backend     | Critical   | High          | Low
//! ------------|------------|---------------|------------------------------
//! Full        | Immediate  | FramePulse    | IdleWindow (deadline-checked)
//! FrameOnly   | Immediate  | FramePulse    | FrameBudget (after High)
//! Fallback    | Chunked    | Chunked       | Chunked (strict tier order)
//! ```

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::host::{Deferral, Environment, FramePulse, IdleTime, Job};
use crate::priority::Priority;
use crate::probe::Capabilities;

/// Which pacing strategy a scheduler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Frame pulses and idle windows
    Full,
    /// Frame pulses only
    FrameOnly,
    /// No visual timing; everything through immediate deferral
    Fallback,
}

impl BackendKind {
    /// Decision table from capabilities to backend. Idle windows without
    /// frame pulses select `Fallback`.
    #[must_use]
    pub const fn select(capabilities: Capabilities) -> Self {
        match (capabilities.has_frame_pulse, capabilities.has_idle_time) {
            (true, true) => Self::Full,
            (true, false) => Self::FrameOnly,
            (false, _) => Self::Fallback,
        }
    }

    /// How a tier is paced under this backend
    #[must_use]
    pub const fn pacing(self, priority: Priority) -> Pacing {
        match (self, priority) {
            (Self::Fallback, _) => Pacing::Chunked,
            (_, Priority::Critical) => Pacing::Immediate,
            (_, Priority::High) => Pacing::FramePulse,
            (Self::Full, Priority::Low) => Pacing::IdleWindow,
            (Self::FrameOnly, Priority::Low) => Pacing::FrameBudget,
        }
    }

    /// Backend name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::FrameOnly => "frame-only",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pacing strategy for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pacing {
    /// Drained to exhaustion on the next immediate deferral
    Immediate,
    /// Drained to exhaustion once per frame pulse
    FramePulse,
    /// Drained inside the frame pulse after High, within the frame budget
    FrameBudget,
    /// Drained in idle windows while time remains above the safety margin
    IdleWindow,
    /// Drained with every other tier by the headless pump, in fixed-size chunks
    Chunked,
}

/// Selected strategy plus the primitives it uses
pub(crate) enum Backend {
    Full {
        frame: Arc<dyn FramePulse>,
        idle: Arc<dyn IdleTime>,
        deferral: Arc<dyn Deferral>,
    },
    FrameOnly {
        frame: Arc<dyn FramePulse>,
        deferral: Arc<dyn Deferral>,
    },
    Fallback {
        deferral: Arc<dyn Deferral>,
    },
}

impl Backend {
    /// Probes `env` and builds the matching backend
    pub(crate) fn from_environment(env: &Environment) -> (Self, Capabilities) {
        let capabilities = Capabilities::probe(env);
        let deferral = env.deferral().clone();

        let backend = match (env.frame_pulse(), env.idle_time()) {
            (Some(frame), Some(idle)) => Self::Full {
                frame: frame.clone(),
                idle: idle.clone(),
                deferral,
            },
            (Some(frame), None) => Self::FrameOnly {
                frame: frame.clone(),
                deferral,
            },
            (None, _) => Self::Fallback { deferral },
        };

        debug_assert_eq!(backend.kind(), BackendKind::select(capabilities));
        (backend, capabilities)
    }

    pub(crate) fn kind(&self) -> BackendKind {
        match self {
            Self::Full { .. } => BackendKind::Full,
            Self::FrameOnly { .. } => BackendKind::FrameOnly,
            Self::Fallback { .. } => BackendKind::Fallback,
        }
    }

    fn deferral(&self) -> &Arc<dyn Deferral> {
        match self {
            Self::Full { deferral, .. } | Self::FrameOnly { deferral, .. } | Self::Fallback { deferral } => deferral,
        }
    }

    pub(crate) fn defer(&self, job: Job) {
        self.deferral().defer(job);
    }

    pub(crate) fn defer_after(&self, delay: Duration, job: Job) {
        self.deferral().defer_after(delay, job);
    }

    /// Frame primitive; `None` under `Fallback`
    pub(crate) fn frame_pulse(&self) -> Option<&Arc<dyn FramePulse>> {
        match self {
            Self::Full { frame, .. } | Self::FrameOnly { frame, .. } => Some(frame),
            Self::Fallback { .. } => None,
        }
    }

    /// Idle primitive; only `Full` has one
    pub(crate) fn idle_time(&self) -> Option<&Arc<dyn IdleTime>> {
        match self {
            Self::Full { idle, .. } => Some(idle),
            Self::FrameOnly { .. } | Self::Fallback { .. } => None,
        }
    }
}
