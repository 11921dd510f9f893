//! Frame-Pulse: priority-tiered cooperative task scheduling
//!
//! This library runs fire-and-forget tasks in three urgency tiers, paced
//! against whatever timing primitives the host offers: an immediate deferral,
//! a per-refresh frame pulse and idle windows between pulses.
//!
//! # Features
//!
//! - **Strict tier order**: all pending Critical work runs before High, all High
//!   before Low
//! - **Pacing**: Critical drains at once, High once per frame pulse, Low in idle
//!   windows or within a per-pulse budget
//! - **Capability probing**: full, frame-only and headless hosts, with a fixed
//!   fallback chain
//! - **Completion signals**: `Queue::processing` resolves when a queue's batch
//!   has drained
//!
//! # Example
//!
//! ```rust
//! use frame_pulse::{ManualHost, PacingConfig, Priority, Scheduler};
//!
//! let host = ManualHost::new();
//! let scheduler = Scheduler::new(host.environment(), PacingConfig::default()).unwrap();
//!
//! let critical = scheduler.queue(Priority::Critical);
//! let low = scheduler.queue(Priority::Low);
//! low.add(|| println!("background"));
//! critical.add(|| println!("urgent"));
//!
//! // Critical work only needs the next deferral tick
//! host.run_jobs();
//! assert_eq!(critical.size(), 0);
//! assert_eq!(low.size(), 1);
//!
//! // Low work waits for an idle window
//! host.idle(std::time::Duration::from_millis(10));
//! assert_eq!(low.size(), 0);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
/// Backend selection and pacing table
pub mod backend;
/// Pacing configuration and profiles
pub mod config;
/// Hook system for drain instrumentation
pub mod hooks;
/// Host timing primitives
pub mod host;
/// Tier lane states and drain reports
pub mod lane;
/// Metrics collection and reporting
pub mod metrics;
/// Urgency tiers
pub mod priority;
/// Environment capability probe
pub mod probe;
/// Caller-facing queues and completion signals
pub mod queue;
/// Scheduler core
pub mod scheduler;
/// Clock abstraction
pub mod timing;

// Public API exports
pub use backend::{BackendKind, Pacing};
pub use config::{ConfigError, ConfigProfile, PacingConfig, PacingConfigBuilder};
pub use hooks::{HookRegistry, NullHooks, SchedulerHooks};
pub use host::{
    Deferral, DriverThread, Environment, FramePulse, IdleDeadline, IdleTime, ManualDeadline, ManualHost,
};
pub use lane::{DrainReport, DrainTrigger, LaneState, StopReason};
pub use metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
pub use priority::Priority;
pub use probe::Capabilities;
pub use queue::{Processing, Queue, QueueId};
pub use scheduler::{Scheduler, SchedulerError};
pub use timing::{Clock, MonotonicClock, create_clock};
