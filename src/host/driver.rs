//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Dedicated driver thread for headless deferral
//!
//! Hosts without an event loop of their own still need somewhere to run
//! deferred drain jobs. `DriverThread` is that place: a single named thread fed
//! by an unbounded channel, running jobs strictly in submission order. Delayed
//! jobs wait on the same thread in deadline order and run once due. The
//! thread is spawned on first use and exits once the `DriverThread` is dropped
//! and its channel drains; delayed jobs still waiting at that point are dropped.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::{debug, error, warn};

use super::{Deferral, Job};

/// Default driver thread name
pub const DEFAULT_THREAD_NAME: &str = "frame-pulse-driver";

/// Work submitted to the driver thread
enum Command {
    Run(Job),
    RunAt(Instant, Job),
}

/// Immediate-deferral primitive backed by a dedicated thread
pub struct DriverThread {
    /// Thread name
    name: String,
    /// Command channel, created with the thread on first use
    sender: Mutex<Option<Sender<Command>>>,
    /// Set once spawning failed; later jobs run inline
    spawn_failed: AtomicBool,
    /// Jobs completed on the driver thread
    jobs_run: Arc<AtomicU64>,
}

impl DriverThread {
    /// Driver with the default thread name
    #[must_use]
    pub fn new() -> Self {
        Self::with_name(DEFAULT_THREAD_NAME)
    }

    /// Driver with a custom thread name
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sender: Mutex::new(None),
            spawn_failed: AtomicBool::new(false),
            jobs_run: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the thread has been spawned
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Jobs submitted but not yet picked up by the thread, delayed ones included
    #[must_use]
    pub fn queued_jobs(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, Sender::len)
    }

    /// Jobs completed on the thread
    #[must_use]
    pub fn jobs_run(&self) -> u64 {
        self.jobs_run.load(Ordering::Relaxed)
    }

    /// Returns the command channel, spawning the thread if needed.
    /// `None` when the thread cannot be spawned.
    fn sender(&self) -> Option<Sender<Command>> {
        let mut guard = self.sender.lock();
        if let Some(sender) = guard.as_ref() {
            return Some(sender.clone());
        }
        if self.spawn_failed.load(Ordering::Acquire) {
            return None;
        }

        let (sender, receiver) = channel::unbounded::<Command>();
        let jobs_run = self.jobs_run.clone();
        let thread_name = self.name.clone();

        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || drive(&receiver, &jobs_run, &thread_name));

        match spawned {
            Ok(_handle) => {
                *guard = Some(sender.clone());
                Some(sender)
            }
            Err(_e) => {
                self.spawn_failed.store(true, Ordering::Release);

                #[cfg(feature = "tracing")]
                warn!(error = %_e, "Failed to spawn driver thread, deferred jobs will run inline");

                None
            }
        }
    }

    fn submit(&self, command: Command) {
        let Some(sender) = self.sender() else {
            run_inline(command);
            return;
        };
        if let Err(channel::SendError(command)) = sender.send(command) {
            run_inline(command);
        }
    }
}

/// Without a thread there is nothing to wait on; delayed jobs run at once
fn run_inline(command: Command) {
    match command {
        Command::Run(job) | Command::RunAt(_, job) => job(),
    }
}

/// Driver thread body
fn drive(receiver: &Receiver<Command>, jobs_run: &AtomicU64, thread_name: &str) {
    #[cfg(feature = "tracing")]
    debug!(thread_name = %thread_name, "Driver thread started");

    // Delayed jobs, sorted by deadline
    let mut timers: VecDeque<(Instant, Job)> = VecDeque::new();

    loop {
        let received = match timers.front() {
            Some((due, _)) => receiver.recv_deadline(*due),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Run(job)) => run_job(job, jobs_run, thread_name),
            Ok(Command::RunAt(due, job)) => {
                let position = timers.partition_point(|(at, _)| *at <= due);
                timers.insert(position, (due, job));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        while timers.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, job)) = timers.pop_front() {
                run_job(job, jobs_run, thread_name);
            }
        }
    }

    #[cfg(feature = "tracing")]
    debug!(thread_name = %thread_name, dropped_timers = timers.len(), "Driver thread exiting");
}

fn run_job(job: Job, jobs_run: &AtomicU64, thread_name: &str) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        #[cfg(feature = "tracing")]
        error!(thread_name = %thread_name, "Deferred job panicked");
    }
    #[cfg(not(feature = "tracing"))]
    let _ = thread_name;

    jobs_run.fetch_add(1, Ordering::Relaxed);
}

impl Deferral for DriverThread {
    fn defer(&self, job: Job) {
        self.submit(Command::Run(job));
    }

    fn defer_after(&self, delay: Duration, job: Job) {
        self.submit(Command::RunAt(Instant::now() + delay, job));
    }
}

impl Default for DriverThread {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DriverThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverThread")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("jobs_run", &self.jobs_run())
            .finish()
    }
}
