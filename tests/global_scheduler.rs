//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Installing the process-wide scheduler. Single test: the install is per process.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frame_pulse::{BackendKind, ManualHost, PacingConfig, Priority, Queue, Scheduler, SchedulerError};

#[test]
fn test_install_then_queue_new_uses_installed_scheduler() {
    let host = ManualHost::new();
    let installed = Scheduler::install(host.environment(), PacingConfig::default()).unwrap();
    assert_eq!(installed.backend(), BackendKind::Full);
    assert_eq!(Scheduler::global().backend(), BackendKind::Full);

    let runs = Arc::new(AtomicUsize::new(0));
    let critical = Queue::new(Priority::Critical);
    let low = Queue::new(Priority::Low);
    for queue in [&critical, &low] {
        let runs = runs.clone();
        queue.add(move || {
            runs.fetch_add(1, Ordering::SeqCst);
        });
    }

    host.run_jobs();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(installed.pending(Priority::Low), 1);

    host.idle(std::time::Duration::from_millis(16));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(installed.metrics().tasks_executed, 2);

    let again = Scheduler::install(ManualHost::new().environment(), PacingConfig::default());
    assert!(matches!(again, Err(SchedulerError::AlreadyInitialized)));
}
