//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Benchmarks for add and drain throughput
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

use frame_pulse::{
    DrainReport, DrainTrigger, HookRegistry, ManualHost, NullHooks, PacingConfig, Priority, QueueId,
    Scheduler, SchedulerHooks,
};

// Hooks that only touch their arguments
struct NoOpHooks;

impl SchedulerHooks for NoOpHooks {
    fn on_drain_start(&self, trigger: DrainTrigger, ceiling: Priority) {
        black_box((trigger, ceiling));
    }

    fn on_drain_end(&self, report: &DrainReport) {
        black_box(report.executed);
    }

    fn on_task_panic(&self, priority: Priority, queue: QueueId, message: &str) {
        black_box((priority, queue, message));
    }

    fn on_batch_complete(&self, priority: Priority, queue: QueueId) {
        black_box((priority, queue));
    }
}

fn bench_add(c: &mut Criterion) {
    let host = ManualHost::new();
    let scheduler = Scheduler::new(host.environment(), PacingConfig::default()).unwrap();

    let mut group = c.benchmark_group("queue/add");

    for priority in Priority::ALL {
        let queue = scheduler.queue(priority);
        group.bench_function(priority.name(), |b| {
            b.iter(|| queue.add(|| {}));
        });
        // Keep the backlog from growing across groups
        host.run_jobs();
        host.pulse();
        while !queue.is_empty() {
            host.idle(Duration::from_millis(16));
        }
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/drain");

    for batch in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(batch as u64));

        group.bench_with_input(BenchmarkId::new("critical", batch), &batch, |b, &batch| {
            let host = ManualHost::new();
            let scheduler = Scheduler::new(host.environment(), PacingConfig::default()).unwrap();
            let queue = scheduler.queue(Priority::Critical);
            b.iter(|| {
                for i in 0..batch {
                    queue.add(move || {
                        black_box(i);
                    });
                }
                host.run_jobs();
            });
        });

        group.bench_with_input(BenchmarkId::new("high", batch), &batch, |b, &batch| {
            let host = ManualHost::new();
            let scheduler = Scheduler::new(host.frame_only_environment(), PacingConfig::default()).unwrap();
            let queue = scheduler.queue(Priority::High);
            b.iter(|| {
                for i in 0..batch {
                    queue.add(move || {
                        black_box(i);
                    });
                }
                host.pulse();
            });
        });

        group.bench_with_input(BenchmarkId::new("fallback", batch), &batch, |b, &batch| {
            let host = ManualHost::new();
            let scheduler = Scheduler::new(host.headless_environment(), PacingConfig::default()).unwrap();
            let queues: Vec<_> = Priority::ALL.iter().map(|p| scheduler.queue(*p)).collect();
            b.iter(|| {
                for i in 0..batch {
                    queues[i % 3].add(move || {
                        black_box(i);
                    });
                }
                host.run_jobs();
            });
        });
    }

    group.finish();
}

fn bench_hooks_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler/hooks");

    let cases: [(&str, Option<Arc<dyn SchedulerHooks>>); 3] = [
        ("none", None),
        ("null", Some(Arc::new(NullHooks))),
        ("noop", Some(Arc::new(NoOpHooks))),
    ];

    for (name, hooks) in cases {
        let host = ManualHost::new();
        let scheduler = Scheduler::new(host.environment(), PacingConfig::default()).unwrap();
        if let Some(hooks) = hooks {
            scheduler.hooks().set_hooks(hooks);
        }
        let queue = scheduler.queue(Priority::Critical);

        group.bench_function(name, |b| {
            b.iter(|| {
                for _ in 0..100 {
                    queue.add(|| {});
                }
                host.run_jobs();
            });
        });
    }

    group.finish();
}

fn bench_registry_dispatch(c: &mut Criterion) {
    let registry = HookRegistry::new();
    registry.set_hooks(Arc::new(NoOpHooks));

    c.bench_function("hook_registry/on_batch_complete", |b| {
        b.iter(|| registry.on_batch_complete(black_box(Priority::Low), black_box(QueueId(1))));
    });
}

criterion_group!(
    benches,
    bench_add,
    bench_drain,
    bench_hooks_overhead,
    bench_registry_dispatch
);
criterion_main!(benches);
