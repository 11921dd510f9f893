//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
// Property-based tests for ordering and size invariants
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use frame_pulse::{Environment, ManualHost, PacingConfig, Priority, Queue, Scheduler};
use parking_lot::Mutex;

/// Queues per tier
const QUEUES_PER_TIER: usize = 3;

/// (tier, queue slot within the tier, task cost in microseconds)
type Op = (usize, usize, u64);

/// Strategy for interleaved `add` calls across tiers and queues
fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        (
            0usize..3,               // tier index
            0usize..QUEUES_PER_TIER, // queue slot
            0u64..3_000,             // virtual task cost
        ),
        1..80,
    )
}

/// Entry written by each task: (tier, queue slot, per-queue sequence number)
type Entry = (Priority, usize, usize);

struct Harness {
    host: ManualHost,
    scheduler: Scheduler,
    queues: Vec<Vec<Queue>>,
    log: Arc<Mutex<Vec<Entry>>>,
}

impl Harness {
    fn new(env: impl FnOnce(&ManualHost) -> Environment, config: PacingConfig) -> Self {
        let host = ManualHost::new();
        let scheduler = Scheduler::new(env(&host), config).unwrap();
        let queues = Priority::ALL
            .iter()
            .map(|p| (0..QUEUES_PER_TIER).map(|_| scheduler.queue(*p)).collect())
            .collect();

        Self {
            host,
            scheduler,
            queues,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enqueues every op and returns the expected per-queue counts
    fn enqueue(&self, ops: &[Op]) -> Vec<Vec<usize>> {
        let mut counts = vec![vec![0usize; QUEUES_PER_TIER]; 3];
        for &(tier, slot, cost_us) in ops {
            let sequence = counts[tier][slot];
            counts[tier][slot] += 1;

            let log = self.log.clone();
            let host = self.host.clone();
            let priority = Priority::ALL[tier];
            self.queues[tier][slot].add(move || {
                log.lock().push((priority, slot, sequence));
                host.advance(Duration::from_micros(cost_us));
            });
        }
        counts
    }

    fn total_size(&self) -> usize {
        self.queues.iter().flatten().map(Queue::size).sum()
    }
}

fn assert_ordered(log: &[Entry], total: usize) -> Result<(), TestCaseError> {
    prop_assert_eq!(log.len(), total);

    // Everything was enqueued before the first drain, so tiers never go back
    for pair in log.windows(2) {
        prop_assert!(pair[0].0 <= pair[1].0, "tier order violated: {:?}", pair);
    }

    // Per-queue FIFO
    for priority in Priority::ALL {
        for slot in 0..QUEUES_PER_TIER {
            let sequence: Vec<_> = log
                .iter()
                .filter(|(p, s, _)| *p == priority && *s == slot)
                .map(|(_, _, n)| *n)
                .collect();
            let expected: Vec<_> = (0..sequence.len()).collect();
            prop_assert_eq!(sequence, expected);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_fallback_keeps_tier_order_and_fifo(
        ops in ops_strategy(),
        chunk_size in 1usize..20,
        yield_on_batch in any::<bool>(),
    ) {
        let config = PacingConfig::builder()
            .chunk_size(chunk_size)
            .yield_on_batch_complete(yield_on_batch)
            .build()
            .unwrap();
        let harness = Harness::new(ManualHost::headless_environment, config);
        harness.enqueue(&ops);

        harness.host.run_jobs();
        prop_assert_eq!(harness.total_size(), 0);
        assert_ordered(&harness.log.lock(), ops.len())?;
    }

    #[test]
    fn prop_full_backend_keeps_tier_order_and_fifo(ops in ops_strategy()) {
        let harness = Harness::new(ManualHost::environment, PacingConfig::default());
        harness.enqueue(&ops);

        harness.host.run_jobs();
        harness.host.pulse();
        for _ in 0..ops.len() + 1 {
            harness.host.idle(Duration::from_millis(16));
        }

        prop_assert_eq!(harness.total_size(), 0);
        assert_ordered(&harness.log.lock(), ops.len())?;
    }

    #[test]
    fn prop_frame_only_eventually_drains(ops in ops_strategy()) {
        let harness = Harness::new(ManualHost::frame_only_environment, PacingConfig::default());
        harness.enqueue(&ops);

        harness.host.run_jobs();
        for _ in 0..ops.len() + 1 {
            harness.host.pulse();
        }

        prop_assert_eq!(harness.total_size(), 0);
        assert_ordered(&harness.log.lock(), ops.len())?;
    }

    #[test]
    fn prop_size_matches_adds_minus_executions(ops in ops_strategy(), pulses in 0usize..4) {
        let harness = Harness::new(ManualHost::frame_only_environment, PacingConfig::default());
        let counts = harness.enqueue(&ops);

        for (tier, per_tier) in counts.iter().enumerate() {
            for (slot, expected) in per_tier.iter().enumerate() {
                prop_assert_eq!(harness.queues[tier][slot].size(), *expected);
            }
        }

        for _ in 0..pulses {
            harness.host.pulse();
        }

        let executed = harness.log.lock().len();
        prop_assert_eq!(harness.total_size() + executed, ops.len());
        prop_assert_eq!(harness.scheduler.metrics().backlog(), harness.total_size() as u64);
    }
}
