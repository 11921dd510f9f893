//! Time sources for pacing decisions
//!
//! The scheduler never reads the system clock directly. Frame budgets and
//! headless bookkeeping go through a [`Clock`] supplied by the host
//! [`Environment`](crate::host::Environment), so simulated hosts can drive
//! time deterministically.
//!
//! # Implementations
//!
//! - **Monotonic**: `std::time::Instant` measured from clock creation (default)
//! - **Manual**: virtual time advanced explicitly, see
//!   [`ManualHost`](crate::host::ManualHost)
//!
//! # Example
//!
//! ```rust
//! use frame_pulse::timing::create_clock;
//!
//! let clock = create_clock();
//! let start = clock.now();
//!
//! let mut sum = 0u64;
//! for i in 0..1000 {
//!     sum = sum.wrapping_add(i);
//! }
//! std::hint::black_box(sum);
//!
//! assert!(clock.now() >= start);
//! ```

use std::sync::Arc;
use std::time::Duration;

mod monotonic;

pub use monotonic::MonotonicClock;

/// Monotonic time source
///
/// Readings are offsets from an arbitrary per-clock origin and never go
/// backwards. The trait is object-safe so environments can hold it as
/// `Arc<dyn Clock>`.
pub trait Clock: Send + Sync {
    /// Current reading
    fn now(&self) -> Duration;

    /// Name of the implementation, for logs
    fn name(&self) -> &'static str;

    /// Time elapsed since an earlier reading of this clock
    #[inline]
    fn elapsed_since(&self, earlier: Duration) -> Duration {
        self.now().saturating_sub(earlier)
    }
}

/// Creates the default clock for the current host
#[must_use]
pub fn create_clock() -> Arc<dyn Clock> {
    Arc::new(MonotonicClock::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_clock() {
        let clock = create_clock();
        assert!(!clock.name().is_empty());
    }

    #[test]
    fn test_clock_monotonicity() {
        let clock = create_clock();
        let mut previous = clock.now();

        for _ in 0..100 {
            let mut sum = 0u64;
            for i in 0..1000 {
                sum = sum.wrapping_add(i);
            }
            std::hint::black_box(sum);

            let current = clock.now();
            assert!(current >= previous, "Time went backwards: {current:?} < {previous:?}");
            previous = current;
        }
    }

    #[test]
    fn test_elapsed_since_saturates() {
        let clock = create_clock();
        let future = clock.now() + Duration::from_secs(3600);
        assert_eq!(clock.elapsed_since(future), Duration::ZERO);
    }
}
