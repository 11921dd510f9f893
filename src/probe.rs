//! Capability probe
//!
//! Inspects an [`Environment`] once, when a scheduler is built, and records
//! which timing primitives the host offers. The result is cached in the
//! scheduler and never re-probed; the process-wide scheduler therefore probes
//! exactly once per process.

use crate::host::Environment;

/// Timing primitives available in the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// A frame pulse primitive is available
    pub has_frame_pulse: bool,
    /// An idle window primitive is available
    pub has_idle_time: bool,
}

impl Capabilities {
    /// No visual timing at all
    pub const HEADLESS: Self = Self {
        has_frame_pulse: false,
        has_idle_time: false,
    };

    /// Both primitives
    pub const FULL: Self = Self {
        has_frame_pulse: true,
        has_idle_time: true,
    };

    /// Probes `env`
    #[must_use]
    pub fn probe(env: &Environment) -> Self {
        Self {
            has_frame_pulse: env.frame_pulse().is_some(),
            has_idle_time: env.idle_time().is_some(),
        }
    }

    /// `false` when idle windows exist without frame pulses. Such hosts are
    /// still served, by the headless backend.
    #[must_use]
    pub const fn is_consistent(self) -> bool {
        self.has_frame_pulse || !self.has_idle_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;
    use std::sync::Arc;

    #[test]
    fn test_probe_manual_environments() {
        let host = ManualHost::new();
        assert_eq!(Capabilities::probe(&host.environment()), Capabilities::FULL);
        assert_eq!(
            Capabilities::probe(&host.frame_only_environment()),
            Capabilities {
                has_frame_pulse: true,
                has_idle_time: false
            }
        );
        assert_eq!(Capabilities::probe(&host.headless_environment()), Capabilities::HEADLESS);
    }

    #[test]
    fn test_idle_without_frame_is_inconsistent() {
        let host = ManualHost::new();
        let env = host.headless_environment().with_idle_time(Arc::new(host.clone()));
        let caps = Capabilities::probe(&env);

        assert!(caps.has_idle_time);
        assert!(!caps.is_consistent());
        assert!(Capabilities::FULL.is_consistent());
        assert!(Capabilities::HEADLESS.is_consistent());
    }
}
