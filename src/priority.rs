//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Urgency tiers for queued work

use std::fmt;

/// Urgency tier of a [`Queue`](crate::Queue).
///
/// Ordered from most to least urgent: `Critical < High < Low`. A queue's tier
/// is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Latency-sensitive work that must run before anything else composes.
    /// Never waits for a pulse.
    Critical = 0,
    /// Interaction-sensitive work, done by the next frame pulse.
    High = 1,
    /// Throughput work (background rendering and the like), chunked so it
    /// never monopolizes a frame.
    Low = 2,
}

impl Priority {
    /// All tiers, most urgent first
    pub const ALL: [Self; 3] = [Self::Critical, Self::High, Self::Low];

    /// Index of this tier in per-tier tables
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Tier name used in logs and metric labels
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Low => "low",
        }
    }

    /// Tiers strictly more urgent than this one, most urgent first
    #[must_use]
    pub fn more_urgent(self) -> &'static [Self] {
        &Self::ALL[..self.index()]
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
