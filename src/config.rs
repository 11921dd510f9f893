//! Pacing configuration for tier lanes
//!
//! Every numeric pacing knob of the scheduler lives here: how long LOW work may
//! run inside a frame pulse, how much idle time must be left before starting a
//! LOW task, and how many tasks the headless backend runs per chunk before it
//! cedes control. None of these values is a guarantee; they tune how closely the
//! scheduler tracks the host's frame cadence.

#![forbid(unsafe_code)]

//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
use std::time::Duration;

use thiserror::Error;

/// Default LOW allowance per frame pulse (frame-only backend)
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(5);

/// Default idle time that must remain before a LOW task starts
pub const DEFAULT_IDLE_MARGIN: Duration = Duration::from_millis(1);

/// Default number of tasks per headless chunk
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default wait for an awaiting caller before a parked headless pump resumes
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_millis(50);

/// Upper bound for any configured duration
pub const MAX_PACING_DURATION: Duration = Duration::from_secs(1);

/// Upper bound for the headless chunk size
pub const MAX_CHUNK_SIZE: usize = 100_000;

/// Errors raised while validating a [`PacingConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Frame budget of zero would starve LOW work under the frame-only backend
    #[error("frame budget must be greater than zero")]
    ZeroFrameBudget,

    /// Chunk size of zero would stall the headless backend
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// A duration exceeded [`MAX_PACING_DURATION`]
    #[error("{field} too large: {value:?} (max {max:?})")]
    DurationTooLarge {
        /// Offending field
        field: &'static str,
        /// Configured value
        value: Duration,
        /// Accepted maximum
        max: Duration,
    },

    /// Chunk size exceeded [`MAX_CHUNK_SIZE`]
    #[error("chunk size too large: {0} (max {MAX_CHUNK_SIZE})")]
    ChunkSizeTooLarge(usize),
}

/// Pacing knobs shared by all tier lanes of a scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// LOW allowance per pulse, measured from the start of the pulse (so HIGH
    /// work run in the same pulse counts against it). Frame-only backend.
    pub frame_budget: Duration,

    /// Minimum idle time remaining before a LOW task may start. Full backend.
    pub idle_margin: Duration,

    /// Tasks run per deferral before the headless backend re-defers
    pub chunk_size: usize,

    /// End a headless chunk as soon as a completion signal resolves, so the
    /// awaiting caller runs before lower tiers continue
    pub yield_on_batch_complete: bool,

    /// How long the headless pump stays parked after such a chunk. It resumes
    /// earlier once the caller waits on a pending completion signal. Zero
    /// resumes at once.
    pub handoff_timeout: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            frame_budget: DEFAULT_FRAME_BUDGET,
            idle_margin: DEFAULT_IDLE_MARGIN,
            chunk_size: DEFAULT_CHUNK_SIZE,
            yield_on_batch_complete: true,
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
        }
    }
}

impl PacingConfig {
    /// Starts a builder from the default configuration
    #[must_use]
    pub fn builder() -> PacingConfigBuilder {
        PacingConfigBuilder {
            config: Self::default(),
        }
    }

    /// Checks that every field is in range
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_budget.is_zero() {
            return Err(ConfigError::ZeroFrameBudget);
        }
        if self.frame_budget > MAX_PACING_DURATION {
            return Err(ConfigError::DurationTooLarge {
                field: "frame_budget",
                value: self.frame_budget,
                max: MAX_PACING_DURATION,
            });
        }
        if self.idle_margin > MAX_PACING_DURATION {
            return Err(ConfigError::DurationTooLarge {
                field: "idle_margin",
                value: self.idle_margin,
                max: MAX_PACING_DURATION,
            });
        }
        if self.handoff_timeout > MAX_PACING_DURATION {
            return Err(ConfigError::DurationTooLarge {
                field: "handoff_timeout",
                value: self.handoff_timeout,
                max: MAX_PACING_DURATION,
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeTooLarge(self.chunk_size));
        }
        Ok(())
    }
}

/// Builder for [`PacingConfig`]
///
/// ```
/// use std::time::Duration;
/// use frame_pulse::PacingConfig;
///
/// let config = PacingConfig::builder()
///     .frame_budget(Duration::from_millis(4))
///     .chunk_size(32)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 32);
/// ```
#[derive(Debug, Clone)]
pub struct PacingConfigBuilder {
    config: PacingConfig,
}

impl PacingConfigBuilder {
    /// Set the LOW allowance per frame pulse
    #[must_use]
    pub fn frame_budget(mut self, budget: Duration) -> Self {
        self.config.frame_budget = budget;
        self
    }

    /// Set the idle safety margin
    #[must_use]
    pub fn idle_margin(mut self, margin: Duration) -> Self {
        self.config.idle_margin = margin;
        self
    }

    /// Set the headless chunk size
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set whether a headless chunk ends when a batch completes
    #[must_use]
    pub fn yield_on_batch_complete(mut self, enabled: bool) -> Self {
        self.config.yield_on_batch_complete = enabled;
        self
    }

    /// Set how long a parked headless pump waits for the awaiting caller
    #[must_use]
    pub fn handoff_timeout(mut self, timeout: Duration) -> Self {
        self.config.handoff_timeout = timeout;
        self
    }

    /// Validate and build
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any field is out of range.
    pub fn build(self) -> Result<PacingConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Predefined pacing profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigProfile {
    /// Small LOW slices, generous idle margin. For high refresh rate displays
    /// and input-heavy UIs.
    Responsive,

    /// The defaults
    Balanced,

    /// Large LOW slices and big headless chunks. For render-heavy background
    /// work where frame cadence matters less.
    Throughput,
}

impl ConfigProfile {
    /// Creates the [`PacingConfig`] for this profile
    #[must_use]
    pub fn create_config(self) -> PacingConfig {
        match self {
            Self::Responsive => PacingConfig {
                frame_budget: Duration::from_millis(2),
                idle_margin: Duration::from_millis(2),
                chunk_size: 25,
                yield_on_batch_complete: true,
                handoff_timeout: Duration::from_millis(20),
            },
            Self::Balanced => PacingConfig::default(),
            Self::Throughput => PacingConfig {
                frame_budget: Duration::from_millis(12),
                idle_margin: Duration::from_micros(500),
                chunk_size: 1_000,
                yield_on_batch_complete: true,
                handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
            },
        }
    }

    /// Returns a description of the profile
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Responsive => "Short LOW slices per pulse; favours frame cadence over throughput.",
            Self::Balanced => "Default pacing; a few milliseconds of LOW work per pulse.",
            Self::Throughput => "Long LOW slices and large headless chunks; favours throughput.",
        }
    }

    /// Returns all available profiles
    #[must_use]
    pub fn all_profiles() -> &'static [ConfigProfile] {
        &[Self::Responsive, Self::Balanced, Self::Throughput]
    }
}
