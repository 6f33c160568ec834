//! Timing and sizing knobs for registries and credential ledgers.

use std::time::Duration;

/// Default heartbeat period for broadcast registries (30 seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Default upper bound for a single subscriber write.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// Default lifespan of a timed credential.
pub const DEFAULT_TIMED_LIFESPAN_SECS: u64 = 45;

/// Default number of digits in a timed credential.
pub const DEFAULT_TIMED_LENGTH: usize = 8;

/// Default number of hex characters in a single-use credential.
pub const DEFAULT_SINGLE_USE_LENGTH: usize = 24;

/// Configuration for a [`BroadcastRegistry`](crate::continuity::BroadcastRegistry).
#[derive(Debug, Clone)]
pub struct ContinuityConfig {
    /// Period of the heartbeat broadcast.
    pub heartbeat_interval: Duration,

    /// How long a single subscriber write may take before the subscriber
    /// is treated as gone.
    ///
    /// Broadcasts on one registry take turns, so a stalled writer holds up
    /// every later broadcast and heartbeat on that registry for up to this
    /// long.
    pub write_timeout: Duration,
}

impl ContinuityConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
        }
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the per-write delivery timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`CredentialLedger`](crate::credential::CredentialLedger).
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Lifespan used by `issue_timed_default`.
    pub timed_lifespan: Duration,

    /// Digit count used by `issue_timed_default`.
    pub timed_length: usize,

    /// Hex character count used by `issue_single_use_default`.
    pub single_use_length: usize,
}

impl CredentialConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            timed_lifespan: Duration::from_secs(DEFAULT_TIMED_LIFESPAN_SECS),
            timed_length: DEFAULT_TIMED_LENGTH,
            single_use_length: DEFAULT_SINGLE_USE_LENGTH,
        }
    }

    /// Set the default timed lifespan.
    pub fn with_timed_lifespan(mut self, lifespan: Duration) -> Self {
        self.timed_lifespan = lifespan;
        self
    }

    /// Set the default timed credential length.
    pub fn with_timed_length(mut self, length: usize) -> Self {
        self.timed_length = length.max(1);
        self
    }

    /// Set the default single-use credential length.
    pub fn with_single_use_length(mut self, length: usize) -> Self {
        self.single_use_length = length.max(1);
        self
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self::new()
    }
}
