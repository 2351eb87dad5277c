//! Kernel-wide constants with documented roles
//!
//! Values that are not per-experiment configuration are collected here so the
//! couplings between them stay visible.

/// Steps per simulated month.
///
/// One step is one hour of base time; a month is 30 days. Policies that
/// reason in months (science doubling) divide the step clock by this.
/// Experiments may override it, which test scenarios use to keep month
/// arithmetic literal.
pub const DEFAULT_STEPS_PER_MONTH: u64 = 720;

/// Score at or above which a goal is `within` its target band.
pub const SCORE_WITHIN: f64 = 0.9;

/// Score at or above which a goal is `approaching` its target band.
pub const SCORE_APPROACHING: f64 = 0.5;

/// Default cap on how long a request may wait in a sector backlog before it
/// is dropped and counted against `BACKLOG-EXPIRED`.
pub const DEFAULT_BACKLOG_MAX_AGE_STEPS: u64 = 500;

/// Default log cadence: write every Nth step snapshot.
pub const DEFAULT_LOG_SKIP_STEPS: u64 = 1;

/// Ceiling for log-sink retry backoff, in steps.
pub const STORE_BACKOFF_MAX_STEPS: u64 = 64;

/// Tolerance when judging a committed stock as negative. Net deltas are sums
/// of float flows; exact zero crossings must not trip the overdraft check.
pub const STOCK_EPSILON: f64 = 1e-9;

/// Metric id for unmet power demand.
pub const METRIC_POWER_SHORTAGE: &str = "PWR-SHORTAGE-KW";

/// Metric id for environmental dust coverage.
pub const METRIC_DUST_COVERAGE: &str = "IND-DUST-COV";

/// Metric id for the science production rate.
pub const METRIC_SCIENCE_RATE: &str = "SCI-PROD-RATE";

/// Metric id for the active science rover count.
pub const METRIC_ROVER_COUNT: &str = "SCI-ROVER-COUNT";

/// Metric id counting snapshots lost to store failures.
pub const METRIC_LOG_DROPPED: &str = "LOG-DROPPED";

/// Metric id counting backlog requests dropped on expiry.
pub const METRIC_BACKLOG_EXPIRED: &str = "BACKLOG-EXPIRED";
