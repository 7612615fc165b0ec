//! Timing Constants
//!
//! Signal cycle composition and scheduling intervals.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Metres per second in one km/h.
pub const MPS_PER_KMH: f64 = 1000.0 / 3600.0;

// ===== SIGNAL CYCLE =====

/// Full signal cycle length (seconds).
///
/// 120 s is the usual upper end for urban arterials under adaptive control
/// (SCATS/SCOOT deployments cap cycles around 120-150 s).
pub const SIGNAL_CYCLE_S: u32 = 120;

/// Yellow (amber) interval (seconds).
pub const YELLOW_S: u32 = 5;

/// All-red clearance interval (seconds).
pub const ALL_RED_S: u32 = 3;

/// Shortest green a plan may assign (seconds).
///
/// Pedestrian crossing time floor.
pub const MIN_GREEN_S: u32 = 15;

/// Longest green a plan may assign (seconds).
pub const MAX_GREEN_S: u32 = 80;

// ===== SCHEDULING =====

/// Default tick interval (seconds).
pub const DEFAULT_TICK_INTERVAL_S: u64 = 60;

/// Default per-call provider timeout (seconds).
pub const DEFAULT_PROVIDER_TIMEOUT_S: u64 = 10;

/// Default age after which an intersection's data is stale (seconds).
///
/// Three missed ticks at the default interval.
pub const DEFAULT_STALE_THRESHOLD_S: u64 = 180;

/// Default minimum separation between adjacent green starts (seconds).
///
/// Yellow plus all-red: closer than one clearance interval, two plans release
/// into the shared link at once.
pub const DEFAULT_MIN_PHASE_SEPARATION_S: u32 = YELLOW_S + ALL_RED_S;
