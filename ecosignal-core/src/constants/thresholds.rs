//! Classification Thresholds and Alert Limits
//!
//! AQI boundaries follow the Indian National AQI bands used by the WAQI feed
//! for the deployment city. Congestion boundaries are a starting calibration
//! and are overridable through configuration.

// ===== AIR QUALITY INDEX =====

/// Upper bound of a valid AQI reading.
///
/// Readings above this are rejected at validation, not clamped.
pub const AQI_MAX: f64 = 500.0;

/// Lower bound of the Satisfactory band (inclusive).
pub const AQI_SATISFACTORY_MIN: f64 = 50.0;

/// Lower bound of the Moderate band (inclusive).
pub const AQI_MODERATE_MIN: f64 = 100.0;

/// Lower bound of the Poor band (inclusive).
///
/// From here on air quality dominates congestion in strategy selection.
pub const AQI_POOR_MIN: f64 = 150.0;

/// Lower bound of the Severe band (inclusive).
pub const AQI_SEVERE_MIN: f64 = 300.0;

// ===== CONGESTION FRACTION =====

/// Default lower bound of Light congestion (inclusive).
pub const CONGESTION_LIGHT_MIN: f64 = 0.3;

/// Default lower bound of Heavy congestion (inclusive).
pub const CONGESTION_HEAVY_MIN: f64 = 0.5;

/// Default lower bound of Severe congestion (inclusive).
pub const CONGESTION_SEVERE_MIN: f64 = 0.7;

// ===== QUEUES =====

/// Queue occupancy ratio at which a QueueOverflow is raised (High).
pub const QUEUE_OVERFLOW_RATIO: f64 = 0.9;

/// Queue occupancy ratio at which a QueueOverflow escalates to Critical.
pub const QUEUE_CRITICAL_RATIO: f64 = 0.95;

/// Default queue capacity (vehicles) for an intersection without one configured.
pub const DEFAULT_QUEUE_CAPACITY: u32 = 100;

// ===== PRIORITY =====

/// Queue ratio above which an intersection is Critical priority.
pub const PRIORITY_CRITICAL_QUEUE_RATIO: f64 = 0.5;

/// Queue ratio above which an intersection is High priority.
pub const PRIORITY_HIGH_QUEUE_RATIO: f64 = 0.3;

// ===== TRAFFIC READINGS =====

/// Tolerated ratio of current speed over free-flow speed.
///
/// Faster readings are flagged but kept: free-flow speeds are historical
/// averages and light night traffic routinely exceeds them.
pub const SPEED_SAFETY_MARGIN: f64 = 1.1;

// ===== NETWORK RECOMMENDATIONS =====

/// Average network AQI that triggers emergency emission mode.
pub const NETWORK_EMERGENCY_AQI: f64 = 150.0;

/// Average network congestion that triggers dynamic rerouting.
pub const NETWORK_REROUTE_CONGESTION: f64 = 0.65;

/// Queued vehicles across the network that trigger transit frequency increase.
pub const NETWORK_TRANSIT_QUEUE: u64 = 600;

/// Average corridor congestion above which a corridor needs optimization.
pub const CORRIDOR_OPTIMIZATION_CONGESTION: f64 = 0.6;

/// Consecutive StaleData ticks a source may accumulate and still count
/// towards network averages.
///
/// The counter starts at the first tick that flags the source, not at its
/// last update, so with a 180 s threshold and 60 s ticks a silent source
/// leaves the averages on the sixth tick after its last reading.
pub const STALE_TICKS_EXCLUDED: u32 = 2;

// ===== HOTSPOTS =====

/// Window mean AQI above which a location is a pollution hotspot.
pub const HOTSPOT_AQI: f64 = 150.0;

/// Congestion fraction at which a segment is a congestion hotspot.
pub const HOTSPOT_CONGESTION: f64 = 0.5;

/// Samples needed before a window can call a sustained hotspot.
pub const HOTSPOT_MIN_SAMPLES: usize = 3;

/// Samples kept per intersection and source (one hour at the default tick).
pub const HOTSPOT_WINDOW_SAMPLES: usize = 60;

/// Share of samples past the threshold that makes a recurrent hotspot.
pub const HOTSPOT_RECURRENT_SHARE: f64 = 0.4;
