//! Constants for EcoSignal Core
//!
//! Centralized calibration values used throughout the decision engine. Values
//! that operators are expected to tune (congestion boundaries, stale threshold,
//! strategy constants) are only *defaults* here; the live values come from
//! `EngineConfig`.
//!
//! ## Organization
//!
//! - **Thresholds**: AQI boundaries, congestion defaults, queue and priority limits
//! - **Timing**: Signal cycle composition, tick and staleness intervals
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Use descriptive names that include units
//! 3. Keep lookup tables (strategy profiles, advisory matrix) next to the code
//!    that consumes them, as data

/// Classification and alerting thresholds.
pub mod thresholds;

/// Signal cycle composition and scheduling intervals.
pub mod timing;

pub use thresholds::{
    AQI_MAX, AQI_SATISFACTORY_MIN, AQI_MODERATE_MIN, AQI_POOR_MIN, AQI_SEVERE_MIN,
    CONGESTION_LIGHT_MIN, CONGESTION_HEAVY_MIN, CONGESTION_SEVERE_MIN,
    QUEUE_OVERFLOW_RATIO, QUEUE_CRITICAL_RATIO, DEFAULT_QUEUE_CAPACITY,
    PRIORITY_CRITICAL_QUEUE_RATIO, PRIORITY_HIGH_QUEUE_RATIO, SPEED_SAFETY_MARGIN,
    NETWORK_EMERGENCY_AQI, NETWORK_REROUTE_CONGESTION, NETWORK_TRANSIT_QUEUE,
    CORRIDOR_OPTIMIZATION_CONGESTION, STALE_TICKS_EXCLUDED,
    HOTSPOT_AQI, HOTSPOT_CONGESTION, HOTSPOT_MIN_SAMPLES, HOTSPOT_WINDOW_SAMPLES,
    HOTSPOT_RECURRENT_SHARE,
};

pub use timing::{
    MS_PER_SECOND, MPS_PER_KMH, SIGNAL_CYCLE_S, YELLOW_S, ALL_RED_S, MIN_GREEN_S, MAX_GREEN_S,
    DEFAULT_TICK_INTERVAL_S, DEFAULT_PROVIDER_TIMEOUT_S, DEFAULT_STALE_THRESHOLD_S,
    DEFAULT_MIN_PHASE_SEPARATION_S,
};
