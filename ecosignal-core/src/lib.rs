//! Adaptive signal and emission decision engine
//!
//! Turns independently refreshed air-quality and congestion readings into
//! per-intersection signal timing, corridor green waves, conflict flags,
//! speed advisories, hotspots and one network snapshot per tick.
//!
//! The crate does no I/O: providers and the tick driver live in
//! `ecosignal-connectors` and `ecosignal-runtime`.
//!
//! ```
//! use ecosignal_core::{
//!     AirQualityReading, Corridor, Engine, EngineConfig, IntersectionConfig, TickInput,
//!     TrafficReading,
//! };
//!
//! let config = EngineConfig::default()
//!     .with_intersection(IntersectionConfig::new("INT_001", "MG Road", "bangalore", "mg-1"))
//!     .with_intersection(IntersectionConfig::new("INT_002", "Brigade Road", "bangalore", "mg-2"))
//!     .with_corridor(Corridor::new("mg-road", ["INT_001", "INT_002"], [0.0, 500.0], 36.0));
//! let mut engine = Engine::new(config).unwrap();
//!
//! let input = TickInput::new()
//!     .with_air_quality(AirQualityReading::new("bangalore", 113.0, 0))
//!     .with_traffic(TrafficReading::from_speeds("mg-1", 21.0, 60.0, 0))
//!     .with_traffic(TrafficReading::from_speeds("mg-2", 48.0, 60.0, 0));
//!
//! let report = engine.run_tick(&input, 0);
//! assert_eq!(report.snapshot.total_intersections, 2);
//! ```

#![deny(unsafe_code)]

pub mod advisory;
pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod conflicts;
pub mod constants;
pub mod emissions;
pub mod engine;
pub mod errors;
pub mod green_wave;
pub mod health;
pub mod hotspots;
pub mod readings;
pub mod signal_plan;
pub mod store;
pub mod strategy;
pub mod time;

// Public API
pub use advisory::{advise_speed, recommend_speed_reduction, SpeedAdvisory, SPEED_ADVISORY_MATRIX};
pub use aggregate::{aggregate, NetworkRecommendation, NetworkStatusSnapshot, RecommendationKind};
pub use classifier::{classify_aqi, classify_congestion, AqiLevel, CongestionBoundaries, CongestionLevel};
pub use config::{EngineConfig, IntersectionConfig};
pub use conflicts::{ConflictDetector, ConflictRecord, ConflictType, PhaseLink, QueueThresholds, Severity};
pub use emissions::{estimate_emissions, VehicleClass};
pub use engine::{Engine, TickInput, TickReport};
pub use errors::{EngineError, EngineResult};
pub use green_wave::{coordinate, Corridor, CorridorStatus, IntersectionOffset};
pub use health::{health_guidance, HealthGuidance, HEALTH_GUIDANCE};
pub use hotspots::{
    detect_hotspots, Hotspot, HotspotKind, HotspotPattern, HotspotThresholds, SampleWindow,
};
pub use readings::{AirQualityReading, DataSource, TrafficReading};
pub use signal_plan::SignalPlan;
pub use store::{
    AirQualityUpdate, ClassifiedReading, IntersectionState, IntersectionStore, Priority,
    StoreSnapshot, TrafficUpdate,
};
pub use strategy::{select_strategy, Strategy, StrategyDecision, StrategyProfile, StrategyTable};
pub use time::{ManualClock, SystemTime, TimeSource, Timestamp};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
