//! Engine configuration
//!
//! ## Overview
//!
//! Calibration values and topology, loaded once at startup. Every
//! calibration field has a default, so a configuration file only needs the
//! topology:
//!
//! ```json
//! {
//!   "intersections": [
//!     { "id": "INT_001", "name": "MG Road", "location_id": "bangalore", "segment_id": "mg-1" },
//!     { "id": "INT_002", "name": "Brigade Road", "location_id": "bangalore", "segment_id": "mg-2" }
//!   ],
//!   "corridors": [
//!     { "id": "mg-road", "intersections": ["INT_001", "INT_002"],
//!       "distances_m": [0, 450], "target_speed_kmh": 40 }
//!   ]
//! }
//! ```
//!
//! ## Validation
//!
//! [`EngineConfig::validate`] is the startup gate. Everything it rejects is
//! fatal: an unknown intersection in a corridor, a corridor shorter than two
//! intersections, unordered boundaries, non-positive intervals and so on.
//! Nothing is re-validated at runtime since the configuration never changes
//! without a restart.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::CongestionBoundaries;
use crate::conflicts::QueueThresholds;
use crate::constants::{
    DEFAULT_MIN_PHASE_SEPARATION_S, DEFAULT_PROVIDER_TIMEOUT_S, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_STALE_THRESHOLD_S, DEFAULT_TICK_INTERVAL_S, MS_PER_SECOND, SIGNAL_CYCLE_S,
    SPEED_SAFETY_MARGIN,
};
use crate::errors::{EngineError, EngineResult};
use crate::green_wave::Corridor;
use crate::hotspots::HotspotThresholds;
use crate::strategy::StrategyTable;

fn default_queue_capacity() -> u32 {
    DEFAULT_QUEUE_CAPACITY
}

/// One signalised intersection and where its readings come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Air-quality provider location
    pub location_id: String,
    /// Traffic provider segment
    pub segment_id: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: u32,
}

impl IntersectionConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location_id: impl Into<String>,
        segment_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location_id: location_id.into(),
            segment_id: segment_id.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: u32) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_interval_secs: u64,
    pub provider_timeout_secs: u64,
    pub stale_threshold_secs: u64,
    pub congestion_boundaries: CongestionBoundaries,
    pub strategy_table: StrategyTable,
    pub queue_overflow: QueueThresholds,
    pub min_phase_separation_secs: u32,
    /// Tolerated current/free-flow speed ratio before a reading is flagged
    pub speed_safety_margin: f64,
    pub hotspots: HotspotThresholds,
    pub intersections: Vec<IntersectionConfig>,
    pub corridors: Vec<Corridor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_S,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_S,
            stale_threshold_secs: DEFAULT_STALE_THRESHOLD_S,
            congestion_boundaries: CongestionBoundaries::default(),
            strategy_table: StrategyTable::default(),
            queue_overflow: QueueThresholds::default(),
            min_phase_separation_secs: DEFAULT_MIN_PHASE_SEPARATION_S,
            speed_safety_margin: SPEED_SAFETY_MARGIN,
            hotspots: HotspotThresholds::default(),
            intersections: Vec::new(),
            corridors: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_tick_interval(mut self, secs: u64) -> Self {
        self.tick_interval_secs = secs;
        self
    }

    pub fn with_provider_timeout(mut self, secs: u64) -> Self {
        self.provider_timeout_secs = secs;
        self
    }

    pub fn with_stale_threshold(mut self, secs: u64) -> Self {
        self.stale_threshold_secs = secs;
        self
    }

    pub fn with_congestion_boundaries(mut self, boundaries: CongestionBoundaries) -> Self {
        self.congestion_boundaries = boundaries;
        self
    }

    pub fn with_strategy_table(mut self, table: StrategyTable) -> Self {
        self.strategy_table = table;
        self
    }

    pub fn with_queue_thresholds(mut self, thresholds: QueueThresholds) -> Self {
        self.queue_overflow = thresholds;
        self
    }

    pub fn with_min_phase_separation(mut self, secs: u32) -> Self {
        self.min_phase_separation_secs = secs;
        self
    }

    pub fn with_hotspot_thresholds(mut self, thresholds: HotspotThresholds) -> Self {
        self.hotspots = thresholds;
        self
    }

    pub fn with_intersection(mut self, intersection: IntersectionConfig) -> Self {
        self.intersections.push(intersection);
        self
    }

    pub fn with_corridor(mut self, corridor: Corridor) -> Self {
        self.corridors.push(corridor);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn stale_threshold_ms(&self) -> u64 {
        self.stale_threshold_secs.saturating_mul(MS_PER_SECOND)
    }

    pub fn intersection(&self, id: &str) -> Option<&IntersectionConfig> {
        self.intersections.iter().find(|i| i.id == id)
    }

    pub fn corridor(&self, id: &str) -> Option<&Corridor> {
        self.corridors.iter().find(|c| c.id == id)
    }

    /// Startup validation of calibration and topology
    pub fn validate(&self) -> EngineResult<()> {
        if self.tick_interval_secs == 0 {
            return Err(invalid("tick_interval_secs must be positive"));
        }
        if self.provider_timeout_secs == 0 {
            return Err(invalid("provider_timeout_secs must be positive"));
        }
        if self.provider_timeout_secs > self.tick_interval_secs {
            return Err(invalid(format!(
                "provider_timeout_secs ({}) exceeds tick_interval_secs ({})",
                self.provider_timeout_secs, self.tick_interval_secs
            )));
        }
        if self.stale_threshold_secs == 0 {
            return Err(invalid("stale_threshold_secs must be positive"));
        }
        if self.min_phase_separation_secs >= SIGNAL_CYCLE_S {
            return Err(invalid(format!(
                "min_phase_separation_secs must be below the {SIGNAL_CYCLE_S}s cycle"
            )));
        }
        if !self.speed_safety_margin.is_finite() || self.speed_safety_margin < 1.0 {
            return Err(invalid("speed_safety_margin must be at least 1.0"));
        }
        self.congestion_boundaries.validate()?;
        self.strategy_table.validate()?;
        self.queue_overflow.validate()?;
        self.hotspots.validate()?;

        let mut ids = BTreeSet::new();
        for intersection in &self.intersections {
            if intersection.id.is_empty() {
                return Err(invalid("intersection id must not be empty"));
            }
            if !ids.insert(intersection.id.as_str()) {
                return Err(invalid(format!(
                    "duplicate intersection id {}",
                    intersection.id
                )));
            }
            if intersection.queue_capacity == 0 {
                return Err(invalid(format!(
                    "intersection {}: queue_capacity must be positive",
                    intersection.id
                )));
            }
        }

        let mut corridor_ids = BTreeSet::new();
        for corridor in &self.corridors {
            if !corridor_ids.insert(corridor.id.as_str()) {
                return Err(invalid(format!("duplicate corridor id {}", corridor.id)));
            }
            corridor.validate()?;

            let mut members = BTreeSet::new();
            for member in &corridor.intersections {
                if !ids.contains(member.as_str()) {
                    return Err(EngineError::UnknownIntersection(member.clone()));
                }
                if !members.insert(member.as_str()) {
                    return Err(invalid(format!(
                        "corridor {} lists intersection {member} twice",
                        corridor.id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_intersection(IntersectionConfig::new("INT_001", "MG Road", "blr", "seg-1"))
            .with_intersection(IntersectionConfig::new("INT_002", "Brigade", "blr", "seg-2"))
            .with_corridor(Corridor::new("mg", ["INT_001", "INT_002"], [0.0, 450.0], 40.0))
    }

    #[test]
    fn defaults_match_calibration() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
        assert_eq!(config.stale_threshold_ms(), 180_000);
        assert_eq!(config.min_phase_separation_secs, 8);
        assert_eq!(config.congestion_boundaries, CongestionBoundaries::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_topology_passes() {
        assert!(config().validate().is_ok());
        assert!(config().corridor("mg").is_some());
        assert_eq!(config().intersection("INT_002").map(|i| i.queue_capacity), Some(100));
    }

    #[test]
    fn corridor_with_unknown_member_is_rejected() {
        let config =
            config().with_corridor(Corridor::new("x", ["INT_001", "INT_404"], [0.0, 100.0], 40.0));
        assert_eq!(
            config.validate(),
            Err(EngineError::UnknownIntersection("INT_404".into()))
        );
    }

    #[test]
    fn short_corridor_is_fatal() {
        let config = config().with_corridor(Corridor::new("x", ["INT_001"], [0.0], 40.0));
        assert!(matches!(
            config.validate(),
            Err(EngineError::CorridorTooShort { count: 1, .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config =
            config().with_intersection(IntersectionConfig::new("INT_001", "again", "blr", "s"));
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn timing_values_are_checked() {
        assert!(config().with_tick_interval(0).validate().is_err());
        assert!(config().with_provider_timeout(90).validate().is_err());
        assert!(config().with_stale_threshold(0).validate().is_err());
        assert!(config().with_min_phase_separation(120).validate().is_err());
        let window = HotspotThresholds {
            window_samples: 0,
            ..HotspotThresholds::default()
        };
        assert!(config().with_hotspot_thresholds(window).validate().is_err());
    }

    #[test]
    fn json_with_topology_only_uses_defaults() {
        let json = r#"{
            "intersections": [
                { "id": "INT_001", "location_id": "blr", "segment_id": "s1" },
                { "id": "INT_002", "location_id": "blr", "segment_id": "s2", "queue_capacity": 60 }
            ],
            "corridors": [
                { "id": "mg", "intersections": ["INT_001", "INT_002"],
                  "distances_m": [0, 500], "target_speed_kmh": 36 }
            ],
            "congestion_boundaries": { "light": 0.25 },
            "hotspots": { "aqi": 200 }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tick_interval_secs, 60);
        assert_eq!(config.intersections[0].queue_capacity, 100);
        assert_eq!(config.intersections[1].queue_capacity, 60);
        assert_eq!(config.congestion_boundaries.light, 0.25);
        assert_eq!(config.congestion_boundaries.heavy, 0.5);
        assert_eq!(config.hotspots.aqi, 200.0);
        assert_eq!(config.hotspots.min_samples, 3);
        assert!(config.validate().is_ok());
    }
}
