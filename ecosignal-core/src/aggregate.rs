//! Network Aggregation
//!
//! Reduces every intersection state, the tick's conflicts and the corridor
//! statuses into one [`NetworkStatusSnapshot`]. This is the only value the
//! presentation layer reads.
//!
//! Averages are arithmetic means of the raw AQI index and congestion
//! fraction. Each source is judged on its own: once a StaleData conflict has
//! named a source for more than two consecutive ticks, that source's value
//! leaves its average while the intersection still counts towards the
//! totals. With nothing to average, the averages are reported as zero and
//! `no_data` is set.
//!
//! The snapshot also carries the [`HealthGuidance`] for the average AQI
//! level. Hotspots need the sample windows and calibration, so the engine
//! attaches them with [`NetworkStatusSnapshot::with_hotspots`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::conflicts::{ConflictRecord, ConflictType, Severity};
use crate::constants::{
    NETWORK_EMERGENCY_AQI, NETWORK_REROUTE_CONGESTION, NETWORK_TRANSIT_QUEUE, STALE_TICKS_EXCLUDED,
};
use crate::classifier::classify_aqi;
use crate::green_wave::CorridorStatus;
use crate::health::{health_guidance, HealthGuidance};
use crate::hotspots::Hotspot;
use crate::readings::DataSource;
use crate::store::{IntersectionState, Priority};
use crate::time::Timestamp;

/// Network-wide action suggested to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecommendationKind {
    EmergencyEmissionMode,
    GreenWaveActivation,
    DynamicRerouting,
    TransitFrequency,
    DriverAlerts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkRecommendation {
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub action: &'static str,
}

impl NetworkRecommendation {
    const fn new(kind: RecommendationKind) -> Self {
        let (severity, action) = match kind {
            RecommendationKind::EmergencyEmissionMode => (
                Severity::Critical,
                "Activate emergency emission reduction protocol across the network",
            ),
            RecommendationKind::GreenWaveActivation => (
                Severity::High,
                "Activate green wave coordination on affected corridors",
            ),
            RecommendationKind::DynamicRerouting => (
                Severity::High,
                "Enable dynamic rerouting around congested intersections",
            ),
            RecommendationKind::TransitFrequency => (
                Severity::Medium,
                "Increase public transit frequency to absorb queued demand",
            ),
            RecommendationKind::DriverAlerts => (
                Severity::Low,
                "Broadcast current conditions and speed advisories to drivers",
            ),
        };
        Self {
            kind,
            severity,
            action,
        }
    }
}

/// Network status for one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStatusSnapshot {
    pub generated_at: Timestamp,
    pub total_intersections: usize,
    /// Priority Critical or carrying a Critical conflict
    pub critical_intersections: usize,
    /// Priority High or Critical
    pub high_priority_intersections: usize,
    pub stale_intersections: usize,
    pub average_congestion: f64,
    pub average_aqi: f64,
    pub total_queued_vehicles: u64,
    /// Nothing contributed to the averages
    pub no_data: bool,
    /// Advice for the average AQI level; absent without air-quality data
    pub health: Option<HealthGuidance>,
    pub hotspots: Vec<Hotspot>,
    pub corridors: Vec<CorridorStatus>,
    pub recommendations: Vec<NetworkRecommendation>,
}

impl NetworkStatusSnapshot {
    /// Snapshot served before the first tick completes
    pub fn empty(generated_at: Timestamp) -> Self {
        aggregate(std::iter::empty(), &[], Vec::new(), generated_at)
    }

    pub fn with_hotspots(mut self, hotspots: Vec<Hotspot>) -> Self {
        self.hotspots = hotspots;
        self
    }

    pub fn corridor(&self, corridor_id: &str) -> Option<&CorridorStatus> {
        self.corridors
            .iter()
            .find(|status| status.corridor_id == corridor_id)
    }
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Summarize the network. Pure; inputs are only read.
pub fn aggregate<'a>(
    states: impl IntoIterator<Item = &'a IntersectionState>,
    conflicts: &[ConflictRecord],
    corridors: Vec<CorridorStatus>,
    now: Timestamp,
) -> NetworkStatusSnapshot {
    let stale_flagged: BTreeMap<&str, &[DataSource]> = conflicts
        .iter()
        .filter(|c| c.conflict_type == ConflictType::StaleData)
        .map(|c| (c.intersection_id.as_str(), c.stale_sources.as_slice()))
        .collect();
    let critical_flagged: BTreeSet<&str> = conflicts
        .iter()
        .filter(|c| c.severity == Severity::Critical)
        .map(|c| c.intersection_id.as_str())
        .collect();

    let mut total = 0;
    let mut critical = 0;
    let mut high = 0;
    let mut queued = 0u64;
    let mut congestion = Mean::default();
    let mut aqi = Mean::default();

    for state in states {
        total += 1;
        queued += state.queue_count as u64;

        let priority = state.priority();
        if priority == Priority::Critical || critical_flagged.contains(state.id.as_str()) {
            critical += 1;
        }
        if priority >= Priority::High {
            high += 1;
        }

        let stale_sources = stale_flagged.get(state.id.as_str()).copied().unwrap_or(&[]);
        let excluded = |source: DataSource| {
            stale_sources.contains(&source) && state.stale_ticks(source) > STALE_TICKS_EXCLUDED
        };
        if !excluded(DataSource::AirQuality) {
            aqi.push(state.aqi_index);
        }
        if !excluded(DataSource::Traffic) {
            congestion.push(state.congestion);
        }
    }

    let average_congestion = congestion.value();
    let average_aqi = aqi.value();

    let mut recommendations = Vec::new();
    if average_aqi > NETWORK_EMERGENCY_AQI {
        recommendations.push(NetworkRecommendation::new(RecommendationKind::EmergencyEmissionMode));
    }
    if critical > 0 {
        recommendations.push(NetworkRecommendation::new(RecommendationKind::GreenWaveActivation));
    }
    if average_congestion > NETWORK_REROUTE_CONGESTION {
        recommendations.push(NetworkRecommendation::new(RecommendationKind::DynamicRerouting));
    }
    if queued > NETWORK_TRANSIT_QUEUE {
        recommendations.push(NetworkRecommendation::new(RecommendationKind::TransitFrequency));
    }
    recommendations.push(NetworkRecommendation::new(RecommendationKind::DriverAlerts));

    NetworkStatusSnapshot {
        generated_at: now,
        total_intersections: total,
        critical_intersections: critical,
        high_priority_intersections: high,
        stale_intersections: stale_flagged.len(),
        average_congestion,
        average_aqi,
        total_queued_vehicles: queued,
        no_data: congestion.count == 0 && aqi.count == 0,
        health: (aqi.count > 0)
            .then(|| classify_aqi(average_aqi).ok())
            .flatten()
            .map(|level| *health_guidance(level)),
        hotspots: Vec::new(),
        corridors,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{classify_congestion, AqiLevel, CongestionLevel};
    use crate::store::{AirQualityUpdate, TrafficUpdate};

    fn state(id: &str, aqi: f64, congestion: f64, queue: u32) -> IntersectionState {
        let air = AirQualityUpdate {
            index: Some(aqi),
            ..AirQualityUpdate::new(classify_aqi(aqi).unwrap(), 0)
        };
        let traffic = TrafficUpdate {
            congestion: Some(congestion),
            ..TrafficUpdate::new(classify_congestion(congestion).unwrap(), queue, 0)
        };
        IntersectionState::observed(id, id, 100, air, traffic)
    }

    fn stale_conflict(id: &str, sources: &[DataSource]) -> ConflictRecord {
        ConflictRecord::new(id, ConflictType::StaleData, Severity::Medium)
            .with_stale_sources(sources.to_vec())
    }

    #[test]
    fn zero_intersections_is_no_data() {
        let snapshot = aggregate(std::iter::empty(), &[], Vec::new(), 42);
        assert_eq!(snapshot.total_intersections, 0);
        assert_eq!(snapshot.critical_intersections, 0);
        assert_eq!(snapshot.total_queued_vehicles, 0);
        assert_eq!(snapshot.average_aqi, 0.0);
        assert_eq!(snapshot.average_congestion, 0.0);
        assert!(snapshot.no_data);
        assert_eq!(snapshot.health, None);
        assert!(snapshot.hotspots.is_empty());
        assert_eq!(snapshot.recommendations.len(), 1);
        assert_eq!(
            snapshot.recommendations[0].kind,
            RecommendationKind::DriverAlerts
        );
    }

    #[test]
    fn averages_and_counts() {
        let states = [
            state("a", 57.0, 0.2, 10),
            state("b", 113.0, 0.4, 20),
            state("c", 160.0, 0.75, 60),
        ];
        let snapshot = aggregate(&states, &[], Vec::new(), 0);
        assert_eq!(snapshot.total_intersections, 3);
        assert!((snapshot.average_aqi - 110.0).abs() < 1e-9);
        assert!((snapshot.average_congestion - 0.45).abs() < 1e-9);
        assert_eq!(snapshot.total_queued_vehicles, 90);
        // c: Poor AQI and Severe congestion
        assert_eq!(snapshot.critical_intersections, 1);
        // b: Moderate AQI
        assert_eq!(snapshot.high_priority_intersections, 2);
        assert!(!snapshot.no_data);
    }

    #[test]
    fn critical_conflict_counts_as_critical() {
        let states = [state("a", 20.0, 0.1, 96)];
        // queue ratio 0.96 already makes it Critical priority; count once
        let conflicts = [ConflictRecord::new(
            "a",
            ConflictType::QueueOverflow,
            Severity::Critical,
        )];
        let snapshot = aggregate(&states, &conflicts, Vec::new(), 0);
        assert_eq!(snapshot.critical_intersections, 1);
    }

    #[test]
    fn long_stale_intersections_leave_averages() {
        let both = [DataSource::AirQuality, DataSource::Traffic];
        let fresh = state("a", 100.0, 0.2, 0);
        let mut stale = state("b", 300.0, 0.9, 0);
        stale.air_quality_stale_ticks = STALE_TICKS_EXCLUDED + 1;
        stale.traffic_stale_ticks = STALE_TICKS_EXCLUDED + 1;
        let conflicts = [stale_conflict("b", &both)];

        let snapshot = aggregate([&fresh, &stale], &conflicts, Vec::new(), 0);
        assert_eq!(snapshot.total_intersections, 2);
        assert_eq!(snapshot.stale_intersections, 1);
        assert_eq!(snapshot.average_aqi, 100.0);
        assert!((snapshot.average_congestion - 0.2).abs() < 1e-9);

        // flagged for only two ticks still counts
        stale.air_quality_stale_ticks = STALE_TICKS_EXCLUDED;
        stale.traffic_stale_ticks = STALE_TICKS_EXCLUDED;
        let snapshot = aggregate([&fresh, &stale], &conflicts, Vec::new(), 0);
        assert_eq!(snapshot.average_aqi, 200.0);
    }

    #[test]
    fn stale_air_quality_leaves_congestion_in_averages() {
        let fresh = state("a", 100.0, 0.2, 0);
        let mut half = state("b", 300.0, 0.8, 0);
        half.air_quality_stale_ticks = STALE_TICKS_EXCLUDED + 1;
        let conflicts = [stale_conflict("b", &[DataSource::AirQuality])];

        let snapshot = aggregate([&fresh, &half], &conflicts, Vec::new(), 0);
        assert_eq!(snapshot.average_aqi, 100.0);
        assert!((snapshot.average_congestion - 0.5).abs() < 1e-9);
        assert!(!snapshot.no_data);
    }

    #[test]
    fn health_guidance_follows_average_aqi() {
        let states = [state("a", 120.0, 0.2, 0), state("b", 200.0, 0.2, 0)];
        let snapshot = aggregate(&states, &[], Vec::new(), 0);
        let health = snapshot.health.unwrap();
        assert_eq!(health.level, AqiLevel::Poor);
        assert!(health.work_from_home);

        let clean = [state("a", 30.0, 0.2, 0)];
        let snapshot = aggregate(&clean, &[], Vec::new(), 0);
        assert_eq!(snapshot.health.map(|h| h.level), Some(AqiLevel::Good));
    }

    #[test]
    fn recommendations_follow_network_thresholds() {
        let states: Vec<_> = (0..10)
            .map(|i| state(&format!("i{i}"), 180.0, 0.8, 70))
            .collect();
        let snapshot = aggregate(&states, &[], Vec::new(), 0);
        let kinds: Vec<_> = snapshot.recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecommendationKind::EmergencyEmissionMode,
                RecommendationKind::GreenWaveActivation,
                RecommendationKind::DynamicRerouting,
                RecommendationKind::TransitFrequency,
                RecommendationKind::DriverAlerts,
            ]
        );
    }

    #[test]
    fn levels_only_states_count_without_averages() {
        let state = IntersectionState::observed(
            "a",
            "a",
            100,
            AirQualityUpdate::new(AqiLevel::Good, 0),
            TrafficUpdate::new(CongestionLevel::FreeFlow, 3, 0),
        );
        let snapshot = aggregate([&state], &[], Vec::new(), 0);
        assert_eq!(snapshot.total_intersections, 1);
        assert_eq!(snapshot.total_queued_vehicles, 3);
        assert!(snapshot.no_data);
    }
}
