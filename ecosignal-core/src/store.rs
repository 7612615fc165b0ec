//! Intersection State Store
//!
//! ## Overview
//!
//! The store owns one [`IntersectionState`] per observed intersection. It is
//! an in-memory projection: it never talks to providers and is only written
//! by the tick driver through [`IntersectionStore::apply_reading`],
//! [`IntersectionStore::record_strategy`] and
//! [`IntersectionStore::record_staleness`].
//!
//! ## Partial Updates
//!
//! Air quality and traffic arrive from independent providers. Each half of a
//! [`ClassifiedReading`] replaces only its own fields and capture time, so a
//! failing provider leaves the other source's values current. An
//! intersection enters the store once both halves have been seen; a half
//! that arrives first is held until its partner shows up.
//!
//! ## Snapshots
//!
//! States are held behind an `Arc` and written copy-on-write. A
//! [`StoreSnapshot`] taken at any point is an immutable view: later writes
//! clone the map instead of mutating what readers hold, so every stage of a
//! tick sees the same consistent state.
//!
//! ```text
//! tick start ── snapshot() ──► selector / detector / coordinator (read)
//!     │
//!     └── apply_reading() ──► Arc::make_mut ──► new map for the next snapshot
//! ```
//!
//! ## Staleness
//!
//! `record_staleness` counts, per source, consecutive ticks that ended with
//! the source flagged by a StaleData conflict. The aggregator reads the
//! counters to leave long-stale values out of network averages.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::classifier::{classify_aqi, AqiLevel, CongestionBoundaries, CongestionLevel};
use crate::config::IntersectionConfig;
use crate::constants::{
    HOTSPOT_WINDOW_SAMPLES, PRIORITY_CRITICAL_QUEUE_RATIO, PRIORITY_HIGH_QUEUE_RATIO,
};
use crate::errors::{EngineError, EngineResult};
use crate::hotspots::SampleWindow;
use crate::readings::{AirQualityReading, DataSource, TrafficReading};
use crate::strategy::Strategy;
use crate::time::Timestamp;

/// Intersection priority, ordered from routine to urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

/// Classified air-quality half of an intersection update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirQualityUpdate {
    pub level: AqiLevel,
    /// Raw AQI index the level came from
    pub index: Option<f64>,
    pub captured_at: Timestamp,
}

impl AirQualityUpdate {
    pub fn new(level: AqiLevel, captured_at: Timestamp) -> Self {
        Self {
            level,
            index: None,
            captured_at,
        }
    }

    /// Validate and classify a provider reading
    pub fn classify(reading: &AirQualityReading) -> EngineResult<Self> {
        reading.validate()?;
        Ok(Self {
            level: classify_aqi(reading.index_value)?,
            index: Some(reading.index_value),
            captured_at: reading.captured_at,
        })
    }
}

/// Classified traffic half of an intersection update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficUpdate {
    pub level: CongestionLevel,
    /// Raw congestion fraction the level came from
    pub congestion: Option<f64>,
    pub queue_count: u32,
    pub captured_at: Timestamp,
}

impl TrafficUpdate {
    pub fn new(level: CongestionLevel, queue_count: u32, captured_at: Timestamp) -> Self {
        Self {
            level,
            congestion: None,
            queue_count,
            captured_at,
        }
    }

    /// Validate and classify a provider reading; the queue is estimated
    /// against the intersection's capacity when the provider has no count
    pub fn classify(
        intersection: &IntersectionConfig,
        reading: &TrafficReading,
        boundaries: &CongestionBoundaries,
    ) -> EngineResult<Self> {
        reading.validate()?;
        Ok(Self {
            level: boundaries.classify(reading.congestion)?,
            congestion: Some(reading.congestion),
            queue_count: reading.queue_estimate(intersection.queue_capacity),
            captured_at: reading.captured_at,
        })
    }
}

/// Classified readings for one intersection; either half may be missing
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedReading {
    pub intersection_id: String,
    pub air_quality: Option<AirQualityUpdate>,
    pub traffic: Option<TrafficUpdate>,
}

impl ClassifiedReading {
    /// Complete pair captured at `timestamp`
    pub fn new(
        intersection_id: impl Into<String>,
        aqi_level: AqiLevel,
        congestion_level: CongestionLevel,
        queue_count: u32,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            air_quality: Some(AirQualityUpdate::new(aqi_level, timestamp)),
            traffic: Some(TrafficUpdate::new(congestion_level, queue_count, timestamp)),
        }
    }

    pub fn air_quality_only(intersection_id: impl Into<String>, update: AirQualityUpdate) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            air_quality: Some(update),
            traffic: None,
        }
    }

    pub fn traffic_only(intersection_id: impl Into<String>, update: TrafficUpdate) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            air_quality: None,
            traffic: Some(update),
        }
    }

    /// Attach the raw values the levels were derived from
    pub fn with_raw(mut self, aqi_index: f64, congestion: f64) -> Self {
        if let Some(air) = self.air_quality.as_mut() {
            air.index = Some(aqi_index);
        }
        if let Some(traffic) = self.traffic.as_mut() {
            traffic.congestion = Some(congestion);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.air_quality.is_none() && self.traffic.is_none()
    }

    /// Fold a later reading into this one, newer halves win
    fn merge(&mut self, later: ClassifiedReading) {
        if later.air_quality.is_some() {
            self.air_quality = later.air_quality;
        }
        if later.traffic.is_some() {
            self.traffic = later.traffic;
        }
    }
}

/// Latest known state of one intersection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionState {
    pub id: String,
    pub name: String,
    pub aqi_level: AqiLevel,
    pub congestion_level: CongestionLevel,
    pub aqi_index: Option<f64>,
    pub congestion: Option<f64>,
    pub queue_count: u32,
    pub queue_capacity: u32,
    /// Capture time of the newest value from either source
    pub last_update: Timestamp,
    pub air_quality_updated: Timestamp,
    pub traffic_updated: Timestamp,
    /// Strategy chosen on the most recent tick, if any
    pub strategy: Option<Strategy>,
    /// Consecutive ticks ending with air quality flagged stale
    pub air_quality_stale_ticks: u32,
    /// Consecutive ticks ending with traffic flagged stale
    pub traffic_stale_ticks: u32,
    #[serde(skip)]
    aqi_window: SampleWindow,
    #[serde(skip)]
    congestion_window: SampleWindow,
}

impl IntersectionState {
    /// State created by the first observation of both sources
    pub fn observed(
        id: impl Into<String>,
        name: impl Into<String>,
        queue_capacity: u32,
        air: AirQualityUpdate,
        traffic: TrafficUpdate,
    ) -> Self {
        let mut state = Self {
            id: id.into(),
            name: name.into(),
            aqi_level: air.level,
            congestion_level: traffic.level,
            aqi_index: None,
            congestion: None,
            queue_count: 0,
            queue_capacity,
            last_update: 0,
            air_quality_updated: 0,
            traffic_updated: 0,
            strategy: None,
            air_quality_stale_ticks: 0,
            traffic_stale_ticks: 0,
            aqi_window: SampleWindow::new(HOTSPOT_WINDOW_SAMPLES),
            congestion_window: SampleWindow::new(HOTSPOT_WINDOW_SAMPLES),
        };
        state.apply_air_quality(air);
        state.apply_traffic(traffic);
        state
    }

    /// Resize the hotspot windows, keeping the newest samples that fit
    pub fn with_window_capacity(mut self, samples: usize) -> Self {
        self.aqi_window.resize(samples);
        self.congestion_window.resize(samples);
        self
    }

    fn apply_air_quality(&mut self, update: AirQualityUpdate) {
        self.aqi_level = update.level;
        self.aqi_index = update.index;
        self.air_quality_updated = update.captured_at;
        self.last_update = self.air_quality_updated.max(self.traffic_updated);
        if let Some(index) = update.index {
            self.aqi_window.push(index);
        }
    }

    fn apply_traffic(&mut self, update: TrafficUpdate) {
        self.congestion_level = update.level;
        self.congestion = update.congestion;
        self.queue_count = update.queue_count;
        self.traffic_updated = update.captured_at;
        self.last_update = self.air_quality_updated.max(self.traffic_updated);
        if let Some(congestion) = update.congestion {
            self.congestion_window.push(congestion);
        }
    }

    fn apply(&mut self, reading: ClassifiedReading) {
        if let Some(air) = reading.air_quality {
            self.apply_air_quality(air);
        }
        if let Some(traffic) = reading.traffic {
            self.apply_traffic(traffic);
        }
    }

    /// Capture time of the last value from `source`
    pub fn updated_at(&self, source: DataSource) -> Timestamp {
        match source {
            DataSource::AirQuality => self.air_quality_updated,
            DataSource::Traffic => self.traffic_updated,
        }
    }

    pub fn stale_ticks(&self, source: DataSource) -> u32 {
        match source {
            DataSource::AirQuality => self.air_quality_stale_ticks,
            DataSource::Traffic => self.traffic_stale_ticks,
        }
    }

    /// Recent raw values of `source`, oldest first
    pub fn window(&self, source: DataSource) -> &SampleWindow {
        match source {
            DataSource::AirQuality => &self.aqi_window,
            DataSource::Traffic => &self.congestion_window,
        }
    }

    pub(crate) fn push_sample(&mut self, source: DataSource, value: f64) {
        match source {
            DataSource::AirQuality => self.aqi_window.push(value),
            DataSource::Traffic => self.congestion_window.push(value),
        }
    }

    fn record_staleness(&mut self, stale: &[DataSource]) {
        for source in DataSource::ALL {
            let counter = match source {
                DataSource::AirQuality => &mut self.air_quality_stale_ticks,
                DataSource::Traffic => &mut self.traffic_stale_ticks,
            };
            *counter = if stale.contains(&source) {
                counter.saturating_add(1)
            } else {
                0
            };
        }
    }

    /// Queued vehicles over capacity; zero capacity reads as empty
    pub fn queue_ratio(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 0.0;
        }
        self.queue_count as f64 / self.queue_capacity as f64
    }

    pub fn priority(&self) -> Priority {
        let ratio = self.queue_ratio();
        if self.congestion_level == CongestionLevel::Severe
            || self.aqi_level >= AqiLevel::Poor
            || ratio > PRIORITY_CRITICAL_QUEUE_RATIO
        {
            Priority::Critical
        } else if self.congestion_level >= CongestionLevel::Heavy
            || self.aqi_level >= AqiLevel::Moderate
            || ratio > PRIORITY_HIGH_QUEUE_RATIO
        {
            Priority::High
        } else if self.congestion_level >= CongestionLevel::Light
            || self.aqi_level >= AqiLevel::Satisfactory
        {
            Priority::Normal
        } else {
            Priority::Low
        }
    }
}

/// Immutable view of every observed intersection
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    states: Arc<BTreeMap<String, IntersectionState>>,
}

impl StoreSnapshot {
    pub fn get(&self, id: &str) -> Option<&IntersectionState> {
        self.states.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntersectionState> {
        self.states.values()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Single-writer owner of intersection state
#[derive(Debug, Clone)]
pub struct IntersectionStore {
    topology: BTreeMap<String, IntersectionConfig>,
    states: Arc<BTreeMap<String, IntersectionState>>,
    /// First halves of intersections not yet observed by both sources
    pending: BTreeMap<String, ClassifiedReading>,
    window_samples: usize,
}

impl Default for IntersectionStore {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl IntersectionStore {
    pub fn new(topology: impl IntoIterator<Item = IntersectionConfig>) -> Self {
        Self {
            topology: topology
                .into_iter()
                .map(|intersection| (intersection.id.clone(), intersection))
                .collect(),
            states: Arc::default(),
            pending: BTreeMap::new(),
            window_samples: HOTSPOT_WINDOW_SAMPLES,
        }
    }

    /// Samples kept per intersection and source for hotspot detection
    pub fn with_window_samples(mut self, samples: usize) -> Self {
        self.window_samples = samples;
        self
    }

    /// True when the id is part of the configured topology
    pub fn contains(&self, id: &str) -> bool {
        self.topology.contains_key(id)
    }

    pub fn topology(&self) -> impl Iterator<Item = &IntersectionConfig> {
        self.topology.values()
    }

    /// Apply whichever halves the reading carries.
    ///
    /// Returns `Ok(true)` when the intersection's state changed and
    /// `Ok(false)` while a never-observed intersection still waits for its
    /// other source.
    pub fn apply_reading(&mut self, reading: ClassifiedReading) -> EngineResult<bool> {
        let config = self
            .topology
            .get(&reading.intersection_id)
            .ok_or_else(|| EngineError::UnknownIntersection(reading.intersection_id.clone()))?;
        if reading.is_empty() {
            return Ok(false);
        }

        if self.states.contains_key(&reading.intersection_id) {
            if let Some(state) = Arc::make_mut(&mut self.states).get_mut(&config.id) {
                state.apply(reading);
            }
            return Ok(true);
        }

        let mut combined = match self.pending.remove(&reading.intersection_id) {
            Some(mut earlier) => {
                earlier.merge(reading);
                earlier
            }
            None => reading,
        };
        let (Some(air), Some(traffic)) = (combined.air_quality, combined.traffic) else {
            debug!(
                "Intersection {}: holding first reading until both sources report",
                config.id
            );
            combined.intersection_id = config.id.clone();
            self.pending.insert(config.id.clone(), combined);
            return Ok(false);
        };

        debug!("First observation of intersection {}", config.id);
        let state = IntersectionState::observed(
            config.id.clone(),
            config.name.clone(),
            config.queue_capacity,
            air,
            traffic,
        )
        .with_window_capacity(self.window_samples);
        Arc::make_mut(&mut self.states).insert(state.id.clone(), state);
        Ok(true)
    }

    /// Latest state; `Ok(None)` for a configured intersection never observed
    pub fn get_state(&self, id: &str) -> EngineResult<Option<&IntersectionState>> {
        if !self.contains(id) {
            return Err(EngineError::UnknownIntersection(id.to_string()));
        }
        Ok(self.states.get(id))
    }

    /// Remember the strategy chosen for an observed intersection
    pub fn record_strategy(&mut self, id: &str, strategy: Strategy) -> EngineResult<()> {
        if !self.contains(id) {
            return Err(EngineError::UnknownIntersection(id.to_string()));
        }
        if let Some(state) = Arc::make_mut(&mut self.states).get_mut(id) {
            state.strategy = Some(strategy);
        }
        Ok(())
    }

    /// Close a tick: sources listed for an intersection extend their stale
    /// streak, every other source resets it
    pub fn record_staleness(&mut self, stale: &BTreeMap<String, Vec<DataSource>>) {
        for (id, state) in Arc::make_mut(&mut self.states).iter_mut() {
            let sources = stale.get(id).map_or(&[][..], Vec::as_slice);
            state.record_staleness(sources);
        }
    }

    /// Immutable view of the current states
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            states: Arc::clone(&self.states),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IntersectionStore {
        IntersectionStore::new([
            IntersectionConfig::new("INT_001", "MG Road", "blr", "seg-1"),
            IntersectionConfig::new("INT_002", "Brigade Road", "blr", "seg-2"),
        ])
    }

    fn reading(id: &str, queue: u32, ts: Timestamp) -> ClassifiedReading {
        ClassifiedReading::new(id, AqiLevel::Moderate, CongestionLevel::Heavy, queue, ts)
    }

    fn stale(entries: &[(&str, &[DataSource])]) -> BTreeMap<String, Vec<DataSource>> {
        entries
            .iter()
            .map(|(id, sources)| (id.to_string(), sources.to_vec()))
            .collect()
    }

    #[test]
    fn first_reading_creates_state() {
        let mut store = store();
        assert_eq!(store.get_state("INT_001"), Ok(None));

        assert_eq!(store.apply_reading(reading("INT_001", 12, 1_000)), Ok(true));
        let state = store.get_state("INT_001").unwrap().unwrap();
        assert_eq!(state.name, "MG Road");
        assert_eq!(state.queue_count, 12);
        assert_eq!(state.queue_capacity, 100);
        assert_eq!(state.last_update, 1_000);
        assert_eq!(state.strategy, None);
    }

    #[test]
    fn later_reading_replaces_values() {
        let mut store = store();
        store.apply_reading(reading("INT_001", 12, 1_000)).unwrap();
        store
            .apply_reading(ClassifiedReading::new(
                "INT_001",
                AqiLevel::Good,
                CongestionLevel::FreeFlow,
                3,
                2_000,
            ))
            .unwrap();
        let state = store.get_state("INT_001").unwrap().unwrap();
        assert_eq!(state.aqi_level, AqiLevel::Good);
        assert_eq!(state.queue_count, 3);
        assert_eq!(state.last_update, 2_000);
    }

    #[test]
    fn traffic_alone_keeps_last_air_quality() {
        let mut store = store();
        store
            .apply_reading(reading("INT_001", 12, 1_000).with_raw(120.0, 0.55))
            .unwrap();

        let gridlock = TrafficUpdate {
            congestion: Some(0.95),
            ..TrafficUpdate::new(CongestionLevel::Severe, 95, 61_000)
        };
        assert_eq!(
            store.apply_reading(ClassifiedReading::traffic_only("INT_001", gridlock)),
            Ok(true)
        );

        let state = store.get_state("INT_001").unwrap().unwrap();
        assert_eq!(state.congestion_level, CongestionLevel::Severe);
        assert_eq!(state.congestion, Some(0.95));
        assert_eq!(state.queue_count, 95);
        assert_eq!(state.traffic_updated, 61_000);
        assert_eq!(state.aqi_level, AqiLevel::Moderate);
        assert_eq!(state.aqi_index, Some(120.0));
        assert_eq!(state.air_quality_updated, 1_000);
        assert_eq!(state.last_update, 61_000);
        assert_eq!(state.window(DataSource::Traffic).len(), 2);
        assert_eq!(state.window(DataSource::AirQuality).len(), 1);
    }

    #[test]
    fn first_halves_wait_for_their_partner() {
        let mut store = store();
        let air = AirQualityUpdate::new(AqiLevel::Poor, 1_000);
        assert_eq!(
            store.apply_reading(ClassifiedReading::air_quality_only("INT_002", air)),
            Ok(false)
        );
        assert_eq!(store.get_state("INT_002"), Ok(None));

        let traffic = TrafficUpdate::new(CongestionLevel::Light, 20, 61_000);
        assert_eq!(
            store.apply_reading(ClassifiedReading::traffic_only("INT_002", traffic)),
            Ok(true)
        );
        let state = store.get_state("INT_002").unwrap().unwrap();
        assert_eq!(state.aqi_level, AqiLevel::Poor);
        assert_eq!(state.air_quality_updated, 1_000);
        assert_eq!(state.congestion_level, CongestionLevel::Light);
        assert_eq!(state.traffic_updated, 61_000);
    }

    #[test]
    fn unknown_intersection_is_rejected() {
        let mut store = store();
        assert_eq!(
            store.apply_reading(reading("INT_404", 1, 0)),
            Err(EngineError::UnknownIntersection("INT_404".into()))
        );
        assert!(store.get_state("INT_404").is_err());
        assert!(store.record_strategy("INT_404", Strategy::Balanced).is_err());
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let mut store = store();
        store.apply_reading(reading("INT_001", 12, 1_000)).unwrap();
        let before = store.snapshot();

        store.apply_reading(reading("INT_001", 80, 2_000)).unwrap();
        store.apply_reading(reading("INT_002", 5, 2_000)).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(before.get("INT_001").unwrap().queue_count, 12);
        assert_eq!(store.snapshot().get("INT_001").unwrap().queue_count, 80);
    }

    #[test]
    fn stale_streaks_count_per_source() {
        let mut store = store();
        store.apply_reading(reading("INT_001", 1, 0)).unwrap();
        store.apply_reading(reading("INT_002", 1, 0)).unwrap();

        let flagged = stale(&[("INT_002", &[DataSource::AirQuality])]);
        store.record_staleness(&flagged);
        store.record_staleness(&flagged);

        let snapshot = store.snapshot();
        let fresh = snapshot.get("INT_001").unwrap();
        assert_eq!(fresh.stale_ticks(DataSource::AirQuality), 0);
        let aging = snapshot.get("INT_002").unwrap();
        assert_eq!(aging.stale_ticks(DataSource::AirQuality), 2);
        assert_eq!(aging.stale_ticks(DataSource::Traffic), 0);

        store.record_staleness(&stale(&[]));
        assert_eq!(store.snapshot().get("INT_002").unwrap().air_quality_stale_ticks, 0);
    }

    #[test]
    fn windows_are_bounded_by_the_store() {
        let mut store = store().with_window_samples(2);
        for (i, aqi) in [100.0, 200.0, 300.0].into_iter().enumerate() {
            store
                .apply_reading(reading("INT_001", 1, i as u64).with_raw(aqi, 0.5))
                .unwrap();
        }
        let snapshot = store.snapshot();
        let window = snapshot.get("INT_001").unwrap().window(DataSource::AirQuality);
        assert_eq!(window.len(), 2);
        assert_eq!(window.mean(), Some(250.0));
    }

    #[test]
    fn priority_levels() {
        let base = IntersectionState::observed(
            "INT_001",
            "MG Road",
            100,
            AirQualityUpdate::new(AqiLevel::Good, 0),
            TrafficUpdate::new(CongestionLevel::FreeFlow, 0, 0),
        );
        assert_eq!(base.priority(), Priority::Low);

        let mut state = base.clone();
        state.aqi_level = AqiLevel::Satisfactory;
        assert_eq!(state.priority(), Priority::Normal);

        let mut state = base.clone();
        state.queue_count = 31;
        assert_eq!(state.priority(), Priority::High);

        let mut state = base.clone();
        state.aqi_level = AqiLevel::Poor;
        assert_eq!(state.priority(), Priority::Critical);

        let mut state = base;
        state.queue_count = 51;
        assert_eq!(state.priority(), Priority::Critical);
    }

    #[test]
    fn traffic_classification_estimates_queue() {
        let config = IntersectionConfig::new("INT_001", "MG Road", "blr", "seg-1");
        let traffic = TrafficReading::new("seg-1", 23.4, 60.0, 0.61, 1_500);

        let update =
            TrafficUpdate::classify(&config, &traffic, &CongestionBoundaries::default()).unwrap();
        assert_eq!(update.level, CongestionLevel::Heavy);
        assert_eq!(update.queue_count, 61);
        assert_eq!(update.captured_at, 1_500);
        assert_eq!(update.congestion, Some(0.61));

        let air = AirQualityUpdate::classify(&AirQualityReading::new("blr", 57.0, 1_000)).unwrap();
        assert_eq!(air.level, AqiLevel::Satisfactory);
        assert_eq!(air.index, Some(57.0));
    }

    #[test]
    fn invalid_air_quality_is_rejected() {
        let air = AirQualityReading::new("blr", -4.0, 1_000);
        assert!(matches!(
            AirQualityUpdate::classify(&air),
            Err(EngineError::InvalidReading { .. })
        ));
    }
}
