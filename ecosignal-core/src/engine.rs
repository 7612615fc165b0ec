//! Per-tick decision engine
//!
//! ## Overview
//!
//! [`Engine`] owns the intersection store and runs one tick at a time over
//! whatever readings the providers delivered:
//!
//! ```text
//! TickInput ─► classify (per source) ─► apply to store
//!                                              │
//!                        snapshot ◄────────────┘
//!                           │
//!                           ├─► select strategy (per intersection) ─► record
//!                           │
//!               decided snapshot
//!                           ├─► coordinate (per corridor) ─► phase links
//!                           ├─► detect conflicts (per intersection) ─► stale streaks
//!                           └─► speed advisories (per segment)
//!                                              │
//!                          final snapshot ◄────┘
//!                           └─► aggregate + hotspots ─► TickReport
//! ```
//!
//! Each source updates an intersection on its own. A valid traffic reading
//! refreshes congestion and queue even when the air-quality provider was
//! silent, and the other way round; the missing source keeps its last-known
//! values and ages towards StaleData. Failures stay with the entity they
//! concern: an invalid reading, an uncoordinated corridor or an unknown id
//! is logged and the rest of the tick proceeds.
//!
//! The engine does no I/O and never reads the clock. The caller passes
//! `now`, which keeps ticks reproducible in tests.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::advisory::{advise_speed, SpeedAdvisory};
use crate::aggregate::{aggregate, NetworkStatusSnapshot};
use crate::conflicts::{ConflictDetector, ConflictRecord, PhaseLink};
use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::green_wave::{coordinate, CorridorStatus};
use crate::hotspots::detect_hotspots;
use crate::readings::{AirQualityReading, DataSource, TrafficReading};
use crate::store::{
    AirQualityUpdate, ClassifiedReading, IntersectionStore, StoreSnapshot, TrafficUpdate,
};
use crate::strategy::{select_strategy, StrategyDecision};
use crate::time::Timestamp;

/// Readings delivered by the providers for one tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Keyed by location id
    pub air_quality: BTreeMap<String, AirQualityReading>,
    /// Keyed by segment id
    pub traffic: BTreeMap<String, TrafficReading>,
}

impl TickInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_air_quality(mut self, reading: AirQualityReading) -> Self {
        self.add_air_quality(reading);
        self
    }

    pub fn with_traffic(mut self, reading: TrafficReading) -> Self {
        self.add_traffic(reading);
        self
    }

    pub fn add_air_quality(&mut self, reading: AirQualityReading) {
        self.air_quality.insert(reading.location_id.clone(), reading);
    }

    pub fn add_traffic(&mut self, reading: TrafficReading) {
        self.traffic.insert(reading.segment_id.clone(), reading);
    }

    pub fn is_empty(&self) -> bool {
        self.air_quality.is_empty() && self.traffic.is_empty()
    }
}

/// Everything one tick produced
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub snapshot: NetworkStatusSnapshot,
    /// Intersection states at the end of the tick
    #[serde(skip)]
    pub states: StoreSnapshot,
    pub decisions: Vec<StrategyDecision>,
    pub conflicts: Vec<ConflictRecord>,
    pub advisories: Vec<SpeedAdvisory>,
    /// Intersections whose state changed this tick
    pub updated_intersections: usize,
    /// Readings discarded at validation, counted per intersection
    pub rejected_readings: usize,
}

impl TickReport {
    /// Report served before the first tick completes
    pub fn empty(now: Timestamp) -> Self {
        Self {
            tick: 0,
            snapshot: NetworkStatusSnapshot::empty(now),
            states: StoreSnapshot::default(),
            decisions: Vec::new(),
            conflicts: Vec::new(),
            advisories: Vec::new(),
            updated_intersections: 0,
            rejected_readings: 0,
        }
    }

    pub fn decision(&self, intersection_id: &str) -> Option<&StrategyDecision> {
        self.decisions
            .iter()
            .find(|d| d.intersection_id == intersection_id)
    }

    pub fn conflicts_for<'a>(
        &'a self,
        intersection_id: &'a str,
    ) -> impl Iterator<Item = &'a ConflictRecord> {
        self.conflicts
            .iter()
            .filter(move |c| c.intersection_id == intersection_id)
    }
}

/// Single-writer decision engine
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    store: IntersectionStore,
    corridor_status: BTreeMap<String, CorridorStatus>,
    tick: u64,
}

impl Engine {
    /// Validate the configuration and build an engine with an empty store
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let store = IntersectionStore::new(config.intersections.iter().cloned())
            .with_window_samples(config.hotspots.window_samples);
        Ok(Self {
            config,
            store,
            corridor_status: BTreeMap::new(),
            tick: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &IntersectionStore {
        &self.store
    }

    /// Completed ticks
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Run one tick over the delivered readings
    pub fn run_tick(&mut self, input: &TickInput, now: Timestamp) -> TickReport {
        let (updated, rejected) = self.apply_input(input);

        let observed = self.store.snapshot();
        let decisions: Vec<StrategyDecision> = observed
            .iter()
            .map(|state| select_strategy(state, &self.config.strategy_table, now))
            .collect();
        for decision in &decisions {
            debug!(
                "Intersection {}: {} (priority {:?}, green {}s)",
                decision.intersection_id,
                decision.strategy.name(),
                decision.priority,
                decision.plan.green_s
            );
            if let Err(e) = self
                .store
                .record_strategy(&decision.intersection_id, decision.strategy)
            {
                warn!("Cannot record strategy: {e}");
            }
        }

        let decided = self.store.snapshot();
        let corridors = self.coordinate_corridors(&decided, now);
        let links = phase_links(&corridors, &decisions);

        let detector = ConflictDetector::new(
            self.config.queue_overflow,
            self.config.stale_threshold_ms(),
            self.config.min_phase_separation_secs,
            now,
        );
        let conflicts: Vec<ConflictRecord> = decided
            .iter()
            .flat_map(|state| {
                let links = links.get(state.id.as_str()).map_or(&[][..], Vec::as_slice);
                detector.detect(state, links).collect::<Vec<_>>()
            })
            .collect();

        let advisories = self.speed_advisories(input, &decided);

        let stale: BTreeMap<String, Vec<DataSource>> = conflicts
            .iter()
            .filter(|c| !c.stale_sources.is_empty())
            .map(|c| (c.intersection_id.clone(), c.stale_sources.clone()))
            .collect();
        self.store.record_staleness(&stale);

        let states = self.store.snapshot();
        let hotspots = detect_hotspots(states.iter(), &self.config.hotspots);
        for hotspot in &hotspots {
            debug!(
                "Hotspot at {}: {:?} {:?}, average {:.2} over {} samples",
                hotspot.intersection_id,
                hotspot.kind,
                hotspot.pattern,
                hotspot.average,
                hotspot.samples
            );
        }
        let snapshot =
            aggregate(states.iter(), &conflicts, corridors, now).with_hotspots(hotspots);
        self.tick += 1;

        info!(
            "Tick {}: {} updated, {} rejected, {} conflicts, {} critical, avg AQI {:.0}, avg congestion {:.2}",
            self.tick,
            updated.len(),
            rejected,
            conflicts.len(),
            snapshot.critical_intersections,
            snapshot.average_aqi,
            snapshot.average_congestion
        );

        TickReport {
            tick: self.tick,
            snapshot,
            states,
            decisions,
            conflicts,
            advisories,
            updated_intersections: updated.len(),
            rejected_readings: rejected,
        }
    }

    fn apply_input(&mut self, input: &TickInput) -> (BTreeSet<String>, usize) {
        let mut updated = BTreeSet::new();
        let mut rejected = 0;

        for intersection in &self.config.intersections {
            let mut reading = ClassifiedReading {
                intersection_id: intersection.id.clone(),
                air_quality: None,
                traffic: None,
            };
            if let Some(air) = input.air_quality.get(&intersection.location_id) {
                match AirQualityUpdate::classify(air) {
                    Ok(update) => reading.air_quality = Some(update),
                    Err(e) => {
                        warn!("Intersection {}: air-quality reading discarded: {e}", intersection.id);
                        rejected += 1;
                    }
                }
            }
            if let Some(traffic) = input.traffic.get(&intersection.segment_id) {
                match TrafficUpdate::classify(
                    intersection,
                    traffic,
                    &self.config.congestion_boundaries,
                ) {
                    Ok(update) => reading.traffic = Some(update),
                    Err(e) => {
                        warn!("Intersection {}: traffic reading discarded: {e}", intersection.id);
                        rejected += 1;
                    }
                }
            }
            if reading.is_empty() {
                debug!("Intersection {}: no readings this tick", intersection.id);
                continue;
            }

            match self.store.apply_reading(reading) {
                Ok(true) => {
                    updated.insert(intersection.id.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Intersection {}: reading discarded: {e}", intersection.id);
                    rejected += 1;
                }
            }
        }
        (updated, rejected)
    }

    fn coordinate_corridors(&mut self, states: &StoreSnapshot, now: Timestamp) -> Vec<CorridorStatus> {
        let mut statuses = Vec::with_capacity(self.config.corridors.len());
        for corridor in &self.config.corridors {
            let status = match coordinate(corridor, states, now) {
                Ok(status) => status,
                Err(e) => {
                    if e.degrades_corridor() {
                        warn!("Corridor {} not coordinated this tick: {e}", corridor.id);
                    } else {
                        error!("Corridor {} failed: {e}", corridor.id);
                    }
                    self.corridor_status
                        .get(&corridor.id)
                        .cloned()
                        .map(CorridorStatus::into_stale)
                        .unwrap_or_else(|| CorridorStatus::pending(corridor, now))
                }
            };
            self.corridor_status
                .insert(corridor.id.clone(), status.clone());
            statuses.push(status);
        }
        statuses
    }

    fn speed_advisories(&self, input: &TickInput, states: &StoreSnapshot) -> Vec<SpeedAdvisory> {
        let mut seen = BTreeSet::new();
        let mut advisories = Vec::new();

        for intersection in &self.config.intersections {
            let Some(reading) = input.traffic.get(&intersection.segment_id) else {
                continue;
            };
            let Some(state) = states.get(&intersection.id) else {
                continue;
            };
            if !seen.insert(intersection.segment_id.as_str()) {
                continue;
            }

            match advise_speed(
                reading,
                state.aqi_level,
                &self.config.congestion_boundaries,
                self.config.speed_safety_margin,
            ) {
                Ok(advisory) => {
                    if advisory.speeding_flagged {
                        warn!(
                            "Segment {}: {:.0} km/h above free-flow {:.0} km/h",
                            reading.segment_id, reading.current_speed, reading.free_flow_speed
                        );
                    }
                    advisories.push(advisory);
                }
                Err(e) => debug!("Segment {}: no advisory: {e}", reading.segment_id),
            }
        }
        advisories
    }
}

/// Upstream links of every member of a freshly coordinated corridor
fn phase_links(
    corridors: &[CorridorStatus],
    decisions: &[StrategyDecision],
) -> BTreeMap<String, Vec<PhaseLink>> {
    let decisions: BTreeMap<&str, &StrategyDecision> = decisions
        .iter()
        .map(|d| (d.intersection_id.as_str(), d))
        .collect();

    let mut links: BTreeMap<String, Vec<PhaseLink>> = BTreeMap::new();
    for status in corridors.iter().filter(|status| !status.stale) {
        for pair in status.offsets.windows(2) {
            let (upstream, downstream) = (&pair[0], &pair[1]);
            let (Some(up), Some(down)) = (
                decisions.get(upstream.intersection_id.as_str()),
                decisions.get(downstream.intersection_id.as_str()),
            ) else {
                continue;
            };
            links
                .entry(downstream.intersection_id.clone())
                .or_default()
                .push(PhaseLink {
                    corridor_id: status.corridor_id.clone(),
                    upstream_id: upstream.intersection_id.clone(),
                    upstream_strategy: up.strategy,
                    upstream_green_start_s: up.plan.green_start(upstream.offset_s),
                    green_start_s: down.plan.green_start(downstream.offset_s),
                });
        }
    }
    links
}
