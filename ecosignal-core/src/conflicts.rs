//! Conflict Detection
//!
//! ## Overview
//!
//! Flags anomalies on one intersection. Three rules run independently, so
//! one intersection can carry several records in the same tick:
//!
//! | Rule | Condition | Severity |
//! |------|-----------|----------|
//! | QueueOverflow | `queue / capacity >= 0.9` | High, Critical from 0.95 |
//! | StaleData | `now - update time > stale threshold` for either source | Medium |
//! | PhaseOverlap | adjacent corridor member with a different strategy starts green within the minimum separation | High |
//!
//! A StaleData record lists the sources past the threshold, so a silent
//! air-quality feed is told apart from a silent traffic feed.
//!
//! Records are rebuilt every tick and never persisted. Each one carries a
//! fixed recommendation chosen from its type and severity.
//!
//! ## Laziness
//!
//! [`ConflictDetector::detect`] returns a [`Conflicts`] iterator that
//! evaluates the rules as it is pulled. It is finite and `Clone`, so a
//! caller can restart evaluation from a saved copy.
//!
//! ## Phase Links
//!
//! PhaseOverlap needs the neighbour's strategy and green start, which a
//! single [`IntersectionState`] does not have. The engine builds a
//! [`PhaseLink`] for every adjacent pair of each coordinated corridor and
//! hands the downstream intersection's links to the detector.

use serde::{Deserialize, Serialize};

use crate::constants::{QUEUE_CRITICAL_RATIO, QUEUE_OVERFLOW_RATIO, SIGNAL_CYCLE_S};
use crate::errors::{EngineError, EngineResult};
use crate::readings::DataSource;
use crate::signal_plan::circular_distance;
use crate::store::IntersectionState;
use crate::strategy::Strategy;
use crate::time::{age_ms, Timestamp};

/// Kind of anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConflictType {
    QueueOverflow,
    PhaseOverlap,
    StaleData,
}

/// Conflict severity, ordered from informational to urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One detected anomaly
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    pub intersection_id: String,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub recommendation: &'static str,
    /// Corridor the conflict was found in (PhaseOverlap only)
    pub corridor_id: Option<String>,
    /// Sources past the stale threshold (StaleData only)
    pub stale_sources: Vec<DataSource>,
}

impl ConflictRecord {
    pub fn new(
        intersection_id: impl Into<String>,
        conflict_type: ConflictType,
        severity: Severity,
    ) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            conflict_type,
            severity,
            recommendation: recommendation(conflict_type, severity),
            corridor_id: None,
            stale_sources: Vec::new(),
        }
    }

    pub fn with_stale_sources(mut self, sources: Vec<DataSource>) -> Self {
        self.stale_sources = sources;
        self
    }

    fn in_corridor(mut self, corridor_id: &str) -> Self {
        self.corridor_id = Some(corridor_id.to_string());
        self
    }
}

/// Fixed recommendation text per type and severity
pub const fn recommendation(conflict_type: ConflictType, severity: Severity) -> &'static str {
    match (conflict_type, severity) {
        (ConflictType::QueueOverflow, Severity::Critical) => {
            "Extend green on the congested approach and hold upstream releases"
        }
        (ConflictType::QueueOverflow, _) => "Extend green on the congested approach",
        (ConflictType::StaleData, _) => "Fall back to the fixed-time plan until fresh readings arrive",
        (ConflictType::PhaseOverlap, _) => "Re-time adjacent phases to restore minimum separation",
    }
}

/// Queue occupancy thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueThresholds {
    /// Ratio raising a High QueueOverflow
    pub overflow: f64,
    /// Ratio escalating it to Critical
    pub critical: f64,
}

impl Default for QueueThresholds {
    fn default() -> Self {
        Self {
            overflow: QUEUE_OVERFLOW_RATIO,
            critical: QUEUE_CRITICAL_RATIO,
        }
    }
}

impl QueueThresholds {
    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0 < self.overflow && self.overflow <= self.critical) {
            return Err(EngineError::InvalidConfig(format!(
                "queue thresholds must satisfy 0 < overflow <= critical, got {}/{}",
                self.overflow, self.critical
            )));
        }
        Ok(())
    }
}

/// Upstream neighbour of an intersection in a coordinated corridor
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseLink {
    pub corridor_id: String,
    pub upstream_id: String,
    pub upstream_strategy: Strategy,
    /// Upstream green start within the cycle (s)
    pub upstream_green_start_s: u32,
    /// Green start of the linked intersection within the cycle (s)
    pub green_start_s: u32,
}

/// Rule evaluation for one tick
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    queue: QueueThresholds,
    stale_threshold_ms: u64,
    min_phase_separation_s: u32,
    cycle_s: u32,
    now: Timestamp,
}

impl ConflictDetector {
    pub fn new(
        queue: QueueThresholds,
        stale_threshold_ms: u64,
        min_phase_separation_s: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            queue,
            stale_threshold_ms,
            min_phase_separation_s,
            cycle_s: SIGNAL_CYCLE_S,
            now,
        }
    }

    /// Conflicts for one intersection, evaluated lazily
    pub fn detect<'a>(
        &'a self,
        state: &'a IntersectionState,
        links: &'a [PhaseLink],
    ) -> Conflicts<'a> {
        Conflicts {
            detector: self,
            state,
            links: links.iter(),
            rule: Rule::Queue,
        }
    }

    fn queue_overflow(&self, state: &IntersectionState) -> Option<ConflictRecord> {
        if state.queue_capacity == 0 {
            return None;
        }
        let ratio = state.queue_ratio();
        let severity = if ratio >= self.queue.critical {
            Severity::Critical
        } else if ratio >= self.queue.overflow {
            Severity::High
        } else {
            return None;
        };
        Some(ConflictRecord::new(&state.id, ConflictType::QueueOverflow, severity))
    }

    fn stale_data(&self, state: &IntersectionState) -> Option<ConflictRecord> {
        let sources: Vec<DataSource> = DataSource::ALL
            .into_iter()
            .filter(|source| age_ms(state.updated_at(*source), self.now) > self.stale_threshold_ms)
            .collect();
        if sources.is_empty() {
            return None;
        }
        Some(
            ConflictRecord::new(&state.id, ConflictType::StaleData, Severity::Medium)
                .with_stale_sources(sources),
        )
    }

    fn phase_overlap(&self, state: &IntersectionState, link: &PhaseLink) -> Option<ConflictRecord> {
        let strategy = state.strategy?;
        if strategy == link.upstream_strategy {
            return None;
        }
        let separation =
            circular_distance(link.green_start_s, link.upstream_green_start_s, self.cycle_s);
        (separation < self.min_phase_separation_s).then(|| {
            ConflictRecord::new(&state.id, ConflictType::PhaseOverlap, Severity::High)
                .in_corridor(&link.corridor_id)
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Queue,
    Stale,
    Phase,
}

/// Lazy conflict sequence for one intersection
#[derive(Debug, Clone)]
pub struct Conflicts<'a> {
    detector: &'a ConflictDetector,
    state: &'a IntersectionState,
    links: std::slice::Iter<'a, PhaseLink>,
    rule: Rule,
}

impl Iterator for Conflicts<'_> {
    type Item = ConflictRecord;

    fn next(&mut self) -> Option<ConflictRecord> {
        loop {
            match self.rule {
                Rule::Queue => {
                    self.rule = Rule::Stale;
                    if let Some(record) = self.detector.queue_overflow(self.state) {
                        return Some(record);
                    }
                }
                Rule::Stale => {
                    self.rule = Rule::Phase;
                    if let Some(record) = self.detector.stale_data(self.state) {
                        return Some(record);
                    }
                }
                Rule::Phase => {
                    let (detector, state) = (self.detector, self.state);
                    return self
                        .links
                        .by_ref()
                        .find_map(|link| detector.phase_overlap(state, link));
                }
            }
        }
    }
}
