//! Green Wave Coordination
//!
//! ## Overview
//!
//! A green wave lines up the signals of a corridor so a vehicle travelling at
//! the target speed meets consecutive greens. The first intersection anchors
//! the wave at offset 0; every following one starts green when the platoon
//! arrives:
//!
//! ```text
//! offset_0 = 0
//! offset_i = round(offset_{i-1} + (position_i - position_{i-1}) / target_speed)
//!
//! position:   0 m ──── 500 m ─────── 1200 m      @ 36 km/h (10 m/s)
//! offset:     0 s      50 s          120 s
//! ```
//!
//! Corridor distances are cumulative positions from the corridor start, so
//! offsets never decrease along the corridor.
//!
//! ## Derived Metrics
//!
//! Nothing here is measured. Travel time follows from distance and speed,
//! and the stop and emission reductions are looked up from
//! [`GREEN_WAVE_GAINS`] by the corridor's dominant strategy (majority vote,
//! ties broken EmissionPriority > FlowPriority > Balanced).
//!
//! ## Degradation
//!
//! A corridor with fewer than two intersections fails with
//! `CorridorTooShort`; one whose members are not all in the store fails with
//! `MissingIntersectionState`. The engine then keeps the previous
//! [`CorridorStatus`] and marks it stale.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::CongestionLevel;
use crate::constants::{CORRIDOR_OPTIMIZATION_CONGESTION, MPS_PER_KMH};
use crate::errors::{EngineError, EngineResult};
use crate::store::{IntersectionState, StoreSnapshot};
use crate::strategy::Strategy;
use crate::time::Timestamp;

/// Ordered chain of intersections coordinated together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Intersection ids in travel order
    pub intersections: Vec<String>,
    /// Cumulative position of each intersection from the corridor start (m)
    pub distances_m: Vec<f64>,
    /// Design speed of the wave (km/h)
    pub target_speed_kmh: f64,
}

impl Corridor {
    pub fn new(
        id: impl Into<String>,
        intersections: impl IntoIterator<Item = impl Into<String>>,
        distances_m: impl IntoIterator<Item = f64>,
        target_speed_kmh: f64,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            intersections: intersections.into_iter().map(Into::into).collect(),
            distances_m: distances_m.into_iter().collect(),
            target_speed_kmh,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Structural checks; membership is checked against the topology by the config
    pub fn validate(&self) -> EngineResult<()> {
        if self.intersections.len() < 2 {
            return Err(EngineError::CorridorTooShort {
                corridor: self.id.clone(),
                count: self.intersections.len(),
            });
        }
        if self.distances_m.len() != self.intersections.len() {
            return Err(EngineError::InvalidConfig(format!(
                "corridor {}: {} distances for {} intersections",
                self.id,
                self.distances_m.len(),
                self.intersections.len()
            )));
        }
        if self.distances_m.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "corridor {}: distances must be finite and non-negative",
                self.id
            )));
        }
        if self.distances_m.windows(2).any(|w| w[1] < w[0]) {
            return Err(EngineError::InvalidConfig(format!(
                "corridor {}: distances must not decrease along the corridor",
                self.id
            )));
        }
        if !self.target_speed_kmh.is_finite() || self.target_speed_kmh <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "corridor {}: target speed {} km/h must be positive",
                self.id, self.target_speed_kmh
            )));
        }
        Ok(())
    }

    fn target_speed_mps(&self) -> f64 {
        self.target_speed_kmh * MPS_PER_KMH
    }

    /// Length from the first to the last intersection (m)
    pub fn total_distance_m(&self) -> f64 {
        match (self.distances_m.first(), self.distances_m.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Green-start offsets in corridor order (s), first always 0
    pub fn offsets(&self) -> Vec<u32> {
        let speed = self.target_speed_mps();
        let mut offsets = Vec::with_capacity(self.distances_m.len());
        let mut previous = 0.0_f64;
        for (i, position) in self.distances_m.iter().enumerate() {
            let offset = if i == 0 {
                0.0
            } else {
                let gap = (position - self.distances_m[i - 1]).max(0.0);
                (previous + gap / speed).round()
            };
            offsets.push(offset as u32);
            previous = offset;
        }
        offsets
    }
}

/// Expected improvement from running a green wave
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GreenWaveGain {
    pub strategy: Strategy,
    pub stops_reduced_pct: f64,
    pub emissions_reduced_pct: f64,
}

/// Gains per dominant strategy
pub const GREEN_WAVE_GAINS: [GreenWaveGain; 3] = [
    GreenWaveGain {
        strategy: Strategy::EmissionPriority,
        stops_reduced_pct: 10.0,
        emissions_reduced_pct: 14.0,
    },
    GreenWaveGain {
        strategy: Strategy::FlowPriority,
        stops_reduced_pct: 18.0,
        emissions_reduced_pct: 6.0,
    },
    GreenWaveGain {
        strategy: Strategy::Balanced,
        stops_reduced_pct: 12.0,
        emissions_reduced_pct: 8.0,
    },
];

pub fn green_wave_gain(strategy: Strategy) -> Option<&'static GreenWaveGain> {
    GREEN_WAVE_GAINS.iter().find(|gain| gain.strategy == strategy)
}

/// Majority strategy; ties go to the higher precedence
pub fn dominant_strategy(strategies: impl IntoIterator<Item = Strategy>) -> Option<Strategy> {
    let mut votes: BTreeMap<Strategy, usize> = BTreeMap::new();
    for strategy in strategies {
        *votes.entry(strategy).or_default() += 1;
    }
    votes
        .into_iter()
        .max_by_key(|(strategy, count)| (*count, strategy.precedence()))
        .map(|(strategy, _)| strategy)
}

/// Offset of one corridor member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntersectionOffset {
    pub intersection_id: String,
    pub offset_s: u32,
}

/// Coordination result for one corridor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorridorStatus {
    pub corridor_id: String,
    pub name: String,
    /// Empty until the corridor has been coordinated once
    pub offsets: Vec<IntersectionOffset>,
    pub target_speed_kmh: f64,
    pub total_distance_m: f64,
    pub travel_time_s: f64,
    pub dominant_strategy: Option<Strategy>,
    pub stops_reduced_pct: f64,
    pub emissions_reduced_pct: f64,
    pub avg_congestion: f64,
    pub avg_aqi: f64,
    pub queued_vehicles: u64,
    pub optimization_needed: bool,
    /// Not coordinated on the latest tick
    pub stale: bool,
    pub computed_at: Timestamp,
}

impl CorridorStatus {
    /// Placeholder for a corridor that has never been coordinated
    pub fn pending(corridor: &Corridor, now: Timestamp) -> Self {
        Self {
            corridor_id: corridor.id.clone(),
            name: corridor.name.clone(),
            offsets: Vec::new(),
            target_speed_kmh: corridor.target_speed_kmh,
            total_distance_m: corridor.total_distance_m(),
            travel_time_s: 0.0,
            dominant_strategy: None,
            stops_reduced_pct: 0.0,
            emissions_reduced_pct: 0.0,
            avg_congestion: 0.0,
            avg_aqi: 0.0,
            queued_vehicles: 0,
            optimization_needed: false,
            stale: true,
            computed_at: now,
        }
    }

    /// Same status, flagged as not refreshed
    pub fn into_stale(mut self) -> Self {
        self.stale = true;
        self
    }

    pub fn offset_of(&self, intersection_id: &str) -> Option<u32> {
        self.offsets
            .iter()
            .find(|offset| offset.intersection_id == intersection_id)
            .map(|offset| offset.offset_s)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Coordinate a corridor against the current intersection states
pub fn coordinate(
    corridor: &Corridor,
    states: &StoreSnapshot,
    now: Timestamp,
) -> EngineResult<CorridorStatus> {
    if corridor.intersections.len() < 2 {
        return Err(EngineError::CorridorTooShort {
            corridor: corridor.id.clone(),
            count: corridor.intersections.len(),
        });
    }

    let members = corridor
        .intersections
        .iter()
        .map(|id| {
            states
                .get(id)
                .ok_or_else(|| EngineError::MissingIntersectionState {
                    corridor: corridor.id.clone(),
                    intersection: id.clone(),
                })
        })
        .collect::<EngineResult<Vec<&IntersectionState>>>()?;

    let offsets = corridor
        .intersections
        .iter()
        .zip(corridor.offsets())
        .map(|(id, offset_s)| IntersectionOffset {
            intersection_id: id.clone(),
            offset_s,
        })
        .collect();

    let dominant = dominant_strategy(members.iter().filter_map(|state| state.strategy));
    let gain = dominant.and_then(green_wave_gain);
    let avg_congestion = mean(members.iter().filter_map(|state| state.congestion));
    let optimization_needed = avg_congestion > CORRIDOR_OPTIMIZATION_CONGESTION
        || members
            .iter()
            .any(|state| state.congestion_level >= CongestionLevel::Heavy);
    let total_distance_m = corridor.total_distance_m();

    Ok(CorridorStatus {
        corridor_id: corridor.id.clone(),
        name: corridor.name.clone(),
        offsets,
        target_speed_kmh: corridor.target_speed_kmh,
        total_distance_m,
        travel_time_s: total_distance_m / corridor.target_speed_mps(),
        dominant_strategy: dominant,
        stops_reduced_pct: gain.map_or(0.0, |g| g.stops_reduced_pct),
        emissions_reduced_pct: gain.map_or(0.0, |g| g.emissions_reduced_pct),
        avg_congestion,
        avg_aqi: mean(members.iter().filter_map(|state| state.aqi_index)),
        queued_vehicles: members.iter().map(|state| state.queue_count as u64).sum(),
        optimization_needed,
        stale: false,
        computed_at: now,
    })
}
