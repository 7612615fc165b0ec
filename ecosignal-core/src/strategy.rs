//! Strategy Selection
//!
//! ## Overview
//!
//! Each tick every observed intersection gets a fresh [`StrategyDecision`].
//! The decision order is fixed and first-match-wins:
//!
//! ```text
//! AQI level >= Poor          → EmissionPriority
//! congestion level >= Heavy  → FlowPriority
//! otherwise                  → Balanced
//! ```
//!
//! Air quality is checked first, so a gridlocked intersection under severe
//! smog still favours emissions over throughput.
//!
//! ## Strategy Constants
//!
//! The expected emission reduction, flow impact and base green time of each
//! strategy live in a [`StrategyTable`]. The table is data: it deserializes
//! from configuration and defaults to the calibrated values below. Selection
//! never recomputes these figures from raw levels.
//!
//! | Strategy         | Emission reduction | Flow impact | Base green |
//! |------------------|--------------------|-------------|------------|
//! | EmissionPriority | 18 %               | -5 %        | 70 s       |
//! | FlowPriority     | 5 %                | +15 %       | 60 s       |
//! | Balanced         | 10 %               | +8 %        | 50 s       |

use serde::{Deserialize, Serialize};

use crate::classifier::{AqiLevel, CongestionLevel};
use crate::constants::{MAX_GREEN_S, MIN_GREEN_S};
use crate::errors::{EngineError, EngineResult};
use crate::signal_plan::SignalPlan;
use crate::store::{IntersectionState, Priority};
use crate::time::Timestamp;

/// Signal timing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    EmissionPriority,
    FlowPriority,
    Balanced,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::EmissionPriority,
        Strategy::FlowPriority,
        Strategy::Balanced,
    ];

    /// Strategy for a pair of levels, air quality first
    pub fn for_levels(aqi: AqiLevel, congestion: CongestionLevel) -> Self {
        if aqi >= AqiLevel::Poor {
            Strategy::EmissionPriority
        } else if congestion >= CongestionLevel::Heavy {
            Strategy::FlowPriority
        } else {
            Strategy::Balanced
        }
    }

    /// Tie-break rank when strategies are tallied; higher wins
    pub const fn precedence(&self) -> u8 {
        match self {
            Strategy::EmissionPriority => 2,
            Strategy::FlowPriority => 1,
            Strategy::Balanced => 0,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Strategy::EmissionPriority => "emission_priority",
            Strategy::FlowPriority => "flow_priority",
            Strategy::Balanced => "balanced",
        }
    }
}

/// Fixed figures attached to one strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Expected emission reduction (%)
    pub emission_reduction_pct: f64,
    /// Expected throughput change (%), negative when flow is sacrificed
    pub flow_impact_pct: f64,
    /// Green time before queue scaling (s)
    pub base_green_s: u32,
}

impl StrategyProfile {
    pub const fn new(emission_reduction_pct: f64, flow_impact_pct: f64, base_green_s: u32) -> Self {
        Self {
            emission_reduction_pct,
            flow_impact_pct,
            base_green_s,
        }
    }
}

/// Strategy constants, one profile per strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyTable {
    pub emission_priority: StrategyProfile,
    pub flow_priority: StrategyProfile,
    pub balanced: StrategyProfile,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self {
            emission_priority: StrategyProfile::new(18.0, -5.0, 70),
            flow_priority: StrategyProfile::new(5.0, 15.0, 60),
            balanced: StrategyProfile::new(10.0, 8.0, 50),
        }
    }
}

impl StrategyTable {
    pub fn profile(&self, strategy: Strategy) -> &StrategyProfile {
        match strategy {
            Strategy::EmissionPriority => &self.emission_priority,
            Strategy::FlowPriority => &self.flow_priority,
            Strategy::Balanced => &self.balanced,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        for strategy in Strategy::ALL {
            let profile = self.profile(strategy);
            if !profile.emission_reduction_pct.is_finite() || !profile.flow_impact_pct.is_finite() {
                return Err(EngineError::InvalidConfig(format!(
                    "strategy {} has non-finite percentages",
                    strategy.name()
                )));
            }
            if !(MIN_GREEN_S..=MAX_GREEN_S).contains(&profile.base_green_s) {
                return Err(EngineError::InvalidConfig(format!(
                    "strategy {} base green {}s outside [{MIN_GREEN_S}, {MAX_GREEN_S}]",
                    strategy.name(),
                    profile.base_green_s
                )));
            }
        }
        Ok(())
    }
}

/// Per-tick decision for one intersection. Rebuilt every tick, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDecision {
    pub intersection_id: String,
    pub strategy: Strategy,
    pub expected_emission_reduction_pct: f64,
    pub expected_flow_impact_pct: f64,
    pub priority: Priority,
    pub plan: SignalPlan,
    pub decided_at: Timestamp,
}

/// Pick the strategy for an intersection's current state
pub fn select_strategy(
    state: &IntersectionState,
    table: &StrategyTable,
    now: Timestamp,
) -> StrategyDecision {
    let strategy = Strategy::for_levels(state.aqi_level, state.congestion_level);
    let profile = table.profile(strategy);

    StrategyDecision {
        intersection_id: state.id.clone(),
        strategy,
        expected_emission_reduction_pct: profile.emission_reduction_pct,
        expected_flow_impact_pct: profile.flow_impact_pct,
        priority: state.priority(),
        plan: SignalPlan::for_queue(profile.base_green_s, state.queue_ratio()),
        decided_at: now,
    }
}
