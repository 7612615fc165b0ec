//! Speed advisory decision matrix
//!
//! ## Overview
//!
//! Adaptive speed limits trade a little throughput for fewer emissions when
//! traffic and pollution stack up. The trade-off is expressed as a fixed
//! matrix keyed by `(CongestionLevel, AqiLevel)`:
//!
//! ```text
//!                 Good   Satisf.  Moderate  Poor   Severe
//! FreeFlow         -       -       0.10     0.15   0.15
//! Light           0.10    0.10     0.10     0.20   0.20
//! Heavy           0.25    0.25     0.10     0.60   0.60
//! Severe          0.25    0.25     0.10     0.60   0.60
//! ```
//!
//! Cells marked `-` are not listed and fail closed to "maintain current
//! speed" (reduction 0). New combinations are added as rows in
//! [`SPEED_ADVISORY_MATRIX`]; lookup code never branches on levels.
//!
//! ## Row Contents
//!
//! Besides the reduction fraction, each row carries the speed floor the
//! recommendation never goes below, the expected emission reduction and a
//! fixed rationale shown to operators.

use serde::Serialize;

use crate::classifier::{AqiLevel, CongestionBoundaries, CongestionLevel};
use crate::errors::EngineResult;
use crate::readings::TrafficReading;

/// One cell of the decision matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisoryRule {
    pub congestion: CongestionLevel,
    pub aqi: AqiLevel,
    /// Fraction of free-flow speed to shed, in [0, 1)
    pub reduction: f64,
    /// Lowest recommended speed (km/h)
    pub floor_kmh: f64,
    /// Expected emission reduction (%)
    pub emission_reduction_pct: f64,
    pub rationale: &'static str,
}

const fn rule(
    congestion: CongestionLevel,
    aqi: AqiLevel,
    reduction: f64,
    floor_kmh: f64,
    emission_reduction_pct: f64,
    rationale: &'static str,
) -> AdvisoryRule {
    AdvisoryRule {
        congestion,
        aqi,
        reduction,
        floor_kmh,
        emission_reduction_pct,
        rationale,
    }
}

const HEAVY_HIGH_AQI: &str = "Heavy congestion and high pollution: cut speeds to ease both";
const HEAVY_LOW_AQI: &str = "Heavy congestion: moderate reduction to ease traffic";
const LIGHT_HIGH_AQI: &str = "Moderate traffic and high pollution: lower speeds for air quality";
const FREE_HIGH_AQI: &str = "Light traffic but high pollution: lower speeds for air quality";
const BALANCED: &str = "Balanced conditions: slight speed moderation";

/// The decision matrix
pub const SPEED_ADVISORY_MATRIX: &[AdvisoryRule] = {
    use AqiLevel as A;
    use CongestionLevel as C;
    &[
        rule(C::Heavy, A::Poor, 0.60, 20.0, 25.0, HEAVY_HIGH_AQI),
        rule(C::Heavy, A::Severe, 0.60, 20.0, 25.0, HEAVY_HIGH_AQI),
        rule(C::Severe, A::Poor, 0.60, 20.0, 25.0, HEAVY_HIGH_AQI),
        rule(C::Severe, A::Severe, 0.60, 20.0, 25.0, HEAVY_HIGH_AQI),
        rule(C::Heavy, A::Good, 0.25, 25.0, 12.0, HEAVY_LOW_AQI),
        rule(C::Heavy, A::Satisfactory, 0.25, 25.0, 12.0, HEAVY_LOW_AQI),
        rule(C::Severe, A::Good, 0.25, 25.0, 12.0, HEAVY_LOW_AQI),
        rule(C::Severe, A::Satisfactory, 0.25, 25.0, 12.0, HEAVY_LOW_AQI),
        rule(C::Light, A::Poor, 0.20, 30.0, 15.0, LIGHT_HIGH_AQI),
        rule(C::Light, A::Severe, 0.20, 30.0, 15.0, LIGHT_HIGH_AQI),
        rule(C::FreeFlow, A::Poor, 0.15, 35.0, 10.0, FREE_HIGH_AQI),
        rule(C::FreeFlow, A::Severe, 0.15, 35.0, 10.0, FREE_HIGH_AQI),
        rule(C::Heavy, A::Moderate, 0.10, 0.0, 5.0, BALANCED),
        rule(C::Severe, A::Moderate, 0.10, 0.0, 5.0, BALANCED),
        rule(C::Light, A::Good, 0.10, 0.0, 5.0, BALANCED),
        rule(C::Light, A::Satisfactory, 0.10, 0.0, 5.0, BALANCED),
        rule(C::Light, A::Moderate, 0.10, 0.0, 5.0, BALANCED),
        rule(C::FreeFlow, A::Moderate, 0.10, 0.0, 5.0, BALANCED),
    ]
};

/// Rationale when no matrix row applies
pub const MAINTAIN_RATIONALE: &str = "Optimal conditions: maintain current speed";

/// Throughput lost per percent of speed reduction
const FLOW_IMPACT_PER_PCT: f64 = 0.15;

/// Cap on the estimated flow impact (%)
const MAX_FLOW_IMPACT_PCT: f64 = 15.0;

/// Matrix row for a level pair, if listed
pub fn lookup(congestion: CongestionLevel, aqi: AqiLevel) -> Option<&'static AdvisoryRule> {
    SPEED_ADVISORY_MATRIX
        .iter()
        .find(|rule| rule.congestion == congestion && rule.aqi == aqi)
}

/// Fraction of speed to shed for a level pair; unlisted pairs maintain speed
pub fn recommend_speed_reduction(congestion: CongestionLevel, aqi: AqiLevel) -> f64 {
    lookup(congestion, aqi).map_or(0.0, |rule| rule.reduction)
}

/// Speed recommendation for one road segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedAdvisory {
    pub segment_id: String,
    pub congestion_level: CongestionLevel,
    pub aqi_level: AqiLevel,
    pub current_speed: f64,
    pub recommended_speed: f64,
    /// Recommended vs current speed (%)
    pub change_pct: f64,
    pub reduction: f64,
    pub expected_emission_reduction_pct: f64,
    /// Estimated throughput change (%), never positive
    pub expected_flow_impact_pct: f64,
    pub rationale: &'static str,
    /// Current speed above free-flow × safety margin
    pub speeding_flagged: bool,
}

/// Build the advisory for a validated traffic reading under the given air quality
pub fn advise_speed(
    reading: &TrafficReading,
    aqi: AqiLevel,
    boundaries: &CongestionBoundaries,
    safety_margin: f64,
) -> EngineResult<SpeedAdvisory> {
    reading.validate()?;
    let congestion = boundaries.classify(reading.congestion)?;

    let (recommended, reduction, emission_pct, rationale) = match lookup(congestion, aqi) {
        Some(rule) => {
            let target = reading.free_flow_speed * (1.0 - rule.reduction);
            (
                target.max(rule.floor_kmh),
                rule.reduction,
                rule.emission_reduction_pct,
                rule.rationale,
            )
        }
        None => (reading.free_flow_speed, 0.0, 0.0, MAINTAIN_RATIONALE),
    };

    let change_pct = if reading.current_speed > 0.0 {
        (recommended - reading.current_speed) / reading.current_speed * 100.0
    } else {
        0.0
    };
    let flow_impact = if change_pct < 0.0 {
        -(change_pct.abs() * FLOW_IMPACT_PER_PCT).min(MAX_FLOW_IMPACT_PCT)
    } else {
        0.0
    };

    Ok(SpeedAdvisory {
        segment_id: reading.segment_id.clone(),
        congestion_level: congestion,
        aqi_level: aqi,
        current_speed: reading.current_speed,
        recommended_speed: recommended,
        change_pct,
        reduction,
        expected_emission_reduction_pct: emission_pct,
        expected_flow_impact_pct: flow_impact,
        rationale,
        speeding_flagged: reading.exceeds_free_flow(safety_margin),
    })
}
