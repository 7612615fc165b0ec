//! Trip emission estimate
//!
//! ```text
//! CO2 (kg) = base_factor(class) × speed_factor(speed) × congestion_factor(c) × distance / 100
//! ```
//!
//! - `speed_factor` is piecewise over speed bands (table below), lowest at the
//!   40-60 km/h optimum and rising for stop-and-go and high-drag speeds.
//! - `congestion_factor = 1 + c × 0.5` accounts for idling.
//! - Electric vehicles carry a zero base factor, so every estimate is zero,
//!   whatever the other inputs are.

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

/// Vehicle class with its base emission factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    Sedan,
    Suv,
    Hatchback,
    Hybrid,
    Electric,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::Sedan,
        VehicleClass::Suv,
        VehicleClass::Hatchback,
        VehicleClass::Hybrid,
        VehicleClass::Electric,
    ];

    /// Tailpipe CO2 factor (g/km at the 40-60 km/h optimum)
    pub const fn base_emission_factor(&self) -> f64 {
        match self {
            VehicleClass::Sedan => 120.0,
            VehicleClass::Suv => 150.0,
            VehicleClass::Hatchback => 100.0,
            VehicleClass::Hybrid => 60.0,
            VehicleClass::Electric => 0.0,
        }
    }
}

/// Speed band: inclusive lower bound (km/h) and multiplier
struct SpeedBand {
    from_kmh: f64,
    factor: f64,
}

/// Bands in ascending order; each covers `[from_kmh, next.from_kmh)`
const SPEED_BANDS: [SpeedBand; 5] = [
    SpeedBand { from_kmh: 0.0, factor: 1.4 },
    SpeedBand { from_kmh: 20.0, factor: 1.1 },
    SpeedBand { from_kmh: 40.0, factor: 1.0 },
    SpeedBand { from_kmh: 60.0, factor: 1.15 },
    SpeedBand { from_kmh: 80.0, factor: 1.3 },
];

/// Weight of congestion (idling) in the congestion factor
const CONGESTION_WEIGHT: f64 = 0.5;

/// Multiplier for the band containing `speed_kmh`
pub fn speed_factor(speed_kmh: f64) -> f64 {
    SPEED_BANDS
        .iter()
        .rev()
        .find(|band| speed_kmh >= band.from_kmh)
        .map_or(SPEED_BANDS[0].factor, |band| band.factor)
}

/// `1 + congestion × 0.5`
pub fn congestion_factor(congestion: f64) -> f64 {
    1.0 + congestion * CONGESTION_WEIGHT
}

/// Estimated CO2 (kg) for a trip of `distance_km`
pub fn estimate_emissions(
    vehicle: VehicleClass,
    speed_kmh: f64,
    congestion: f64,
    distance_km: f64,
) -> EngineResult<f64> {
    let base = vehicle.base_emission_factor();
    if base == 0.0 {
        return Ok(0.0);
    }

    if !speed_kmh.is_finite() || speed_kmh < 0.0 {
        return Err(EngineError::invalid_reading(format!(
            "speed {speed_kmh} km/h is invalid"
        )));
    }
    if !congestion.is_finite() || !(0.0..=1.0).contains(&congestion) {
        return Err(EngineError::invalid_reading(format!(
            "congestion {congestion} outside [0, 1]"
        )));
    }
    if !distance_km.is_finite() || distance_km < 0.0 {
        return Err(EngineError::invalid_reading(format!(
            "distance {distance_km} km is invalid"
        )));
    }

    Ok(base * speed_factor(speed_kmh) * congestion_factor(congestion) * distance_km / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_bands_are_inclusive_lower() {
        assert_eq!(speed_factor(0.0), 1.4);
        assert_eq!(speed_factor(19.9), 1.4);
        assert_eq!(speed_factor(20.0), 1.1);
        assert_eq!(speed_factor(40.0), 1.0);
        assert_eq!(speed_factor(59.9), 1.0);
        assert_eq!(speed_factor(60.0), 1.15);
        assert_eq!(speed_factor(80.0), 1.3);
        assert_eq!(speed_factor(130.0), 1.3);
    }

    #[test]
    fn sedan_in_congested_city_traffic() {
        // 120 × 1.1 × (1 + 0.6 × 0.5) × 25 / 100 = 42.9
        let co2 = estimate_emissions(VehicleClass::Sedan, 30.0, 0.6, 25.0).unwrap();
        assert!((co2 - 42.9).abs() < 1e-9);
    }

    #[test]
    fn electric_is_always_zero() {
        for speed in [0.0, 15.0, 50.0, 120.0] {
            let co2 = estimate_emissions(VehicleClass::Electric, speed, 1.0, 500.0).unwrap();
            assert_eq!(co2, 0.0);
        }
    }

    #[test]
    fn suv_emits_more_than_hybrid() {
        let suv = estimate_emissions(VehicleClass::Suv, 50.0, 0.2, 10.0).unwrap();
        let hybrid = estimate_emissions(VehicleClass::Hybrid, 50.0, 0.2, 10.0).unwrap();
        assert!(suv > hybrid);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(estimate_emissions(VehicleClass::Sedan, -5.0, 0.2, 10.0).is_err());
        assert!(estimate_emissions(VehicleClass::Sedan, 50.0, 1.2, 10.0).is_err());
        assert!(estimate_emissions(VehicleClass::Sedan, 50.0, 0.2, f64::NAN).is_err());
    }
}
