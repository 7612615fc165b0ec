//! Raw reading classification
//!
//! Maps the two raw scalars the providers hand us onto ordinal levels:
//! - AQI index value → [`AqiLevel`] through fixed national bands
//! - Congestion fraction → [`CongestionLevel`] through configurable boundaries
//!
//! Both mappings are inclusive-lower: a value sitting exactly on a boundary
//! belongs to the band that *starts* there (AQI 150 is Poor, congestion 0.5 is
//! Heavy). Everything ordinal derives `Ord` so rules can be written as
//! `level >= AqiLevel::Poor`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    AQI_MODERATE_MIN, AQI_POOR_MIN, AQI_SATISFACTORY_MIN, AQI_SEVERE_MIN,
    CONGESTION_HEAVY_MIN, CONGESTION_LIGHT_MIN, CONGESTION_SEVERE_MIN,
};
use crate::errors::{EngineError, EngineResult};

/// Air quality level, ordered from cleanest to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AqiLevel {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    Severe,
}

impl AqiLevel {
    /// All levels in ascending order
    pub const ALL: [AqiLevel; 5] = [
        AqiLevel::Good,
        AqiLevel::Satisfactory,
        AqiLevel::Moderate,
        AqiLevel::Poor,
        AqiLevel::Severe,
    ];

    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            AqiLevel::Good => "good",
            AqiLevel::Satisfactory => "satisfactory",
            AqiLevel::Moderate => "moderate",
            AqiLevel::Poor => "poor",
            AqiLevel::Severe => "severe",
        }
    }
}

/// Congestion level, ordered from free-flowing to gridlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CongestionLevel {
    FreeFlow,
    Light,
    Heavy,
    Severe,
}

impl CongestionLevel {
    /// All levels in ascending order
    pub const ALL: [CongestionLevel; 4] = [
        CongestionLevel::FreeFlow,
        CongestionLevel::Light,
        CongestionLevel::Heavy,
        CongestionLevel::Severe,
    ];

    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            CongestionLevel::FreeFlow => "free_flow",
            CongestionLevel::Light => "light",
            CongestionLevel::Heavy => "heavy",
            CongestionLevel::Severe => "severe",
        }
    }
}

/// Classify an AQI index value.
///
/// Total over `[0, ∞)`; values above 500 still classify as Severe; range
/// enforcement for readings happens in `AirQualityReading::validate`.
pub fn classify_aqi(index_value: f64) -> EngineResult<AqiLevel> {
    if !index_value.is_finite() {
        return Err(EngineError::invalid_reading("AQI is not a finite number"));
    }
    if index_value < 0.0 {
        return Err(EngineError::invalid_reading(format!(
            "AQI {index_value} is negative"
        )));
    }

    let level = if index_value < AQI_SATISFACTORY_MIN {
        AqiLevel::Good
    } else if index_value < AQI_MODERATE_MIN {
        AqiLevel::Satisfactory
    } else if index_value < AQI_POOR_MIN {
        AqiLevel::Moderate
    } else if index_value < AQI_SEVERE_MIN {
        AqiLevel::Poor
    } else {
        AqiLevel::Severe
    };
    Ok(level)
}

/// Classify a congestion fraction with the default boundaries
pub fn classify_congestion(fraction: f64) -> EngineResult<CongestionLevel> {
    CongestionBoundaries::default().classify(fraction)
}

/// Lower bounds (inclusive) of the Light, Heavy and Severe congestion bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CongestionBoundaries {
    pub light: f64,
    pub heavy: f64,
    pub severe: f64,
}

impl Default for CongestionBoundaries {
    fn default() -> Self {
        Self {
            light: CONGESTION_LIGHT_MIN,
            heavy: CONGESTION_HEAVY_MIN,
            severe: CONGESTION_SEVERE_MIN,
        }
    }
}

impl CongestionBoundaries {
    /// Create boundaries, rejecting anything not strictly increasing inside (0, 1]
    pub fn new(light: f64, heavy: f64, severe: f64) -> EngineResult<Self> {
        let boundaries = Self { light, heavy, severe };
        boundaries.validate()?;
        Ok(boundaries)
    }

    /// Check the boundaries are usable
    pub fn validate(&self) -> EngineResult<()> {
        let ordered = 0.0 < self.light && self.light < self.heavy && self.heavy < self.severe;
        if !ordered || self.severe > 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "congestion boundaries must satisfy 0 < light < heavy < severe <= 1, got {}/{}/{}",
                self.light, self.heavy, self.severe
            )));
        }
        Ok(())
    }

    /// Classify a congestion fraction in [0, 1]
    pub fn classify(&self, fraction: f64) -> EngineResult<CongestionLevel> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(EngineError::invalid_reading(format!(
                "congestion fraction {fraction} outside [0, 1]"
            )));
        }

        let level = if fraction < self.light {
            CongestionLevel::FreeFlow
        } else if fraction < self.heavy {
            CongestionLevel::Light
        } else if fraction < self.severe {
            CongestionLevel::Heavy
        } else {
            CongestionLevel::Severe
        };
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aqi_band_edges_are_inclusive_lower() {
        assert_eq!(classify_aqi(0.0), Ok(AqiLevel::Good));
        assert_eq!(classify_aqi(49.9), Ok(AqiLevel::Good));
        assert_eq!(classify_aqi(50.0), Ok(AqiLevel::Satisfactory));
        assert_eq!(classify_aqi(57.0), Ok(AqiLevel::Satisfactory));
        assert_eq!(classify_aqi(100.0), Ok(AqiLevel::Moderate));
        assert_eq!(classify_aqi(150.0), Ok(AqiLevel::Poor));
        assert_eq!(classify_aqi(299.0), Ok(AqiLevel::Poor));
        assert_eq!(classify_aqi(300.0), Ok(AqiLevel::Severe));
        assert_eq!(classify_aqi(500.0), Ok(AqiLevel::Severe));
    }

    #[test]
    fn negative_or_nan_aqi_is_invalid() {
        assert!(matches!(
            classify_aqi(-1.0),
            Err(EngineError::InvalidReading { .. })
        ));
        assert!(classify_aqi(f64::NAN).is_err());
    }

    #[test]
    fn congestion_boundaries_map_consistently() {
        assert_eq!(classify_congestion(0.0), Ok(CongestionLevel::FreeFlow));
        assert_eq!(classify_congestion(0.29), Ok(CongestionLevel::FreeFlow));
        assert_eq!(classify_congestion(0.3), Ok(CongestionLevel::Light));
        assert_eq!(classify_congestion(0.5), Ok(CongestionLevel::Heavy));
        assert_eq!(classify_congestion(0.61), Ok(CongestionLevel::Heavy));
        assert_eq!(classify_congestion(0.7), Ok(CongestionLevel::Severe));
        assert_eq!(classify_congestion(1.0), Ok(CongestionLevel::Severe));
    }

    #[test]
    fn congestion_outside_unit_interval_is_invalid() {
        assert!(classify_congestion(-0.01).is_err());
        assert!(classify_congestion(1.01).is_err());
        assert!(classify_congestion(f64::INFINITY).is_err());
    }

    #[test]
    fn custom_boundaries_shift_bands() {
        let boundaries = CongestionBoundaries::new(0.2, 0.4, 0.6).unwrap();
        assert_eq!(boundaries.classify(0.45), Ok(CongestionLevel::Heavy));
        assert!(CongestionBoundaries::new(0.5, 0.4, 0.6).is_err());
        assert!(CongestionBoundaries::new(0.2, 0.4, 1.2).is_err());
    }

    #[test]
    fn levels_are_ordered() {
        assert!(AqiLevel::Good < AqiLevel::Severe);
        assert!(CongestionLevel::Light < CongestionLevel::Heavy);
        assert!(AqiLevel::ALL.windows(2).all(|w| w[0] < w[1]));
    }
}
