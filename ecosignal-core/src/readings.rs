//! Raw provider readings
//!
//! Snapshots handed over by the air-quality and traffic providers, before
//! classification. Validation here is the engine's input boundary: a reading
//! that fails it is discarded for the tick and the store keeps the last-known
//! values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::AQI_MAX;
use crate::errors::{EngineError, EngineResult};
use crate::time::Timestamp;

/// Provider a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataSource {
    AirQuality,
    Traffic,
}

impl DataSource {
    pub const ALL: [DataSource; 2] = [DataSource::AirQuality, DataSource::Traffic];

    pub const fn name(&self) -> &'static str {
        match self {
            DataSource::AirQuality => "air-quality",
            DataSource::Traffic => "traffic",
        }
    }
}

/// Pollutant concentration snapshot for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    pub location_id: String,
    /// AQI index value, 0-500
    pub index_value: f64,
    /// Pollutant name (pm25, pm10, no2, ...) → concentration
    #[serde(default)]
    pub pollutants: BTreeMap<String, f64>,
    pub captured_at: Timestamp,
}

impl AirQualityReading {
    pub fn new(location_id: impl Into<String>, index_value: f64, captured_at: Timestamp) -> Self {
        Self {
            location_id: location_id.into(),
            index_value,
            pollutants: BTreeMap::new(),
            captured_at,
        }
    }

    /// Add a pollutant concentration
    pub fn with_pollutant(mut self, name: impl Into<String>, concentration: f64) -> Self {
        self.pollutants.insert(name.into(), concentration);
        self
    }

    /// Reject missing or out-of-range values instead of clamping them
    pub fn validate(&self) -> EngineResult<()> {
        if !self.index_value.is_finite() || !(0.0..=AQI_MAX).contains(&self.index_value) {
            return Err(EngineError::invalid_reading(format!(
                "location {}: AQI {} outside [0, {AQI_MAX}]",
                self.location_id, self.index_value
            )));
        }
        if let Some((name, value)) = self
            .pollutants
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(EngineError::invalid_reading(format!(
                "location {}: {name} concentration {value} is invalid",
                self.location_id
            )));
        }
        Ok(())
    }

    /// Pollutant with the highest concentration, if any were reported
    pub fn primary_pollutant(&self) -> Option<&str> {
        self.pollutants
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, _)| name.as_str())
    }
}

/// Speed snapshot for one road segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReading {
    pub segment_id: String,
    /// Current average speed (km/h)
    pub current_speed: f64,
    /// Free-flow speed (km/h)
    pub free_flow_speed: f64,
    /// Fraction of free-flow speed lost to traffic, in [0, 1]
    pub congestion: f64,
    /// Vehicles waiting at the segment's stop line, when the provider reports it
    #[serde(default)]
    pub queued_vehicles: Option<u32>,
    pub captured_at: Timestamp,
}

impl TrafficReading {
    pub fn new(
        segment_id: impl Into<String>,
        current_speed: f64,
        free_flow_speed: f64,
        congestion: f64,
        captured_at: Timestamp,
    ) -> Self {
        Self {
            segment_id: segment_id.into(),
            current_speed,
            free_flow_speed,
            congestion,
            queued_vehicles: None,
            captured_at,
        }
    }

    /// Build a reading from speeds alone, deriving congestion as `1 - current/free_flow`
    pub fn from_speeds(
        segment_id: impl Into<String>,
        current_speed: f64,
        free_flow_speed: f64,
        captured_at: Timestamp,
    ) -> Self {
        let congestion = congestion_from_speeds(current_speed, free_flow_speed);
        Self::new(segment_id, current_speed, free_flow_speed, congestion, captured_at)
    }

    pub fn with_queue(mut self, queued_vehicles: u32) -> Self {
        self.queued_vehicles = Some(queued_vehicles);
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.current_speed.is_finite() || self.current_speed < 0.0 {
            return Err(EngineError::invalid_reading(format!(
                "segment {}: current speed {} is invalid",
                self.segment_id, self.current_speed
            )));
        }
        if !self.free_flow_speed.is_finite() || self.free_flow_speed <= 0.0 {
            return Err(EngineError::invalid_reading(format!(
                "segment {}: free-flow speed {} must be positive",
                self.segment_id, self.free_flow_speed
            )));
        }
        if !self.congestion.is_finite() || !(0.0..=1.0).contains(&self.congestion) {
            return Err(EngineError::invalid_reading(format!(
                "segment {}: congestion {} outside [0, 1]",
                self.segment_id, self.congestion
            )));
        }
        Ok(())
    }

    /// Current speed above free-flow × margin. Flagged, never rejected.
    pub fn exceeds_free_flow(&self, margin: f64) -> bool {
        self.current_speed > self.free_flow_speed * margin
    }

    /// Estimated queue when the provider did not report one
    pub fn queue_estimate(&self, capacity: u32) -> u32 {
        match self.queued_vehicles {
            Some(queued) => queued,
            None => (self.congestion * capacity as f64).round() as u32,
        }
    }
}

/// Fraction of free-flow speed lost, clamped to [0, 1]
pub fn congestion_from_speeds(current_speed: f64, free_flow_speed: f64) -> f64 {
    if free_flow_speed <= 0.0 || !current_speed.is_finite() {
        return 0.0;
    }
    (1.0 - current_speed / free_flow_speed).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aqi_reading_range_is_enforced() {
        assert!(AirQualityReading::new("blr", 113.0, 0).validate().is_ok());
        assert!(AirQualityReading::new("blr", 0.0, 0).validate().is_ok());
        assert!(AirQualityReading::new("blr", 500.0, 0).validate().is_ok());
        assert!(AirQualityReading::new("blr", -3.0, 0).validate().is_err());
        assert!(AirQualityReading::new("blr", 501.0, 0).validate().is_err());
        assert!(AirQualityReading::new("blr", f64::NAN, 0).validate().is_err());
    }

    #[test]
    fn negative_concentration_is_rejected() {
        let reading = AirQualityReading::new("blr", 80.0, 0).with_pollutant("pm25", -1.0);
        assert!(reading.validate().is_err());
    }

    #[test]
    fn primary_pollutant_is_highest_concentration() {
        let reading = AirQualityReading::new("blr", 113.0, 0)
            .with_pollutant("pm25", 45.5)
            .with_pollutant("pm10", 78.2)
            .with_pollutant("no2", 25.0);
        assert_eq!(reading.primary_pollutant(), Some("pm10"));
        assert_eq!(AirQualityReading::new("blr", 1.0, 0).primary_pollutant(), None);
    }

    #[test]
    fn traffic_reading_validation() {
        assert!(TrafficReading::new("s1", 30.0, 60.0, 0.5, 0).validate().is_ok());
        assert!(TrafficReading::new("s1", -1.0, 60.0, 0.5, 0).validate().is_err());
        assert!(TrafficReading::new("s1", 30.0, 0.0, 0.5, 0).validate().is_err());
        assert!(TrafficReading::new("s1", 30.0, 60.0, 1.5, 0).validate().is_err());
    }

    #[test]
    fn speeding_is_flagged_not_rejected() {
        let reading = TrafficReading::new("s1", 70.0, 60.0, 0.0, 0);
        assert!(reading.validate().is_ok());
        assert!(reading.exceeds_free_flow(1.1));
        assert!(!reading.exceeds_free_flow(1.2));
    }

    #[test]
    fn congestion_derived_from_speeds() {
        let reading = TrafficReading::from_speeds("s1", 15.0, 60.0, 0);
        assert!((reading.congestion - 0.75).abs() < 1e-9);
        assert_eq!(congestion_from_speeds(80.0, 60.0), 0.0);
        assert_eq!(congestion_from_speeds(10.0, 0.0), 0.0);
    }

    #[test]
    fn queue_falls_back_to_estimate() {
        let reading = TrafficReading::new("s1", 30.0, 60.0, 0.42, 0);
        assert_eq!(reading.queue_estimate(100), 42);
        assert_eq!(reading.with_queue(7).queue_estimate(100), 7);
    }
}
