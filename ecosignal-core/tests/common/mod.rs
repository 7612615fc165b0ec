//! Shared fixtures for engine integration tests
//!
//! A small slice of central Bangalore: four intersections on two air-quality
//! stations, three of them chained into the MG Road corridor.

#![allow(dead_code)]

use ecosignal_core::{
    AirQualityReading, Corridor, EngineConfig, IntersectionConfig, TickInput, Timestamp,
    TrafficReading,
};

pub const MINUTE_MS: u64 = 60_000;

pub fn bangalore_config() -> EngineConfig {
    EngineConfig::default()
        .with_intersection(IntersectionConfig::new("INT_001", "MG Road Junction", "blr-central", "mg-1"))
        .with_intersection(IntersectionConfig::new("INT_002", "Brigade Road", "blr-central", "mg-2"))
        .with_intersection(IntersectionConfig::new("INT_003", "Residency Road", "blr-east", "mg-3"))
        .with_intersection(
            IntersectionConfig::new("INT_004", "Silk Board", "blr-south", "hosur-1")
                .with_queue_capacity(120),
        )
        .with_corridor(
            Corridor::new(
                "mg-road",
                ["INT_001", "INT_002", "INT_003"],
                [0.0, 500.0, 1200.0],
                36.0,
            )
            .with_name("MG Road"),
        )
}

/// Conditions for one tick: (location, AQI) and (segment, current, free-flow)
pub struct Conditions<'a> {
    pub air: &'a [(&'a str, f64)],
    pub traffic: &'a [(&'a str, f64, f64)],
}

impl Conditions<'_> {
    pub fn input(&self, at: Timestamp) -> TickInput {
        let mut input = TickInput::new();
        for (location, aqi) in self.air {
            input.add_air_quality(
                AirQualityReading::new(*location, *aqi, at)
                    .with_pollutant("pm25", aqi * 0.4)
                    .with_pollutant("pm10", aqi * 0.7),
            );
        }
        for (segment, current, free_flow) in self.traffic {
            input.add_traffic(TrafficReading::from_speeds(*segment, *current, *free_flow, at));
        }
        input
    }
}

/// Ordinary weekday afternoon: moderate air, mixed traffic
pub fn afternoon() -> TickInput {
    Conditions {
        air: &[("blr-central", 113.0), ("blr-east", 88.0), ("blr-south", 135.0)],
        traffic: &[
            ("mg-1", 34.0, 60.0),
            ("mg-2", 41.0, 55.0),
            ("mg-3", 38.0, 50.0),
            ("hosur-1", 15.0, 60.0),
        ],
    }
    .input(0)
}

/// Winter smog with rush-hour gridlock
pub fn smog_rush_hour(at: Timestamp) -> TickInput {
    Conditions {
        air: &[("blr-central", 312.0), ("blr-east", 245.0), ("blr-south", 280.0)],
        traffic: &[
            ("mg-1", 9.0, 60.0),
            ("mg-2", 12.0, 55.0),
            ("mg-3", 10.0, 50.0),
            ("hosur-1", 6.0, 60.0),
        ],
    }
    .input(at)
}

/// Standstill on every segment; no air-quality readings
pub fn gridlock_traffic_only(at: Timestamp) -> TickInput {
    Conditions {
        air: &[],
        traffic: &[
            ("mg-1", 3.0, 60.0),
            ("mg-2", 3.0, 55.0),
            ("mg-3", 3.0, 50.0),
            ("hosur-1", 3.0, 60.0),
        ],
    }
    .input(at)
}
