//! Shared fixtures for tick driver tests

#![allow(dead_code)]

use ecosignal_connectors::StaticProvider;
use ecosignal_core::{
    AirQualityReading, Corridor, EngineConfig, IntersectionConfig, Timestamp, TrafficReading,
};

/// 2024-11-05 08:30 IST, a weekday morning
pub const MORNING: Timestamp = 1_730_775_600_000;

pub const MINUTE_MS: u64 = 60_000;

/// Four intersections, three chained into the MG Road corridor
pub fn bangalore_config() -> EngineConfig {
    EngineConfig::default()
        .with_provider_timeout(10)
        .with_tick_interval(60)
        .with_intersection(IntersectionConfig::new(
            "INT_001",
            "MG Road Junction",
            "blr-central",
            "mg-1",
        ))
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

/// Script every location and segment of the fixture, captured at `at`
pub fn script_morning(air: &StaticProvider, traffic: &StaticProvider, at: Timestamp) {
    for (location, aqi) in [("blr-central", 113.0), ("blr-east", 88.0), ("blr-south", 162.0)] {
        air.set_air_quality(
            AirQualityReading::new(location, aqi, at).with_pollutant("pm25", aqi * 0.4),
        );
    }
    for (segment, current, free_flow) in [
        ("mg-1", 34.0, 60.0),
        ("mg-2", 41.0, 55.0),
        ("mg-3", 38.0, 50.0),
        ("hosur-1", 12.0, 60.0),
    ] {
        traffic.set_traffic(TrafficReading::from_speeds(segment, current, free_flow, at));
    }
}
