//! EcoSignal Runtime
//!
//! ## Overview
//!
//! Puts the decision engine on a clock: loads the configuration, polls the
//! air-quality and traffic providers in parallel every tick, runs the
//! engine and publishes the result for read-only consumers.
//!
//! ```text
//! RuntimeConfig ──► TickDriver ──tick──► providers ─► Engine ─► watch ─► EngineHandle
//!                       ▲                                                  │
//!                 shutdown (watch)                       presentation layer reads
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ecosignal_connectors::StaticProvider;
//! use ecosignal_core::{AirQualityReading, EngineConfig, IntersectionConfig, TrafficReading};
//! use ecosignal_runtime::{TickDriver, TickOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default()
//!     .with_intersection(IntersectionConfig::new("INT_001", "MG Road", "bangalore", "mg-1"));
//!
//! let provider = Arc::new(
//!     StaticProvider::new()
//!         .with_air_quality(AirQualityReading::new("bangalore", 113.0, 0))
//!         .with_traffic(TrafficReading::from_speeds("mg-1", 21.0, 60.0, 0)),
//! );
//! let driver = TickDriver::new(config, provider.clone(), provider)?;
//! let handle = driver.handle();
//!
//! assert_eq!(driver.tick_once().await, TickOutcome::Completed(1));
//! assert_eq!(handle.latest_snapshot().total_intersections, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
pub mod handle;

pub use config::{ProviderSettings, RuntimeConfig};
pub use driver::{DriverStats, TickDriver, TickOutcome};
pub use error::{RuntimeError, RuntimeResult};
pub use handle::{EngineHandle, Publication};
