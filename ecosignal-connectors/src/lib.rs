//! Provider Connectors for Air-Quality and Traffic Readings
//!
//! ## Overview
//!
//! The decision engine treats its two data sources as black boxes. This
//! crate defines those boxes and ships the implementations used in
//! deployments:
//!
//! | Provider | Trait | Source |
//! |----------|-------|--------|
//! | [`waqi::WaqiProvider`] | [`AirQualityProvider`] | World Air Quality Index city feeds |
//! | [`tomtom::TomTomProvider`] | [`TrafficProvider`] | TomTom flow-segment data |
//! | [`memory::StaticProvider`] | both | scripted readings for tests and offline runs |
//!
//! ## Failure Model
//!
//! Every call returns a reading or a [`ProviderError`]. Errors are
//! non-fatal to the engine: the tick driver logs them and the affected
//! intersections keep their last-known state. The one exception is a
//! [`ProviderError::Format`] on *every* id of a source, which means the
//! provider changed its payload and the tick is aborted.
//!
//! ```text
//! Timeout ─────┐
//! Transport ───┼──► stale data for the affected ids, tick continues
//! Status ──────┤
//! UnknownSource┘
//! Format (all ids) ──► tick aborted, previous snapshot stays served
//! ```
//!
//! ## Retry Logic
//!
//! HTTP providers retry 5xx, 429 and transport failures with exponential
//! backoff:
//! ```text
//! retry_delay = backoff_base * 2^attempt
//! ```
//! The tick driver bounds the whole call with its own timeout, so retries
//! never stretch a tick.
//!
//! ## Example Usage
//!
//! ```rust
//! use ecosignal_connectors::{memory::StaticProvider, AirQualityProvider};
//! use ecosignal_core::AirQualityReading;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = StaticProvider::new()
//!     .with_air_quality(AirQualityReading::new("bangalore", 113.0, 0));
//!
//! let reading = provider.fetch_air_quality("bangalore").await?;
//! assert_eq!(reading.index_value, 113.0);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use ecosignal_core::{AirQualityReading, TrafficReading};
use thiserror::Error;

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod tomtom;

#[cfg(feature = "http")]
pub mod waqi;

// Re-export common types
pub use memory::StaticProvider;

#[cfg(feature = "http")]
pub use http::{HttpClient, HttpConfig};
#[cfg(feature = "http")]
pub use tomtom::{SegmentPoint, TomTomProvider};
#[cfg(feature = "http")]
pub use waqi::WaqiProvider;

/// Result type for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Provider failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Call did not complete in time
    #[error("Timeout")]
    Timeout,

    /// Network or connection failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with an error status
    #[error("Provider returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Payload does not have the expected shape
    #[error("Data format violation: {0}")]
    Format(String),

    /// Provider has no source for this id
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Provider configuration cannot be used
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Payload format violations are the only errors that can abort a tick
    pub fn is_format_violation(&self) -> bool {
        matches!(self, ProviderError::Format(_))
    }

    /// Worth another attempt within the same call
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Source of air-quality readings, one location per call
#[async_trait]
pub trait AirQualityProvider: Send + Sync {
    /// Fetch the current snapshot for a location
    async fn fetch_air_quality(&self, location_id: &str) -> ProviderResult<AirQualityReading>;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Call statistics
    fn stats(&self) -> ProviderStats;
}

/// Source of traffic readings, one segment per call
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    /// Fetch the current speeds for a segment
    async fn fetch_traffic(&self, segment_id: &str) -> ProviderResult<TrafficReading>;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Call statistics
    fn stats(&self) -> ProviderStats;
}

/// Call statistics common to all providers
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProviderStats {
    /// Calls that returned a reading
    pub readings_fetched: u64,
    /// Calls that failed
    pub requests_failed: u64,
    /// Attempts repeated after a retryable failure
    pub retries: u64,
    /// Last error message
    pub last_error: Option<String>,
}

/// Shared, lock-protected statistics
#[derive(Debug, Default)]
pub(crate) struct StatsCell(Mutex<ProviderStats>);

impl StatsCell {
    fn update(&self, f: impl FnOnce(&mut ProviderStats)) {
        let mut stats = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    pub(crate) fn record<T>(&self, result: &ProviderResult<T>) {
        self.update(|stats| match result {
            Ok(_) => stats.readings_fetched += 1,
            Err(e) => {
                stats.requests_failed += 1;
                stats.last_error = Some(e.to_string());
            }
        });
    }

    pub(crate) fn record_retry(&self) {
        self.update(|stats| stats.retries += 1);
    }

    pub(crate) fn snapshot(&self) -> ProviderStats {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
