//! Error Types for the Decision Engine
//!
//! ## Design Philosophy
//!
//! Every failure the engine can detect is tied to a single entity (a reading,
//! an intersection, a corridor) so the caller can isolate it:
//!
//! 1. **Entity-scoped**: each variant names the id it concerns, which keeps one
//!    segment's failure from blocking the rest of the tick.
//!
//! 2. **Recoverable by default**: nothing here is fatal to the process. Only
//!    configuration errors surfaced by `EngineConfig::validate` stop startup.
//!
//! 3. **Owned data**: ids are `String`s since they come from configuration
//!    and provider payloads, not from a fixed table.
//!
//! ## Error Categories
//!
//! ### Input Violations
//! - `InvalidReading`: malformed reading rejected at the classifier boundary
//!   (negative AQI, congestion outside [0,1], NaN speeds)
//!
//! ### Topology Mismatches
//! - `UnknownIntersection` / `UnknownCorridor`: id not part of the configured
//!   topology
//!
//! ### Coordination Failures
//! - `CorridorTooShort`: fewer than two intersections in a corridor
//! - `MissingIntersectionState`: a corridor member has never been observed
//!
//! ### Configuration
//! - `InvalidConfig`: calibration values or topology that cannot be used
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use ecosignal_core::{classify_aqi, EngineError};
//!
//! fn on_reading(index: f64) {
//!     match classify_aqi(index) {
//!         Ok(level) => {
//!             // apply to the store
//!             let _ = level;
//!         }
//!         Err(EngineError::InvalidReading { .. }) => {
//!             // discard for this tick, keep last-known value
//!         }
//!         Err(_) => {}
//!     }
//! }
//! # on_reading(42.0);
//! ```

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Decision engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Reading failed input validation and was discarded
    #[error("Invalid reading: {reason}")]
    InvalidReading {
        /// What was wrong with the reading
        reason: String,
    },

    /// Intersection id is not part of the configured topology
    #[error("Unknown intersection: {0}")]
    UnknownIntersection(String),

    /// Corridor id is not part of the configured topology
    #[error("Unknown corridor: {0}")]
    UnknownCorridor(String),

    /// A green wave needs at least two intersections
    #[error("Corridor {corridor} has {count} intersection(s), need at least 2")]
    CorridorTooShort {
        /// Corridor id
        corridor: String,
        /// Number of configured intersections
        count: usize,
    },

    /// A corridor member has no entry in the state store yet
    #[error("Corridor {corridor} is missing state for intersection {intersection}")]
    MissingIntersectionState {
        /// Corridor id
        corridor: String,
        /// Intersection without state
        intersection: String,
    },

    /// Configuration cannot be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Shorthand for an `InvalidReading` with a formatted reason
    pub fn invalid_reading(reason: impl Into<String>) -> Self {
        Self::InvalidReading {
            reason: reason.into(),
        }
    }

    /// True for the errors that degrade a corridor instead of failing it outright
    pub fn degrades_corridor(&self) -> bool {
        matches!(
            self,
            Self::CorridorTooShort { .. } | Self::MissingIntersectionState { .. }
        )
    }
}
