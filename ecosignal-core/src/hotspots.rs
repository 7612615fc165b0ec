//! Hotspot Detection
//!
//! ## Overview
//!
//! Every intersection keeps a bounded [`SampleWindow`] per source holding the
//! raw values of its most recent fresh readings. Hotspots are read off those
//! windows each tick. Windows live in memory only and start empty after a
//! restart.
//!
//! | Kind | Raised when | Pattern |
//! |------|-------------|---------|
//! | AirQuality | at least `min_samples` in the window | Sustained if the window mean exceeds the AQI threshold, Recurrent if more than `recurrent_share` of samples do |
//! | Congestion | latest sample at or above the congestion threshold | Sustained if the window mean is at or above it over `min_samples`, Emerging otherwise |

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AQI_MAX, HOTSPOT_AQI, HOTSPOT_CONGESTION, HOTSPOT_MIN_SAMPLES, HOTSPOT_RECURRENT_SHARE,
    HOTSPOT_WINDOW_SAMPLES,
};
use crate::errors::{EngineError, EngineResult};
use crate::readings::DataSource;
use crate::store::IntersectionState;

/// Most recent raw values of one source, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once full
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Change the capacity, evicting the oldest samples that no longer fit
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn peak(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    /// Fraction of samples matching `predicate`; zero for an empty window
    pub fn share(&self, predicate: impl Fn(f64) -> bool) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let hits = self.samples.iter().filter(|value| predicate(**value)).count();
        hits as f64 / self.samples.len() as f64
    }
}

/// Hotspot calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotThresholds {
    pub aqi: f64,
    pub congestion: f64,
    pub min_samples: usize,
    pub window_samples: usize,
    pub recurrent_share: f64,
}

impl Default for HotspotThresholds {
    fn default() -> Self {
        Self {
            aqi: HOTSPOT_AQI,
            congestion: HOTSPOT_CONGESTION,
            min_samples: HOTSPOT_MIN_SAMPLES,
            window_samples: HOTSPOT_WINDOW_SAMPLES,
            recurrent_share: HOTSPOT_RECURRENT_SHARE,
        }
    }
}

impl HotspotThresholds {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.aqi > 0.0 && self.aqi <= AQI_MAX) {
            return Err(invalid(format!("hotspot AQI {} outside (0, {AQI_MAX}]", self.aqi)));
        }
        if !(self.congestion > 0.0 && self.congestion <= 1.0) {
            return Err(invalid(format!(
                "hotspot congestion {} outside (0, 1]",
                self.congestion
            )));
        }
        if self.min_samples == 0 || self.window_samples < self.min_samples {
            return Err(invalid(format!(
                "hotspot window must satisfy 0 < min_samples <= window_samples, got {}/{}",
                self.min_samples, self.window_samples
            )));
        }
        if !(self.recurrent_share > 0.0 && self.recurrent_share < 1.0) {
            return Err(invalid(format!(
                "hotspot recurrent_share {} outside (0, 1)",
                self.recurrent_share
            )));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> EngineError {
    EngineError::InvalidConfig(reason)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HotspotKind {
    AirQuality,
    Congestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HotspotPattern {
    /// Window mean past the threshold
    Sustained,
    /// Mean below the threshold but frequent exceedances
    Recurrent,
    /// Latest sample past the threshold, history not (yet)
    Emerging,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub intersection_id: String,
    pub kind: HotspotKind,
    pub pattern: HotspotPattern,
    pub current: f64,
    pub average: f64,
    pub peak: f64,
    /// Samples past the threshold, percent
    pub exceed_pct: f64,
    pub samples: usize,
}

impl Hotspot {
    fn from_window(
        state: &IntersectionState,
        kind: HotspotKind,
        pattern: HotspotPattern,
        window: &SampleWindow,
        share: f64,
    ) -> Option<Self> {
        Some(Self {
            intersection_id: state.id.clone(),
            kind,
            pattern,
            current: window.latest()?,
            average: window.mean()?,
            peak: window.peak()?,
            exceed_pct: share * 100.0,
            samples: window.len(),
        })
    }
}

/// Hotspots of every state, in state order, air quality before congestion
pub fn detect_hotspots<'a>(
    states: impl IntoIterator<Item = &'a IntersectionState>,
    thresholds: &HotspotThresholds,
) -> Vec<Hotspot> {
    let mut hotspots = Vec::new();
    for state in states {
        hotspots.extend(air_quality_hotspot(state, thresholds));
        hotspots.extend(congestion_hotspot(state, thresholds));
    }
    hotspots
}

fn air_quality_hotspot(state: &IntersectionState, t: &HotspotThresholds) -> Option<Hotspot> {
    let window = state.window(DataSource::AirQuality);
    if window.len() < t.min_samples {
        return None;
    }
    let share = window.share(|aqi| aqi > t.aqi);
    let pattern = if window.mean()? > t.aqi {
        HotspotPattern::Sustained
    } else if share > t.recurrent_share {
        HotspotPattern::Recurrent
    } else {
        return None;
    };
    Hotspot::from_window(state, HotspotKind::AirQuality, pattern, window, share)
}

fn congestion_hotspot(state: &IntersectionState, t: &HotspotThresholds) -> Option<Hotspot> {
    let window = state.window(DataSource::Traffic);
    if window.latest()? < t.congestion {
        return None;
    }
    let pattern = if window.len() >= t.min_samples && window.mean()? >= t.congestion {
        HotspotPattern::Sustained
    } else {
        HotspotPattern::Emerging
    };
    let share = window.share(|congestion| congestion >= t.congestion);
    Hotspot::from_window(state, HotspotKind::Congestion, pattern, window, share)
}
